//! Swapper configuration settings and environment variable handling

use alloy::primitives::{address, Address, B256};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Allowance constants
pub const APPROVAL_GAS_LIMIT: u64 = 100_000;

// Venue ceilings, in human units of the sell asset
pub const MAX_ZRX_TRADE: &str = "100000000000000000000000000";
pub const MAX_COWSWAP_TRADE: &str = "100000000000000000000000000";
pub const MAX_THORCHAIN_TRADE: &str = "100000000000000000000000000";
pub const MAX_OSMOSIS_TRADE: &str = "100000000000000000000000000";
pub const MAX_LIFI_TRADE: &str = "100000000000000000000000000";

// CowSwap
pub const MIN_COWSWAP_VALUE_USD: Decimal = dec!(20);
pub const COW_SWAP_ORDER_VALIDITY_SECS: i64 = 30 * 60;
pub const COW_SWAP_SETTLEMENT_ADDRESS: Address = address!("9008D19f58AAbD9eD0D60971565AA8510560ab41");
pub const COW_SWAP_VAULT_RELAYER_ADDRESS: Address = address!("C92E8bdf79f0507f65a392b0ab4667716BFE0110");
pub const COW_SWAP_APP_DATA: B256 = B256::ZERO;

// THORChain pool amounts are 8 decimals regardless of the token
pub const THOR_PRECISION: u32 = 8;
pub const THORCHAIN_DEPOSIT_EXPIRY_SECS: i64 = 15 * 60;

// Polling
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 24;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.002);
pub const MAX_SLIPPAGE: Decimal = dec!(0.3);

// Quotes this close to the best one, in USD, tie with it
pub const BEST_QUOTE_EPSILON_USD: Decimal = dec!(0.01);

/// Which venues the manager registers. Compared to detect flag changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FeatureFlags {
    pub cow_swap: bool,
    pub zrx_ethereum: bool,
    pub zrx_avalanche: bool,
    pub zrx_optimism: bool,
    pub zrx_bnb_smart_chain: bool,
    pub zrx_polygon: bool,
    pub thorchain: bool,
    pub osmosis: bool,
    pub lifi: bool,
}

impl FeatureFlags {
    pub fn load() -> Self {
        Self {
            cow_swap: flag("SWAPPER_FLAGS_COWSWAP"),
            zrx_ethereum: flag("SWAPPER_FLAGS_ZRX_ETHEREUM"),
            zrx_avalanche: flag("SWAPPER_FLAGS_ZRX_AVALANCHE"),
            zrx_optimism: flag("SWAPPER_FLAGS_ZRX_OPTIMISM"),
            zrx_bnb_smart_chain: flag("SWAPPER_FLAGS_ZRX_BSC"),
            zrx_polygon: flag("SWAPPER_FLAGS_ZRX_POLYGON"),
            thorchain: flag("SWAPPER_FLAGS_THORCHAIN"),
            osmosis: flag("SWAPPER_FLAGS_OSMOSIS"),
            lifi: flag("SWAPPER_FLAGS_LIFI"),
        }
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

/// Fixed-interval polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub flags: FeatureFlags,
    // Venue endpoints
    pub zrx_ethereum_url: String,
    pub zrx_avalanche_url: String,
    pub zrx_optimism_url: String,
    pub zrx_bnb_smart_chain_url: String,
    pub zrx_polygon_url: String,
    pub cowswap_api_url: String,
    pub thorchain_daemon_url: String,
    pub midgard_url: String,
    pub osmosis_url: String,
    pub cosmos_url: String,
    pub lifi_api_url: String,
    // Chain access
    pub ethereum_rpc_url: String,
    pub private_key: Option<String>,
    // Behaviour
    pub http_timeout: Duration,
    pub poll: PollConfig,
    pub settle_delay: Duration,
    pub default_slippage: Decimal,
    // Pair quoted by the binary
    pub quote_sell_asset: String,
    pub quote_buy_asset: String,
    pub quote_sell_amount: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            flags: FeatureFlags::load(),
            zrx_ethereum_url: env::var("ZRX_ETHEREUM_URL")
                .unwrap_or_else(|_| "https://api.0x.org".to_string()),
            zrx_avalanche_url: env::var("ZRX_AVALANCHE_URL")
                .unwrap_or_else(|_| "https://avalanche.api.0x.org".to_string()),
            zrx_optimism_url: env::var("ZRX_OPTIMISM_URL")
                .unwrap_or_else(|_| "https://optimism.api.0x.org".to_string()),
            zrx_bnb_smart_chain_url: env::var("ZRX_BSC_URL")
                .unwrap_or_else(|_| "https://bsc.api.0x.org".to_string()),
            zrx_polygon_url: env::var("ZRX_POLYGON_URL")
                .unwrap_or_else(|_| "https://polygon.api.0x.org".to_string()),
            cowswap_api_url: env::var("COWSWAP_API_URL")
                .unwrap_or_else(|_| "https://api.cow.fi/mainnet/api".to_string()),
            thorchain_daemon_url: env::var("THORCHAIN_NODE_URL")
                .unwrap_or_else(|_| "https://daemon.thorchain.shapeshift.com".to_string()),
            midgard_url: env::var("MIDGARD_URL")
                .unwrap_or_else(|_| "https://midgard.thorchain.info".to_string()),
            osmosis_url: env::var("OSMOSIS_NODE_URL")
                .map(|url| format!("{}/lcd", url.trim_end_matches('/')))
                .unwrap_or_else(|_| "https://daemon.osmosis.shapeshift.com/lcd".to_string()),
            cosmos_url: env::var("COSMOS_NODE_URL")
                .map(|url| format!("{}/lcd", url.trim_end_matches('/')))
                .unwrap_or_else(|_| "https://daemon.cosmos.shapeshift.com/lcd".to_string()),
            lifi_api_url: env::var("LIFI_API_URL")
                .unwrap_or_else(|_| "https://li.quest".to_string()),
            ethereum_rpc_url: env::var("ETHEREUM_RPC_URL")
                .unwrap_or_else(|_| "https://eth.llamarpc.com".to_string()),
            private_key: env::var("PRIVATE_KEY").ok(),
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            poll: PollConfig {
                interval: Duration::from_millis(
                    env::var("POLL_INTERVAL_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                max_attempts: env::var("POLL_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS)
                    .max(1),
            },
            settle_delay: Duration::from_millis(
                env::var("SETTLE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            default_slippage: env::var("DEFAULT_SLIPPAGE")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or(DEFAULT_SLIPPAGE)
                .max(Decimal::ZERO)
                .min(MAX_SLIPPAGE),
            quote_sell_asset: env::var("QUOTE_SELL_ASSET")
                .unwrap_or_else(|_| "eip155:1/slip44:60".to_string()),
            quote_buy_asset: env::var("QUOTE_BUY_ASSET")
                .unwrap_or_else(|_| "eip155:1/erc20:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()),
            quote_sell_amount: env::var("QUOTE_SELL_AMOUNT")
                .unwrap_or_else(|_| "1".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_budget_is_two_minutes() {
        let poll = PollConfig::default();
        assert_eq!(poll.interval * poll.max_attempts, Duration::from_secs(120));
    }
}
