//! ERC20 allowance/approve ABI

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use crate::errors::{SwapError, SwapErrorType, SwapResult};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

/// Decodes an `allowance` return. An empty reply means the read did not
/// reach a token contract.
pub fn decode_allowance(data: &[u8]) -> SwapResult<U256> {
    if data.is_empty() {
        return Err(SwapError::new(
            SwapErrorType::ResponseError,
            "allowance read returned no data",
        ));
    }
    IERC20::allowanceCall::abi_decode_returns(data, true)
        .map(|ret| ret._0)
        .map_err(|e| SwapError::new(SwapErrorType::ResponseError, "malformed allowance reply").with_cause(e))
}
