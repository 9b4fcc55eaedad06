//! Typed swap errors returned from every quote/build/execute/approval entry point

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapErrorType {
    UnsupportedChain,
    UnsupportedPair,
    UnsupportedNamespace,
    ValidationFailed,
    PoolNotFound,
    TradeBelowMinimum,
    BuildTradeFailed,
    TradeQuoteFailed,
    CheckApprovalFailed,
    AllowanceRequiredFailed,
    GrantAllowanceFailed,
    ApproveInfiniteFailed,
    ExecuteTradeFailed,
    GetTradeTxsFailed,
    ReceiveAccountNumberNotProvided,
    ResponseError,
    SignAndBroadcastFailed,
    Timeout,
}

impl fmt::Display for SwapErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            SwapErrorType::UnsupportedChain => "UNSUPPORTED_CHAIN",
            SwapErrorType::UnsupportedPair => "UNSUPPORTED_PAIR",
            SwapErrorType::UnsupportedNamespace => "UNSUPPORTED_NAMESPACE",
            SwapErrorType::ValidationFailed => "VALIDATION_FAILED",
            SwapErrorType::PoolNotFound => "POOL_NOT_FOUND",
            SwapErrorType::TradeBelowMinimum => "TRADE_BELOW_MINIMUM",
            SwapErrorType::BuildTradeFailed => "BUILD_TRADE_FAILED",
            SwapErrorType::TradeQuoteFailed => "TRADE_QUOTE_FAILED",
            SwapErrorType::CheckApprovalFailed => "CHECK_APPROVAL_FAILED",
            SwapErrorType::AllowanceRequiredFailed => "ALLOWANCE_REQUIRED_FAILED",
            SwapErrorType::GrantAllowanceFailed => "GRANT_ALLOWANCE_FAILED",
            SwapErrorType::ApproveInfiniteFailed => "APPROVE_INFINITE_FAILED",
            SwapErrorType::ExecuteTradeFailed => "EXECUTE_TRADE_FAILED",
            SwapErrorType::GetTradeTxsFailed => "GET_TRADE_TXS_FAILED",
            SwapErrorType::ReceiveAccountNumberNotProvided => "RECEIVE_ACCOUNT_NUMBER_NOT_PROVIDED",
            SwapErrorType::ResponseError => "RESPONSE_ERROR",
            SwapErrorType::SignAndBroadcastFailed => "SIGN_AND_BROADCAST_FAILED",
            SwapErrorType::Timeout => "TIMEOUT",
        };
        f.write_str(code)
    }
}

#[derive(Error, Debug)]
#[error("{message} ({code})")]
pub struct SwapError {
    pub code: SwapErrorType,
    pub message: String,
    pub details: Option<serde_json::Value>,
    #[source]
    pub cause: Option<anyhow::Error>,
}

pub type SwapResult<T> = Result<T, SwapError>;

impl SwapError {
    pub fn new(code: SwapErrorType, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Re-wrap a failure at an entry-point boundary.
    ///
    /// A `SwapError` raised further down already carries the right kind and is
    /// passed through untouched; anything else becomes the cause of a new
    /// error of `code`.
    pub fn wrap(code: SwapErrorType, message: impl Into<String>, error: anyhow::Error) -> Self {
        match error.downcast::<SwapError>() {
            Ok(swap_error) => swap_error,
            Err(other) => Self::new(code, message).with_cause(other),
        }
    }

    pub fn is(&self, code: SwapErrorType) -> bool {
        self.code == code
    }
}

/// `anyhow::Context`-style helper for attaching a swap error kind to any
/// fallible call.
pub trait SwapResultExt<T> {
    fn swap_err(self, code: SwapErrorType, message: &str) -> SwapResult<T>;
}

impl<T, E> SwapResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn swap_err(self, code: SwapErrorType, message: &str) -> SwapResult<T> {
        self.map_err(|e| SwapError::wrap(code, message, e.into()))
    }
}
