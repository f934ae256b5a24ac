//! Error types for the swap runner

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid secret phrase: {0}")]
    InvalidPhrase(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Connectivity loss; `endpoint` names the chain or service
    #[error("Network error reaching {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("Transfer planner error: {0}")]
    Planner(String),

    #[error("No feasible transfer range: min {min} exceeds max {max}")]
    InfeasibleTransfer { min: Decimal, max: Decimal },

    #[error("Amount {amount} outside transferable range [{min}, {max}]")]
    AmountOutOfRange {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Transfer rejected on {chain}: {message}")]
    TransferRejected { chain: String, message: String },

    #[error("Swap output below minimum: {0}")]
    SlippageExceeded(String),

    #[error("Swap deadline {deadline} exceeded")]
    DeadlineExceeded { deadline: u64 },

    #[error("Insufficient liquidity along swap path: {0}")]
    InsufficientLiquidity(String),

    #[error("Swap transaction {tx_hash} reverted")]
    SwapReverted { tx_hash: String },

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Invalid swap path: {0}")]
    InvalidPath(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl RunnerError {
    /// Whether funds may already be committed on-chain when this error surfaces
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            RunnerError::SwapReverted { .. }
                | RunnerError::DeadlineExceeded { .. }
                | RunnerError::Network { .. }
        )
    }
}

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;
