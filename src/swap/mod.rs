//! Exact-input swaps through a multi-hop routing contract

pub mod path;
pub mod router;

pub use path::{decode_path, encode_path};
pub use router::SwapExecutor;

use crate::error::{RunnerError, RunnerResult};

use ethers::types::{Address, Bytes, U256};
use ethers::utils::parse_units;
use rust_decimal::Decimal;

/// Swap as requested by the sequencer, amounts already in base units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub amount_in: U256,
    pub min_output: U256,
    /// Token addresses in hop order
    pub path: Vec<Address>,
    /// Seconds from submission until the router rejects the swap
    pub deadline_secs: u64,
}

/// Fully specified order sent to the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOrder {
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub path: Bytes,
    pub recipient: Address,
    /// Absolute unix timestamp
    pub deadline: u64,
}

impl SwapOrder {
    /// Build the order for a submission at `now` (unix seconds)
    pub fn new(request: &SwapRequest, recipient: Address, now: u64) -> RunnerResult<Self> {
        Ok(Self {
            amount_in: request.amount_in,
            amount_out_minimum: request.min_output,
            path: encode_path(&request.path)?,
            recipient,
            deadline: now.saturating_add(request.deadline_secs),
        })
    }

    pub fn hops(&self) -> RunnerResult<Vec<Address>> {
        decode_path(&self.path)
    }
}

/// `amount * 10^decimals` as an integer
pub fn to_base_units(amount: Decimal, decimals: u32) -> RunnerResult<U256> {
    if amount.is_sign_negative() {
        return Err(RunnerError::Config(format!("negative amount {}", amount)));
    }

    let amount = amount.normalize();
    if amount.scale() > decimals {
        return Err(RunnerError::Config(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }

    parse_units(amount.to_string(), decimals)
        .map(U256::from)
        .map_err(|e| {
            RunnerError::Config(format!(
                "{} does not fit {} decimals: {}",
                amount, decimals, e
            ))
        })
}
