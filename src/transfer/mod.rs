//! Cross-chain transfers through the transfer-planning service
//!
//! The planner owns balance/fee lookups and builds the chain-specific call;
//! this module validates its answers, signs with the right identity and
//! reports the pre-flight figures.

pub mod executor;
pub mod http;
pub mod planner;

pub use executor::TransferExecutor;
pub use http::HttpTransferPlanner;
pub use planner::TransferPlanner;
use planner::TransferQuery;

use ethers::types::H256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signing family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Substrate,
    Evm,
}

/// A chain as the planner knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRef {
    /// Planner identifier, e.g. `moonbeam`
    pub key: String,
    pub name: String,
    pub family: ChainFamily,
}

/// One transfer direction for one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRoute {
    pub source: ChainRef,
    pub destination: ChainRef,
    pub asset: String,
}

/// Decimal amount with its symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub amount: Decimal,
    pub symbol: String,
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// Point-in-time view of one side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub balance: AssetAmount,
    /// Denominated in the chain's fee asset
    pub fee: AssetAmount,
}

/// Evaluated transfer, valid only for the attempt it was computed for
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub route: TransferRoute,
    pub source: ChainSnapshot,
    pub destination: ChainSnapshot,
    pub min: AssetAmount,
    pub max: AssetAmount,
    /// Query the plan was evaluated with, replayed when executing
    pub query: TransferQuery,
}

impl TransferPlan {
    pub fn allows(&self, amount: Decimal) -> bool {
        amount >= self.min.amount && amount <= self.max.amount
    }
}

/// Opaque transaction identifier returned by a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxReference(pub String);

impl From<H256> for TxReference {
    fn from(hash: H256) -> Self {
        TxReference(format!("{:?}", hash))
    }
}

impl fmt::Display for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
