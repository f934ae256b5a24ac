//! Transfer-planning collaborator interface and its wire types

use super::{AssetAmount, ChainSnapshot, TxReference};
use crate::error::RunnerResult;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters for a transfer-data lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferQuery {
    pub source_chain: String,
    pub asset: String,
    pub source_address: String,
    pub destination_chain: String,
    pub destination_address: String,
}

/// Balances, fees and bounds reported by the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub source: ChainSnapshot,
    pub destination: ChainSnapshot,
    pub min: AssetAmount,
    pub max: AssetAmount,
}

/// Call the source chain's signer must authorize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnsignedTransfer {
    /// Contract call broadcast by the EVM signer
    Evm {
        to: Address,
        data: Bytes,
        #[serde(default)]
        value: U256,
    },
    /// Extrinsic signing payload, signed offline and handed back for submission
    Substrate { payload: Bytes },
}

/// Signed substrate payload returned to the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub signer: String,
    pub public_key: Bytes,
    pub payload: Bytes,
    pub signature: Bytes,
}

/// External service that computes and realizes cross-chain transfers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferPlanner: Send + Sync {
    /// Current balances, fees and transferable range
    async fn transfer_data(&self, query: &TransferQuery) -> RunnerResult<TransferData>;

    /// Build the source-chain call moving `amount`
    async fn build_transfer(
        &self,
        query: &TransferQuery,
        amount: Decimal,
    ) -> RunnerResult<UnsignedTransfer>;

    /// Submit a payload signed offline, returning the extrinsic hash
    async fn submit_signed(
        &self,
        query: &TransferQuery,
        signed: &SignedPayload,
    ) -> RunnerResult<TxReference>;
}
