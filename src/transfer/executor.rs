//! Transfer evaluation and submission

use super::planner::{SignedPayload, TransferPlanner, TransferQuery, UnsignedTransfer};
use super::{ChainFamily, TransferPlan, TransferRoute, TxReference};
use crate::error::{RunnerError, RunnerResult};
use crate::signer::SignerPair;

use ethers::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Evaluates and executes cross-chain transfers through a planner
pub struct TransferExecutor<P> {
    planner: Arc<P>,
}

impl<P: TransferPlanner> TransferExecutor<P> {
    pub fn new(planner: Arc<P>) -> Self {
        Self { planner }
    }

    /// Fetch a fresh plan for `route` and log the pre-flight figures
    pub async fn evaluate<M: Middleware>(
        &self,
        route: &TransferRoute,
        signers: &SignerPair<M>,
    ) -> RunnerResult<TransferPlan> {
        let query = TransferQuery {
            source_chain: route.source.key.clone(),
            asset: route.asset.clone(),
            source_address: address_for(route.source.family, signers),
            destination_chain: route.destination.key.clone(),
            destination_address: address_for(route.destination.family, signers),
        };
        debug!("Requesting transfer data: {:?}", query);

        let data = self.planner.transfer_data(&query).await?;

        let plan = TransferPlan {
            route: route.clone(),
            source: data.source,
            destination: data.destination,
            min: data.min,
            max: data.max,
            query,
        };

        log_balances(&plan);
        log_tx_details(&plan);

        if plan.min.amount > plan.max.amount {
            return Err(RunnerError::InfeasibleTransfer {
                min: plan.min.amount,
                max: plan.max.amount,
            });
        }

        Ok(plan)
    }

    /// Submit `amount` according to an evaluated plan
    pub async fn execute<M: Middleware + 'static>(
        &self,
        plan: &TransferPlan,
        amount: Decimal,
        signers: &SignerPair<M>,
    ) -> RunnerResult<TxReference> {
        if !plan.allows(amount) {
            return Err(RunnerError::AmountOutOfRange {
                amount,
                min: plan.min.amount,
                max: plan.max.amount,
            });
        }

        let source = &plan.route.source;
        info!("Sending from {} amount: {}", source.name, amount);

        let unsigned = self.planner.build_transfer(&plan.query, amount).await?;

        let tx = match (source.family, unsigned) {
            (ChainFamily::Evm, UnsignedTransfer::Evm { to, data, value }) => {
                let request = TransactionRequest::new().to(to).data(data).value(value);
                let pending = signers
                    .evm
                    .send_transaction(request, None)
                    .await
                    .map_err(|e| classify_submission_error(&source.name, e.to_string()))?;
                TxReference::from(pending.tx_hash())
            }
            (ChainFamily::Substrate, UnsignedTransfer::Substrate { payload }) => {
                let signature = signers.substrate.sign(&payload);
                let signed = SignedPayload {
                    signer: signers.substrate.address().to_string(),
                    public_key: Bytes::from(signers.substrate.public_key().to_vec()),
                    payload,
                    signature: Bytes::from(signature.to_vec()),
                };
                self.planner.submit_signed(&plan.query, &signed).await?
            }
            (family, other) => {
                return Err(RunnerError::Planner(format!(
                    "planner returned {:?} for a {:?} source chain",
                    other, family
                )));
            }
        };

        info!("{} tx hash: {}", source.name, tx);
        Ok(tx)
    }
}

fn address_for<M: Middleware>(family: ChainFamily, signers: &SignerPair<M>) -> String {
    match family {
        ChainFamily::Substrate => signers.substrate.address().to_string(),
        ChainFamily::Evm => format!("{:?}", signers.evm.address()),
    }
}

fn log_balances(plan: &TransferPlan) {
    info!(
        "Balance on {} {}",
        plan.route.source.name, plan.source.balance
    );
    info!(
        "Balance on {} {}",
        plan.route.destination.name, plan.destination.balance
    );
}

fn log_tx_details(plan: &TransferPlan) {
    info!(
        "You can send min: {} and max: {} from {} to {}. You will pay {} fee on {} and {} fee on {}.",
        plan.min,
        plan.max,
        plan.route.source.name,
        plan.route.destination.name,
        plan.source.fee,
        plan.route.source.name,
        plan.destination.fee,
        plan.route.destination.name,
    );
}

/// Map a broadcast failure to the runner taxonomy
pub(crate) fn classify_submission_error(chain: &str, message: String) -> RunnerError {
    let lower = message.to_lowercase();
    let network = ["connection", "websocket", "timed out", "timeout", "unexpected eof"];
    if network.iter().any(|needle| lower.contains(needle)) {
        return RunnerError::Network {
            endpoint: chain.to_string(),
            message,
        };
    }

    // insufficient funds, nonce too low, replacement underpriced, execution reverted
    RunnerError::TransferRejected {
        chain: chain.to_string(),
        message,
    }
}
