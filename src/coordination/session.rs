//! Collaborator seams used by the sequencer and their live implementations

use crate::config::Settings;
use crate::error::{RunnerError, RunnerResult};
use crate::signer::{self, AccountPair, SecretPhrase, SignerPair};
use crate::swap::{SwapExecutor, SwapRequest};
use crate::transfer::{
    HttpTransferPlanner, TransferExecutor, TransferPlan, TransferPlanner, TransferRoute,
    TxReference,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Operations available once both signers exist
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    fn accounts(&self) -> AccountPair;

    async fn evaluate_transfer(&self, route: &TransferRoute) -> RunnerResult<TransferPlan>;

    async fn execute_transfer(
        &self,
        plan: &TransferPlan,
        amount: Decimal,
    ) -> RunnerResult<TxReference>;

    async fn execute_swap(&self, request: &SwapRequest) -> RunnerResult<TxReference>;
}

/// Derives signers and opens the connections a session needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, phrase: &SecretPhrase) -> RunnerResult<Box<dyn Session>>;
}

/// Session over the real chain-B connection and planner
pub struct LiveSession<P> {
    signers: SignerPair,
    transfers: TransferExecutor<P>,
    swaps: SwapExecutor,
}

#[async_trait]
impl<P: TransferPlanner + 'static> Session for LiveSession<P> {
    fn accounts(&self) -> AccountPair {
        self.signers.accounts()
    }

    async fn evaluate_transfer(&self, route: &TransferRoute) -> RunnerResult<TransferPlan> {
        self.transfers.evaluate(route, &self.signers).await
    }

    async fn execute_transfer(
        &self,
        plan: &TransferPlan,
        amount: Decimal,
    ) -> RunnerResult<TxReference> {
        self.transfers.execute(plan, amount, &self.signers).await
    }

    async fn execute_swap(&self, request: &SwapRequest) -> RunnerResult<TxReference> {
        self.swaps.execute(&self.signers, request).await
    }
}

/// Builds live sessions from settings
pub struct LiveConnector {
    settings: Settings,
    planner: Arc<HttpTransferPlanner>,
}

impl LiveConnector {
    pub fn new(settings: Settings) -> RunnerResult<Self> {
        let planner = Arc::new(HttpTransferPlanner::new(&settings.planner)?);
        Ok(Self { settings, planner })
    }
}

#[async_trait]
impl Connector for LiveConnector {
    async fn connect(&self, phrase: &SecretPhrase) -> RunnerResult<Box<dyn Session>> {
        let signers =
            signer::derive_signers(phrase, self.settings.substrate.ss58_format, &self.settings.evm)
                .await?;

        let router = self
            .settings
            .router_address()
            .map_err(|e| RunnerError::Config(e.to_string()))?;

        Ok(Box::new(LiveSession {
            signers,
            transfers: TransferExecutor::new(self.planner.clone()),
            swaps: SwapExecutor::new(router, self.settings.evm.name.clone()),
        }))
    }
}
