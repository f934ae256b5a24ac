//! Run sequencer: a strictly linear state machine over the three legs

use super::session::{Connector, Session};
use super::state::{Leg, LegReceipt, RunStage, SequenceFailure};
use crate::config::Settings;
use crate::error::{RunnerError, RunnerResult};
use crate::signer::SecretPhrase;
use crate::swap::{to_base_units, SwapRequest};
use crate::transfer::{ChainFamily, ChainRef, TransferRoute, TxReference};

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What a run moves and swaps
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Chain A -> chain B
    pub outbound: TransferRoute,
    pub outbound_amount: Decimal,
    pub swap: SwapRequest,
    /// Chain B -> chain A
    pub inbound: TransferRoute,
    pub inbound_amount: Decimal,
}

impl RunPlan {
    pub fn from_settings(settings: &Settings) -> RunnerResult<Self> {
        let substrate = ChainRef {
            key: settings.substrate.key.clone(),
            name: settings.substrate.name.clone(),
            family: ChainFamily::Substrate,
        };
        let evm = ChainRef {
            key: settings.evm.key.clone(),
            name: settings.evm.name.clone(),
            family: ChainFamily::Evm,
        };

        let swap = SwapRequest {
            amount_in: to_base_units(settings.swap.amount_in, settings.swap.input_decimals)?,
            min_output: to_base_units(settings.swap.min_output, settings.swap.output_decimals)?,
            path: settings
                .swap_path()
                .map_err(|e| RunnerError::Config(e.to_string()))?,
            deadline_secs: settings.swap.deadline_secs,
        };

        Ok(Self {
            outbound: TransferRoute {
                source: substrate.clone(),
                destination: evm.clone(),
                asset: settings.legs.outbound.asset.clone(),
            },
            outbound_amount: settings.legs.outbound.amount,
            swap,
            inbound: TransferRoute {
                source: evm,
                destination: substrate,
                asset: settings.legs.inbound.asset.clone(),
            },
            inbound_amount: settings.legs.inbound.amount,
        })
    }
}

/// Drives derive -> outbound -> swap -> inbound, aborting on the first error
pub struct Sequencer {
    connector: Arc<dyn Connector>,
    plan: RunPlan,
    settle_wait: Duration,
    stage: RunStage,
    session: Option<Box<dyn Session>>,
    completed: Vec<LegReceipt>,
}

impl Sequencer {
    pub fn new(connector: Arc<dyn Connector>, plan: RunPlan, settle_wait: Duration) -> Self {
        Self {
            connector,
            plan,
            settle_wait,
            stage: RunStage::Idle,
            session: None,
            completed: Vec::new(),
        }
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn completed(&self) -> &[LegReceipt] {
        &self.completed
    }

    /// Run every transition to `Done`
    pub async fn run(mut self, phrase: &SecretPhrase) -> Result<Vec<LegReceipt>, SequenceFailure> {
        if let Err(source) = self.drive(phrase).await {
            error!("Run aborted at {}: {}", self.stage, source);
            for receipt in &self.completed {
                warn!("Completed before abort: {:?} {}", receipt.leg, receipt.tx);
            }
            if source.needs_reconciliation() {
                warn!("Last submission may still be pending on-chain - reconcile manually");
            }
            return Err(SequenceFailure {
                stage: self.stage,
                completed: self.completed,
                source,
            });
        }

        Ok(self.completed)
    }

    async fn drive(&mut self, phrase: &SecretPhrase) -> RunnerResult<()> {
        self.derive_signers(phrase).await?;
        self.submit_outbound().await?;
        self.settle().await?;
        self.submit_swap().await?;
        self.settle().await?;
        self.submit_inbound().await?;
        self.settle().await?;
        self.finish()
    }

    /// `Idle -> SignersDerived`
    pub async fn derive_signers(&mut self, phrase: &SecretPhrase) -> RunnerResult<()> {
        self.require(RunStage::Idle)?;

        let session = self.connector.connect(phrase).await?;
        let accounts = session.accounts();
        info!("ETH Address {:?}", accounts.evm);
        info!("Polkadot Address {}", accounts.substrate);

        self.session = Some(session);
        self.advance();
        Ok(())
    }

    /// `SignersDerived -> Leg1Submitted`
    pub async fn submit_outbound(&mut self) -> RunnerResult<()> {
        self.require(RunStage::SignersDerived)?;

        let route = self.plan.outbound.clone();
        info!("Transferring from {} to {}", route.source.name, route.destination.name);
        let tx = self.transfer(&route, self.plan.outbound_amount).await?;

        self.record(Leg::Outbound, tx);
        Ok(())
    }

    /// `Leg1Settled -> SwapSubmitted`
    pub async fn submit_swap(&mut self) -> RunnerResult<()> {
        self.require(RunStage::Leg1Settled)?;

        info!("Swapping {} on {}", self.plan.outbound.asset, self.plan.outbound.destination.name);
        let tx = self.session()?.execute_swap(&self.plan.swap).await?;

        self.record(Leg::Swap, tx);
        Ok(())
    }

    /// `SwapSettled -> Leg2Submitted`
    pub async fn submit_inbound(&mut self) -> RunnerResult<()> {
        self.require(RunStage::SwapSettled)?;

        let route = self.plan.inbound.clone();
        info!("Sending {} to {}", route.asset, route.destination.name);
        let tx = self.transfer(&route, self.plan.inbound_amount).await?;

        self.record(Leg::Inbound, tx);
        Ok(())
    }

    /// `*Submitted -> *Settled`. Waits the fixed interval after the outbound
    /// leg and the swap; the run ends right after the inbound leg.
    pub async fn settle(&mut self) -> RunnerResult<()> {
        match self.stage {
            RunStage::Leg1Submitted | RunStage::SwapSubmitted => {
                info!("Waiting {:?} for {} to settle", self.settle_wait, self.stage);
                tokio::time::sleep(self.settle_wait).await;
            }
            RunStage::Leg2Submitted => {}
            other => {
                return Err(RunnerError::InvalidStateTransition {
                    from: other.to_string(),
                    to: "settled".to_string(),
                })
            }
        }

        self.advance();
        Ok(())
    }

    /// `Leg2Settled -> Done`
    pub fn finish(&mut self) -> RunnerResult<()> {
        self.require(RunStage::Leg2Settled)?;
        self.advance();
        self.session = None;
        Ok(())
    }

    async fn transfer(&self, route: &TransferRoute, amount: Decimal) -> RunnerResult<TxReference> {
        let session = self.session()?;
        let plan = session.evaluate_transfer(route).await?;
        session.execute_transfer(&plan, amount).await
    }

    fn session(&self) -> RunnerResult<&dyn Session> {
        self.session.as_deref().ok_or_else(|| RunnerError::InvalidStateTransition {
            from: self.stage.to_string(),
            to: "session".to_string(),
        })
    }

    fn require(&self, expected: RunStage) -> RunnerResult<()> {
        if self.stage != expected {
            return Err(RunnerError::InvalidStateTransition {
                from: self.stage.to_string(),
                to: expected
                    .next()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            });
        }
        Ok(())
    }

    fn record(&mut self, leg: Leg, tx: TxReference) {
        self.completed.push(LegReceipt { leg, tx });
        self.advance();
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::session::{MockConnector, MockSession};
    use crate::signer::AccountPair;
    use crate::transfer::executor::tests::feasible_plan;
    use ethers::types::{Address, U256};
    use mockall::Sequence;

    fn usdt() -> Address {
        "0xffffffffea09fb06d082fd1275cd48b191cbcd1d".parse().unwrap()
    }

    fn dot() -> Address {
        "0xffffffff1fcacbd218edc0eba20fc2308c778080".parse().unwrap()
    }

    fn plan() -> RunPlan {
        let settings = Settings::from_toml(crate::config::tests::SAMPLE).unwrap();
        RunPlan::from_settings(&settings).unwrap()
    }

    fn accounts() -> AccountPair {
        AccountPair {
            substrate: "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5".to_string(),
            evm: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap(),
        }
    }

    fn connector_for(session: MockSession) -> Arc<dyn Connector> {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move |_| Ok(Box::new(session) as Box<dyn Session>));
        Arc::new(connector)
    }

    fn phrase() -> SecretPhrase {
        SecretPhrase::new(crate::signer::tests::TEST_PHRASE)
    }

    #[test]
    fn test_plan_from_settings() {
        let plan = plan();
        assert_eq!(plan.outbound.source.family, ChainFamily::Substrate);
        assert_eq!(plan.outbound.destination.family, ChainFamily::Evm);
        assert_eq!(plan.inbound.source, plan.outbound.destination);
        assert_eq!(plan.swap.amount_in, U256::from(15_000_000u64));
        assert_eq!(plan.swap.min_output, U256::from(20_000_000_000u64));
        assert_eq!(plan.swap.path, vec![usdt(), dot()]);
        assert_eq!(plan.swap.deadline_secs, 1200);
        assert_eq!(plan.outbound_amount, Decimal::from(15));
        assert_eq!(plan.inbound_amount, Decimal::ONE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_reaches_done() {
        let mut seq = Sequence::new();
        let mut session = MockSession::new();
        session.expect_accounts().return_const(accounts());

        session
            .expect_evaluate_transfer()
            .withf(|route| route.asset == "usdt" && route.source.key == "polkadotAssetHub")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|route| Ok(feasible_plan(route.clone())));
        session
            .expect_execute_transfer()
            .withf(|_, amount| *amount == Decimal::from(15))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(TxReference("0xleg1".to_string())));
        session
            .expect_execute_swap()
            .withf(|request| {
                request.amount_in == U256::from(15_000_000u64)
                    && request.min_output == U256::from(20_000_000_000u64)
                    && request.path == vec![usdt(), dot()]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TxReference("0xswap".to_string())));
        session
            .expect_evaluate_transfer()
            .withf(|route| route.asset == "dot" && route.source.key == "moonbeam")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|route| Ok(feasible_plan(route.clone())));
        session
            .expect_execute_transfer()
            .withf(|_, amount| *amount == Decimal::ONE)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(TxReference("0xleg2".to_string())));

        let sequencer = Sequencer::new(connector_for(session), plan(), Duration::from_secs(20));
        let started = tokio::time::Instant::now();
        let receipts = sequencer.run(&phrase()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(40));
        assert_eq!(
            receipts,
            vec![
                LegReceipt { leg: Leg::Outbound, tx: TxReference("0xleg1".to_string()) },
                LegReceipt { leg: Leg::Swap, tx: TxReference("0xswap".to_string()) },
                LegReceipt { leg: Leg::Inbound, tx: TxReference("0xleg2".to_string()) },
            ]
        );
    }

    #[tokio::test]
    async fn test_step_by_step_stages() {
        let mut session = MockSession::new();
        session.expect_accounts().return_const(accounts());
        session
            .expect_evaluate_transfer()
            .returning(|route| Ok(feasible_plan(route.clone())));
        session
            .expect_execute_transfer()
            .returning(|_, _| Ok(TxReference("0x01".to_string())));
        session
            .expect_execute_swap()
            .returning(|_| Ok(TxReference("0x02".to_string())));

        let mut sequencer = Sequencer::new(connector_for(session), plan(), Duration::ZERO);
        assert_eq!(sequencer.stage(), RunStage::Idle);

        sequencer.derive_signers(&phrase()).await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::SignersDerived);
        sequencer.submit_outbound().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::Leg1Submitted);
        sequencer.settle().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::Leg1Settled);
        sequencer.submit_swap().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::SwapSubmitted);
        sequencer.settle().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::SwapSettled);
        sequencer.submit_inbound().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::Leg2Submitted);
        sequencer.settle().await.unwrap();
        assert_eq!(sequencer.stage(), RunStage::Leg2Settled);
        sequencer.finish().unwrap();
        assert_eq!(sequencer.stage(), RunStage::Done);
        assert_eq!(sequencer.completed().len(), 3);
    }

    #[tokio::test]
    async fn test_out_of_order_transition_rejected() {
        let connector = Arc::new(MockConnector::new());
        let mut sequencer = Sequencer::new(connector, plan(), Duration::ZERO);

        let err = sequencer.submit_swap().await.unwrap_err();
        assert!(matches!(err, RunnerError::InvalidStateTransition { .. }));
        assert!(sequencer.settle().await.is_err());
        assert_eq!(sequencer.stage(), RunStage::Idle);
    }

    #[tokio::test]
    async fn test_slippage_aborts_after_first_leg() {
        let mut session = MockSession::new();
        session.expect_accounts().return_const(accounts());
        session
            .expect_evaluate_transfer()
            .times(1)
            .returning(|route| Ok(feasible_plan(route.clone())));
        session
            .expect_execute_transfer()
            .times(1)
            .returning(|_, _| Ok(TxReference("0xleg1".to_string())));
        session.expect_execute_swap().times(1).returning(|_| {
            Err(RunnerError::SlippageExceeded("Too little received".to_string()))
        });

        let sequencer = Sequencer::new(connector_for(session), plan(), Duration::ZERO);
        let failure = sequencer.run(&phrase()).await.unwrap_err();

        assert_eq!(failure.stage, RunStage::Leg1Settled);
        assert_eq!(failure.completed.len(), 1);
        assert_eq!(failure.completed[0].leg, Leg::Outbound);
        assert!(matches!(failure.source, RunnerError::SlippageExceeded(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_first_leg_aborts_before_swap() {
        let mut session = MockSession::new();
        session.expect_accounts().return_const(accounts());
        session
            .expect_evaluate_transfer()
            .times(1)
            .returning(|route| Ok(feasible_plan(route.clone())));
        session.expect_execute_transfer().times(1).returning(|plan, amount| {
            Err(RunnerError::AmountOutOfRange {
                amount,
                min: plan.min.amount,
                max: plan.max.amount,
            })
        });
        session.expect_execute_swap().never();

        let sequencer = Sequencer::new(connector_for(session), plan(), Duration::ZERO);
        let failure = sequencer.run(&phrase()).await.unwrap_err();

        assert_eq!(failure.stage, RunStage::SignersDerived);
        assert!(failure.completed.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_phrase_aborts_at_idle() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .returning(|_| Err(RunnerError::InvalidPhrase("bad checksum".to_string())));

        let sequencer = Sequencer::new(Arc::new(connector), plan(), Duration::ZERO);
        let failure = sequencer.run(&phrase()).await.unwrap_err();

        assert_eq!(failure.stage, RunStage::Idle);
        assert!(matches!(failure.source, RunnerError::InvalidPhrase(_)));
    }
}
