//! Run stages and leg receipts

use crate::error::RunnerError;
use crate::transfer::TxReference;

use std::fmt;
use thiserror::Error;

/// Linear stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    SignersDerived,
    Leg1Submitted,
    Leg1Settled,
    SwapSubmitted,
    SwapSettled,
    Leg2Submitted,
    Leg2Settled,
    Done,
}

impl RunStage {
    /// The only stage reachable from this one
    pub fn next(self) -> Option<RunStage> {
        use RunStage::*;
        match self {
            Idle => Some(SignersDerived),
            SignersDerived => Some(Leg1Submitted),
            Leg1Submitted => Some(Leg1Settled),
            Leg1Settled => Some(SwapSubmitted),
            SwapSubmitted => Some(SwapSettled),
            SwapSettled => Some(Leg2Submitted),
            Leg2Submitted => Some(Leg2Settled),
            Leg2Settled => Some(Done),
            Done => None,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// On-chain operations of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Outbound,
    Swap,
    Inbound,
}

/// A submitted leg and its transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegReceipt {
    pub leg: Leg,
    pub tx: TxReference,
}

/// Terminal failure: where the run stopped and what already went on-chain
#[derive(Error, Debug)]
#[error("run aborted at {stage} after {} completed leg(s): {source}", .completed.len())]
pub struct SequenceFailure {
    pub stage: RunStage,
    pub completed: Vec<LegReceipt>,
    pub source: RunnerError,
}
