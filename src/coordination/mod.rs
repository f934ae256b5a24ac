//! Run coordination
//!
//! The sequencer walks a fixed order of legs:
//! 1. Derive both signers from the secret phrase
//! 2. Transfer the input asset from chain A to chain B
//! 3. Swap it on chain B through the router
//! 4. Transfer the output asset back to chain A

pub mod engine;
pub mod session;
pub mod state;

pub use engine::{RunPlan, Sequencer};
pub use session::LiveConnector;
