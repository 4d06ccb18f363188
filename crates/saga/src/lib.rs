//! Money-transfer saga.
//!
//! A transfer runs as a short saga:
//! 1. Verify the origin customer (lookup and risk check, in parallel)
//! 2. Charge the origin and pay the destination (in parallel)
//! 3. Notify the outcome
//!
//! When exactly one ledger leg fails, the leg that succeeded is reverted.
//! When both fail, nothing is reverted. All side effects go through an
//! [`ActivityGateway`], which owns retries and timeouts.

pub mod activities;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod orchestrator;
pub mod state;
pub mod transfer;
pub mod verifier;

pub use activities::{
    ActivityCall, ActivityGateway, ActivityKind, ActivityOptions, OptionsError, RecordingGateway,
    RetryingGateway, SimulatedActivities, SimulatedDelays,
};
pub use error::{
    ActivityError, ErrorCategory, ExecutionError, TransferError, VerificationError,
};
pub use executor::TransferExecutor;
pub use notifier::Notifier;
pub use orchestrator::TransferOrchestrator;
pub use state::TransferState;
pub use transfer::{TransferOutcome, TransferRequest, TransferRun, VerificationResult};
pub use verifier::{CustomerVerifier, RiskPolicy, UnknownRiskPolicy};
