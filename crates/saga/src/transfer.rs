//! Transfer data model.

use chrono::{DateTime, Utc};
use common::{AccountId, RunId};
use serde::{Deserialize, Serialize};

use crate::error::{ActivityError, ExecutionError, TransferError, VerificationError};
use crate::state::TransferState;

/// A request to move `amount` from `origin` to `destination`.
///
/// Immutable once created and owned by exactly one orchestration run.
/// The amount is expected to be positive but is not validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub origin: AccountId,
    pub destination: AccountId,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(origin: impl Into<AccountId>, destination: impl Into<AccountId>, amount: i64) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            amount,
        }
    }
}

/// Result of a successful customer verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Display name the origin account resolved to.
    pub customer_name: String,
    /// Risk flag reported for the account.
    pub is_risky: bool,
}

/// The outcome of one transfer orchestration, as seen by its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Both legs succeeded.
    Success,
    /// Verification failed or the customer was rejected; no ledger call was made.
    VerificationRejected(VerificationError),
    /// Exactly one leg failed; the other one was compensated.
    ExecutionFailed(ExecutionError),
    /// Both legs failed; no compensation was issued.
    CombinedExecutionFailed {
        charge: ActivityError,
        pay: ActivityError,
    },
}

impl TransferOutcome {
    /// Builds the outcome for a failed execution stage.
    pub fn from_execution(err: ExecutionError) -> Self {
        match err {
            ExecutionError::CombinedFailure { charge, pay } => {
                TransferOutcome::CombinedExecutionFailed { charge, pay }
            }
            other => TransferOutcome::ExecutionFailed(other),
        }
    }

    /// Returns true if the transfer went through.
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }

    /// Returns the error for a failed outcome, if any.
    pub fn error(&self) -> Option<TransferError> {
        self.clone().into_result().err()
    }

    /// Collapses the outcome into a single result.
    pub fn into_result(self) -> Result<(), TransferError> {
        match self {
            TransferOutcome::Success => Ok(()),
            TransferOutcome::VerificationRejected(err) => Err(err.into()),
            TransferOutcome::ExecutionFailed(err) => Err(err.into()),
            TransferOutcome::CombinedExecutionFailed { charge, pay } => {
                Err(ExecutionError::CombinedFailure { charge, pay }.into())
            }
        }
    }
}

/// Record of a finished orchestration run.
#[derive(Debug, Clone)]
pub struct TransferRun {
    pub run_id: RunId,
    pub request: TransferRequest,
    pub outcome: TransferOutcome,
    /// Every state entered, in order, from `Start` to `Done`.
    pub history: Vec<TransferState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferRun {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
