//! Saga error types.
//!
//! Errors are layered: [`ActivityError`] comes from a single delegated
//! call, [`VerificationError`] and [`ExecutionError`] from the two
//! fan-out stages, and [`TransferError`] is what the orchestrator hands
//! back to its caller.

use std::time::Duration;

use common::AccountId;
use thiserror::Error;

use crate::activities::ActivityKind;

/// Terminal error of a delegated activity call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivityError {
    /// The activity ran and reported a failure.
    #[error("{activity} failed: {reason}")]
    Failed {
        activity: ActivityKind,
        reason: String,
        retryable: bool,
    },

    /// A single attempt exceeded its per-try budget.
    #[error("{activity} timed out after {after:?}")]
    TimedOut {
        activity: ActivityKind,
        after: Duration,
    },

    /// The total budget ran out before an attempt succeeded.
    #[error("{activity} gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        activity: ActivityKind,
        attempts: u32,
        last: Box<ActivityError>,
    },

    /// The task running the activity was aborted or panicked.
    #[error("{activity} was cancelled before completing")]
    Cancelled { activity: ActivityKind },
}

impl ActivityError {
    /// A failure the gateway may retry.
    pub fn failed(activity: ActivityKind, reason: impl Into<String>) -> Self {
        ActivityError::Failed {
            activity,
            reason: reason.into(),
            retryable: true,
        }
    }

    /// A failure the gateway must not retry.
    pub fn non_retryable(activity: ActivityKind, reason: impl Into<String>) -> Self {
        ActivityError::Failed {
            activity,
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Returns the activity this error belongs to.
    pub fn activity(&self) -> ActivityKind {
        match self {
            ActivityError::Failed { activity, .. }
            | ActivityError::TimedOut { activity, .. }
            | ActivityError::Exhausted { activity, .. }
            | ActivityError::Cancelled { activity } => *activity,
        }
    }

    /// Returns true if another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Failed { retryable, .. } => *retryable,
            ActivityError::TimedOut { .. } => true,
            ActivityError::Exhausted { .. } | ActivityError::Cancelled { .. } => false,
        }
    }
}

/// Why a customer could not be verified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerificationError {
    /// The account could not be resolved to a customer.
    #[error("customer lookup failed for account {account}: {cause}")]
    LookupFailed {
        account: AccountId,
        #[source]
        cause: ActivityError,
    },

    /// The risk evaluation itself failed.
    #[error("risk check failed for account {account}: {cause}")]
    RiskCheckFailed {
        account: AccountId,
        #[source]
        cause: ActivityError,
    },

    /// The customer was flagged as risky. Business rejection, not a fault.
    #[error("customer with account {account} is flagged as risky")]
    CustomerFlagged { account: AccountId },
}

impl VerificationError {
    /// Returns true for rejections that no retry would change.
    pub fn is_business_rejection(&self) -> bool {
        matches!(self, VerificationError::CustomerFlagged { .. })
    }
}

/// Why the two ledger legs did not both succeed.
///
/// A `compensation` of `Some` means the compensating call failed too and
/// the ledger is left inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Charging the origin failed; the payment leg was reverted.
    #[error("charge failed: {cause}{}", compensation_suffix(.compensation))]
    ChargeFailed {
        #[source]
        cause: ActivityError,
        compensation: Option<ActivityError>,
    },

    /// Paying the destination failed; the charge leg was reverted.
    #[error("payment failed: {cause}{}", compensation_suffix(.compensation))]
    PaymentFailed {
        #[source]
        cause: ActivityError,
        compensation: Option<ActivityError>,
    },

    /// Both legs failed; nothing was compensated.
    #[error("{charge} | {pay}")]
    CombinedFailure {
        charge: ActivityError,
        pay: ActivityError,
    },
}

fn compensation_suffix(compensation: &Option<ActivityError>) -> String {
    match compensation {
        Some(err) => format!(" (compensation also failed: {err})"),
        None => String::new(),
    }
}

impl ExecutionError {
    /// Returns true if a compensating call failed.
    pub fn is_inconsistent(&self) -> bool {
        match self {
            ExecutionError::ChargeFailed { compensation, .. }
            | ExecutionError::PaymentFailed { compensation, .. } => compensation.is_some(),
            ExecutionError::CombinedFailure { .. } => false,
        }
    }
}

/// Coarse classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    BusinessRejection,
    ActivityFailure,
    CombinedFailure,
    CompensationFailure,
}

impl ErrorCategory {
    /// Returns the category name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BusinessRejection => "business_rejection",
            ErrorCategory::ActivityFailure => "activity_failure",
            ErrorCategory::CombinedFailure => "combined_failure",
            ErrorCategory::CompensationFailure => "compensation_failure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error a transfer orchestration returns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("customer verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("transfer execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

impl TransferError {
    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::Verification(err) if err.is_business_rejection() => {
                ErrorCategory::BusinessRejection
            }
            TransferError::Verification(_) => ErrorCategory::ActivityFailure,
            TransferError::Execution(ExecutionError::CombinedFailure { .. }) => {
                ErrorCategory::CombinedFailure
            }
            TransferError::Execution(err) if err.is_inconsistent() => {
                ErrorCategory::CompensationFailure
            }
            TransferError::Execution(_) => ErrorCategory::ActivityFailure,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, TransferError>;
