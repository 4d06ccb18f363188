//! Activity gateway trait and implementations.
//!
//! Every side effect the saga performs goes through [`ActivityGateway`].
//! The core never retries or times out a call itself; that is the job of
//! the gateway ([`RetryingGateway`] when running in-process).

pub mod options;
pub mod recording;
pub mod retrying;
pub mod simulated;

use async_trait::async_trait;
use common::AccountId;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::ActivityError;

pub use options::{ActivityOptions, OptionsError};
pub use recording::{ActivityCall, RecordingGateway};
pub use retrying::RetryingGateway;
pub use simulated::{SimulatedActivities, SimulatedDelays};

/// The operations the saga delegates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    GetCustomerDetails,
    IsRiskyCustomer,
    ChargeAccount,
    PayToAccount,
    RevertCharge,
    RevertPayment,
    NotifyFailedTransfer,
    NotifySuccessfulTransfer,
}

impl ActivityKind {
    /// Returns the activity name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::GetCustomerDetails => "GetCustomerDetails",
            ActivityKind::IsRiskyCustomer => "IsRiskyCustomer",
            ActivityKind::ChargeAccount => "ChargeAccount",
            ActivityKind::PayToAccount => "PayToAccount",
            ActivityKind::RevertCharge => "RevertCharge",
            ActivityKind::RevertPayment => "RevertPayment",
            ActivityKind::NotifyFailedTransfer => "NotifyFailedTransfer",
            ActivityKind::NotifySuccessfulTransfer => "NotifySuccessfulTransfer",
        }
    }

    /// Returns true for the calls that mutate a ledger, compensations included.
    pub fn is_ledger_mutation(&self) -> bool {
        matches!(
            self,
            ActivityKind::ChargeAccount
                | ActivityKind::PayToAccount
                | ActivityKind::RevertCharge
                | ActivityKind::RevertPayment
        )
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Executes the saga's delegated operations.
///
/// Implementations own retry and timeout policy. An `Err` is terminal:
/// the caller will not call again.
#[async_trait]
pub trait ActivityGateway: Send + Sync {
    /// Resolves an account to the customer's display name.
    async fn get_customer_details(&self, account: &AccountId) -> Result<String, ActivityError>;

    /// Evaluates whether the account's owner is risky.
    async fn is_risky_customer(&self, account: &AccountId) -> Result<bool, ActivityError>;

    /// Debits `amount` from `account`.
    async fn charge_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError>;

    /// Credits `amount` to `account`.
    async fn pay_to_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError>;

    /// Undoes a previous charge.
    async fn revert_charge(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError>;

    /// Undoes a previous payment.
    async fn revert_payment(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError>;

    async fn notify_failed_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError>;

    async fn notify_successful_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError>;
}

/// Awaits a dispatched activity task.
///
/// A task that panicked or was aborted surfaces as [`ActivityError::Cancelled`].
pub(crate) async fn join_activity<T>(
    activity: ActivityKind,
    handle: JoinHandle<Result<T, ActivityError>>,
) -> Result<T, ActivityError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(%activity, error = %e, "activity task did not complete");
            Err(ActivityError::Cancelled { activity })
        }
    }
}
