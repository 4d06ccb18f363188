//! In-memory gateway that records calls, for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::AccountId;

use super::{ActivityGateway, ActivityKind};
use crate::error::ActivityError;

/// A single recorded activity call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityCall {
    GetCustomerDetails(AccountId),
    IsRiskyCustomer(AccountId),
    ChargeAccount(AccountId, i64),
    PayToAccount(AccountId, i64),
    RevertCharge(AccountId, i64),
    RevertPayment(AccountId, i64),
    NotifyFailedTransfer(AccountId, AccountId, i64),
    NotifySuccessfulTransfer(AccountId, AccountId, i64),
}

impl ActivityCall {
    /// Returns which activity was called.
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityCall::GetCustomerDetails(_) => ActivityKind::GetCustomerDetails,
            ActivityCall::IsRiskyCustomer(_) => ActivityKind::IsRiskyCustomer,
            ActivityCall::ChargeAccount(..) => ActivityKind::ChargeAccount,
            ActivityCall::PayToAccount(..) => ActivityKind::PayToAccount,
            ActivityCall::RevertCharge(..) => ActivityKind::RevertCharge,
            ActivityCall::RevertPayment(..) => ActivityKind::RevertPayment,
            ActivityCall::NotifyFailedTransfer(..) => ActivityKind::NotifyFailedTransfer,
            ActivityCall::NotifySuccessfulTransfer(..) => ActivityKind::NotifySuccessfulTransfer,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    Permanent,
    Times(u32),
}

#[derive(Debug, Default)]
struct RecordingState {
    started: Vec<ActivityCall>,
    completed: Vec<ActivityCall>,
    failures: HashMap<ActivityKind, Failure>,
    delays: HashMap<ActivityKind, Duration>,
    customer_name: Option<String>,
    risky: bool,
}

/// In-memory gateway for testing.
///
/// Every call succeeds immediately unless configured otherwise. Calls
/// are recorded both when they start and when they return.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingGateway {
    /// Creates a new recording gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call to `activity` fail with a retryable error.
    pub fn fail_on(&self, activity: ActivityKind) {
        self.set_failure(activity, Failure::Always);
    }

    /// Makes every call to `activity` fail with a non-retryable error.
    pub fn fail_permanently(&self, activity: ActivityKind) {
        self.set_failure(activity, Failure::Permanent);
    }

    /// Makes the next `times` calls to `activity` fail.
    pub fn fail_times(&self, activity: ActivityKind, times: u32) {
        self.set_failure(activity, Failure::Times(times));
    }

    /// Removes any configured failure for `activity`.
    pub fn clear_failure(&self, activity: ActivityKind) {
        self.state.write().unwrap().failures.remove(&activity);
    }

    /// Delays every call to `activity`.
    pub fn set_delay(&self, activity: ActivityKind, delay: Duration) {
        self.state.write().unwrap().delays.insert(activity, delay);
    }

    /// Sets the risk flag returned by `is_risky_customer`.
    pub fn set_risky(&self, risky: bool) {
        self.state.write().unwrap().risky = risky;
    }

    /// Sets the name returned by `get_customer_details`.
    pub fn set_customer_name(&self, name: impl Into<String>) {
        self.state.write().unwrap().customer_name = Some(name.into());
    }

    /// Returns the calls in the order they started.
    pub fn calls(&self) -> Vec<ActivityCall> {
        self.state.read().unwrap().started.clone()
    }

    /// Returns the calls in the order they returned.
    pub fn completed(&self) -> Vec<ActivityCall> {
        self.state.read().unwrap().completed.clone()
    }

    /// Returns how many times `activity` was called.
    pub fn count(&self, activity: ActivityKind) -> usize {
        self.state
            .read()
            .unwrap()
            .started
            .iter()
            .filter(|call| call.kind() == activity)
            .count()
    }

    /// Returns how many ledger calls (compensations included) were made.
    pub fn ledger_call_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .started
            .iter()
            .filter(|call| call.kind().is_ledger_mutation())
            .count()
    }

    fn set_failure(&self, activity: ActivityKind, failure: Failure) {
        self.state
            .write()
            .unwrap()
            .failures
            .insert(activity, failure);
    }

    async fn record(&self, call: ActivityCall) -> Result<(), ActivityError> {
        let kind = call.kind();
        let (delay, failure) = {
            let mut state = self.state.write().unwrap();
            state.started.push(call.clone());
            let failure = match state.failures.get_mut(&kind) {
                Some(Failure::Always) => Some(ActivityError::failed(kind, "injected failure")),
                Some(Failure::Permanent) => {
                    Some(ActivityError::non_retryable(kind, "injected permanent failure"))
                }
                Some(Failure::Times(remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(ActivityError::failed(kind, "injected transient failure"))
                }
                _ => None,
            };
            (state.delays.get(&kind).copied(), failure)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.write().unwrap().completed.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActivityGateway for RecordingGateway {
    async fn get_customer_details(&self, account: &AccountId) -> Result<String, ActivityError> {
        self.record(ActivityCall::GetCustomerDetails(account.clone()))
            .await?;
        let name = self.state.read().unwrap().customer_name.clone();
        Ok(name.unwrap_or_else(|| format!("Customer {account}")))
    }

    async fn is_risky_customer(&self, account: &AccountId) -> Result<bool, ActivityError> {
        self.record(ActivityCall::IsRiskyCustomer(account.clone()))
            .await?;
        Ok(self.state.read().unwrap().risky)
    }

    async fn charge_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.record(ActivityCall::ChargeAccount(account.clone(), amount))
            .await
    }

    async fn pay_to_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.record(ActivityCall::PayToAccount(account.clone(), amount))
            .await
    }

    async fn revert_charge(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.record(ActivityCall::RevertCharge(account.clone(), amount))
            .await
    }

    async fn revert_payment(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.record(ActivityCall::RevertPayment(account.clone(), amount))
            .await
    }

    async fn notify_failed_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        self.record(ActivityCall::NotifyFailedTransfer(
            origin.clone(),
            destination.clone(),
            amount,
        ))
        .await
    }

    async fn notify_successful_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        self.record(ActivityCall::NotifySuccessfulTransfer(
            origin.clone(),
            destination.clone(),
            amount,
        ))
        .await
    }
}
