//! Gateway decorator enforcing time budgets and retrying transient failures.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::AccountId;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use super::{ActivityGateway, ActivityKind, ActivityOptions};
use crate::error::ActivityError;

/// Default number of activities allowed to run at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Wraps a gateway with per-attempt timeouts, a total budget and
/// exponential backoff.
///
/// A semaphore bounds how many activities execute at the same time,
/// standing in for a worker pool.
#[derive(Debug, Clone)]
pub struct RetryingGateway<G> {
    inner: G,
    options: ActivityOptions,
    permits: Arc<Semaphore>,
}

impl<G: ActivityGateway> RetryingGateway<G> {
    /// Creates a retrying gateway around `inner`.
    pub fn new(inner: G, options: ActivityOptions) -> Self {
        Self {
            inner,
            options,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    /// Sets how many activities may run at once.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Returns the options applied to each call.
    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    /// Returns the wrapped gateway.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn execute<T, F, Fut>(&self, activity: ActivityKind, mut op: F) -> Result<T, ActivityError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let deadline = Instant::now() + self.options.schedule_to_close;
        let mut backoff = self.options.initial_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            metrics::counter!("activity_attempts_total", "activity" => activity.as_str())
                .increment(1);

            let result = self.attempt(activity, deadline, op()).await;

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::warn!(%activity, attempts, error = %err, "activity failed permanently");
                return Err(err);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.options.attempts_exhausted(attempts) || remaining <= backoff {
                tracing::error!(%activity, attempts, error = %err, "activity retry budget exhausted");
                return Err(ActivityError::Exhausted {
                    activity,
                    attempts,
                    last: Box::new(err),
                });
            }

            tracing::warn!(
                %activity,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "activity attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = self.options.next_backoff(backoff);
        }
    }

    /// Runs one attempt once a worker permit is free.
    ///
    /// Waiting for the permit is charged to the total budget, so the
    /// per-attempt budget is only computed after the permit is held.
    async fn attempt<T, Fut>(
        &self,
        activity: ActivityKind,
        deadline: Instant,
        fut: Fut,
    ) -> Result<T, ActivityError>
    where
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let _permit = match tokio::time::timeout_at(deadline, self.permits.acquire()).await {
            Ok(permit) => permit.map_err(|_| ActivityError::Cancelled { activity })?,
            Err(_) => {
                tracing::warn!(%activity, "no worker free before the total budget ran out");
                return Err(ActivityError::TimedOut {
                    activity,
                    after: self.options.schedule_to_close,
                });
            }
        };

        let budget = self
            .options
            .start_to_close
            .min(deadline.saturating_duration_since(Instant::now()));
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(ActivityError::TimedOut {
                activity,
                after: budget,
            }),
        }
    }
}

#[async_trait]
impl<G: ActivityGateway> ActivityGateway for RetryingGateway<G> {
    async fn get_customer_details(&self, account: &AccountId) -> Result<String, ActivityError> {
        self.execute(ActivityKind::GetCustomerDetails, move || {
            self.inner.get_customer_details(account)
        })
        .await
    }

    async fn is_risky_customer(&self, account: &AccountId) -> Result<bool, ActivityError> {
        self.execute(ActivityKind::IsRiskyCustomer, move || {
            self.inner.is_risky_customer(account)
        })
        .await
    }

    async fn charge_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.execute(ActivityKind::ChargeAccount, move || {
            self.inner.charge_account(account, amount)
        })
        .await
    }

    async fn pay_to_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.execute(ActivityKind::PayToAccount, move || {
            self.inner.pay_to_account(account, amount)
        })
        .await
    }

    async fn revert_charge(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.execute(ActivityKind::RevertCharge, move || {
            self.inner.revert_charge(account, amount)
        })
        .await
    }

    async fn revert_payment(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        self.execute(ActivityKind::RevertPayment, move || {
            self.inner.revert_payment(account, amount)
        })
        .await
    }

    async fn notify_failed_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        self.execute(ActivityKind::NotifyFailedTransfer, move || {
            self.inner.notify_failed_transfer(origin, destination, amount)
        })
        .await
    }

    async fn notify_successful_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        self.execute(ActivityKind::NotifySuccessfulTransfer, move || {
            self.inner
                .notify_successful_transfer(origin, destination, amount)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::RecordingGateway;
    use std::time::Duration;

    fn options() -> ActivityOptions {
        ActivityOptions {
            start_to_close: Duration::from_secs(15),
            schedule_to_close: Duration::from_secs(60),
            max_attempts: 0,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
            backoff_coefficient: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let inner = RecordingGateway::new();
        inner.fail_times(ActivityKind::ChargeAccount, 2);
        let gateway = RetryingGateway::new(inner.clone(), options());

        gateway
            .charge_account(&AccountId::new("A1"), 100)
            .await
            .unwrap();

        assert_eq!(inner.count(ActivityKind::ChargeAccount), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_returns_immediately() {
        let inner = RecordingGateway::new();
        inner.fail_permanently(ActivityKind::PayToAccount);
        let gateway = RetryingGateway::new(inner.clone(), options());

        let err = gateway
            .pay_to_account(&AccountId::new("B1"), 100)
            .await
            .unwrap_err();

        assert!(matches!(err, ActivityError::Failed { retryable: false, .. }));
        assert_eq!(inner.count(ActivityKind::PayToAccount), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_limit_exhausts() {
        let inner = RecordingGateway::new();
        inner.fail_on(ActivityKind::RevertCharge);
        let gateway = RetryingGateway::new(inner.clone(), options().max_attempts(3));

        let err = gateway
            .revert_charge(&AccountId::new("A1"), 100)
            .await
            .unwrap_err();

        match err {
            ActivityError::Exhausted {
                activity,
                attempts,
                last,
            } => {
                assert_eq!(activity, ActivityKind::RevertCharge);
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ActivityError::Failed { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(inner.count(ActivityKind::RevertCharge), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempts_time_out_within_total_budget() {
        let inner = RecordingGateway::new();
        inner.set_delay(ActivityKind::IsRiskyCustomer, Duration::from_secs(3600));
        let gateway = RetryingGateway::new(inner.clone(), options());

        let started = Instant::now();
        let err = gateway
            .is_risky_customer(&AccountId::new("A1"))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        match err {
            ActivityError::Exhausted { attempts, last, .. } => {
                // 15s + 1s + 15s + 2s + 15s + 4s = 52s; the fourth attempt is cut at 60s.
                assert_eq!(attempts, 4);
                assert!(matches!(*last, ActivityError::TimedOut { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert!(elapsed <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_wait_counts_against_total_budget() {
        let inner = RecordingGateway::new();
        inner.set_delay(ActivityKind::ChargeAccount, Duration::from_secs(3600));
        inner.set_delay(ActivityKind::PayToAccount, Duration::from_secs(3600));
        let mut opts = options();
        opts.schedule_to_close = Duration::from_secs(20);
        let gateway = RetryingGateway::new(inner.clone(), opts).with_max_concurrency(1);
        let origin = AccountId::new("A1");
        let destination = AccountId::new("B1");

        let started = Instant::now();
        let ((charge, charge_elapsed), (pay, pay_elapsed)) = tokio::join!(
            async {
                let result = gateway.charge_account(&origin, 100).await;
                (result, started.elapsed())
            },
            async {
                let result = gateway.pay_to_account(&destination, 100).await;
                (result, started.elapsed())
            },
        );

        assert!(charge_elapsed <= Duration::from_secs(20), "charge took {charge_elapsed:?}");
        assert!(pay_elapsed <= Duration::from_secs(20), "pay took {pay_elapsed:?}");
        for err in [charge.unwrap_err(), pay.unwrap_err()] {
            match err {
                ActivityError::Exhausted { last, .. } => {
                    assert!(matches!(*last, ActivityError::TimedOut { .. }));
                }
                other => panic!("expected Exhausted, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_passes_value_through() {
        let inner = RecordingGateway::new();
        inner.set_customer_name("Ada");
        let gateway = RetryingGateway::new(inner, options());

        let name = gateway
            .get_customer_details(&AccountId::new("A1"))
            .await
            .unwrap();
        assert_eq!(name, "Ada");
    }
}
