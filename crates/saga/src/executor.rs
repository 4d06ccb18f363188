//! Ledger execution stage with single-leg compensation.

use std::sync::Arc;

use common::AccountId;

use crate::activities::{ActivityGateway, ActivityKind, join_activity};
use crate::error::{ActivityError, ExecutionError};
use crate::transfer::TransferRequest;

/// One side of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Charge,
    Payment,
}

impl Leg {
    fn revert_activity(self) -> ActivityKind {
        match self {
            Leg::Charge => ActivityKind::RevertCharge,
            Leg::Payment => ActivityKind::RevertPayment,
        }
    }
}

/// Runs the charge and payment legs and compensates a lone success.
///
/// | charge | pay  | compensation  | error             |
/// |--------|------|---------------|-------------------|
/// | ok     | ok   | none          | none              |
/// | fail   | ok   | revert pay    | `ChargeFailed`    |
/// | ok     | fail | revert charge | `PaymentFailed`   |
/// | fail   | fail | none          | `CombinedFailure` |
pub struct TransferExecutor<G> {
    gateway: Arc<G>,
}

impl<G> TransferExecutor<G>
where
    G: ActivityGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Executes both ledger legs of `transfer`.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, transfer: &TransferRequest) -> Result<(), ExecutionError> {
        let amount = transfer.amount;
        let charge = {
            let gateway = Arc::clone(&self.gateway);
            let origin = transfer.origin.clone();
            tokio::spawn(async move { gateway.charge_account(&origin, amount).await })
        };
        let pay = {
            let gateway = Arc::clone(&self.gateway);
            let destination = transfer.destination.clone();
            tokio::spawn(async move { gateway.pay_to_account(&destination, amount).await })
        };

        let charge_result = join_activity(ActivityKind::ChargeAccount, charge).await;
        let pay_result = join_activity(ActivityKind::PayToAccount, pay).await;

        match (charge_result, pay_result) {
            (Ok(()), Ok(())) => {
                tracing::info!(
                    origin = %transfer.origin,
                    destination = %transfer.destination,
                    amount,
                    "both ledger legs succeeded"
                );
                Ok(())
            }
            (Err(cause), Ok(())) => {
                tracing::error!(error = %cause, "charge failed");
                let compensation = self
                    .compensate(Leg::Payment, &transfer.destination, amount)
                    .await
                    .err();
                Err(ExecutionError::ChargeFailed {
                    cause,
                    compensation,
                })
            }
            (Ok(()), Err(cause)) => {
                tracing::error!(error = %cause, "payment failed");
                let compensation = self
                    .compensate(Leg::Charge, &transfer.origin, amount)
                    .await
                    .err();
                Err(ExecutionError::PaymentFailed {
                    cause,
                    compensation,
                })
            }
            (Err(charge), Err(pay)) => {
                tracing::error!(error = %charge, "charge failed");
                tracing::error!(error = %pay, "payment failed");
                // Unverified: a leg that timed out may still have been applied.
                tracing::warn!("both ledger legs failed, assuming neither was applied; no compensation issued");
                Err(ExecutionError::CombinedFailure { charge, pay })
            }
        }
    }

    /// Reverts `leg` and waits for the revert to finish.
    ///
    /// The revert runs in its own task, so it completes even if the
    /// caller stops polling.
    async fn compensate(
        &self,
        leg: Leg,
        account: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        let activity = leg.revert_activity();
        tracing::info!(%activity, %account, amount, "compensating");

        let handle = {
            let gateway = Arc::clone(&self.gateway);
            let account = account.clone();
            tokio::spawn(async move {
                match leg {
                    Leg::Charge => gateway.revert_charge(&account, amount).await,
                    Leg::Payment => gateway.revert_payment(&account, amount).await,
                }
            })
        };

        let result = join_activity(activity, handle).await;
        match &result {
            Ok(()) => {
                metrics::counter!(
                    "transfer_compensations_total",
                    "activity" => activity.as_str(),
                    "status" => "ok"
                )
                .increment(1);
                tracing::info!(%activity, %account, amount, "compensation completed");
            }
            Err(e) => {
                metrics::counter!(
                    "transfer_compensations_total",
                    "activity" => activity.as_str(),
                    "status" => "failed"
                )
                .increment(1);
                tracing::error!(
                    %activity,
                    %account,
                    amount,
                    error = %e,
                    "compensation failed, ledger left inconsistent"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::activities::{ActivityCall, RecordingGateway};

    fn setup() -> (TransferExecutor<RecordingGateway>, RecordingGateway) {
        let gateway = RecordingGateway::new();
        let executor = TransferExecutor::new(Arc::new(gateway.clone()));
        (executor, gateway)
    }

    fn transfer() -> TransferRequest {
        TransferRequest::new("A1", "B1", 100)
    }

    #[tokio::test]
    async fn test_both_legs_succeed() {
        let (executor, gateway) = setup();

        executor.execute(&transfer()).await.unwrap();

        assert_eq!(gateway.count(ActivityKind::ChargeAccount), 1);
        assert_eq!(gateway.count(ActivityKind::PayToAccount), 1);
        assert_eq!(gateway.count(ActivityKind::RevertCharge), 0);
        assert_eq!(gateway.count(ActivityKind::RevertPayment), 0);
    }

    #[tokio::test]
    async fn test_charge_failure_reverts_payment() {
        let (executor, gateway) = setup();
        gateway.fail_on(ActivityKind::ChargeAccount);

        let err = executor.execute(&transfer()).await.unwrap_err();

        assert!(matches!(
            err,
            ExecutionError::ChargeFailed {
                compensation: None,
                ..
            }
        ));
        assert_eq!(
            gateway.calls().last(),
            Some(&ActivityCall::RevertPayment(AccountId::new("B1"), 100))
        );
        assert_eq!(gateway.count(ActivityKind::RevertCharge), 0);
    }

    #[tokio::test]
    async fn test_payment_failure_reverts_charge() {
        let (executor, gateway) = setup();
        gateway.fail_on(ActivityKind::PayToAccount);

        let err = executor.execute(&transfer()).await.unwrap_err();

        assert!(matches!(err, ExecutionError::PaymentFailed { .. }));
        assert_eq!(
            gateway.calls().last(),
            Some(&ActivityCall::RevertCharge(AccountId::new("A1"), 100))
        );
        assert_eq!(gateway.count(ActivityKind::RevertPayment), 0);
    }

    #[tokio::test]
    async fn test_both_legs_fail_without_compensation() {
        let (executor, gateway) = setup();
        gateway.fail_on(ActivityKind::ChargeAccount);
        gateway.fail_on(ActivityKind::PayToAccount);

        let err = executor.execute(&transfer()).await.unwrap_err();

        match &err {
            ExecutionError::CombinedFailure { charge, pay } => {
                assert_eq!(charge.activity(), ActivityKind::ChargeAccount);
                assert_eq!(pay.activity(), ActivityKind::PayToAccount);
            }
            other => panic!("expected CombinedFailure, got {other:?}"),
        }
        assert!(err.to_string().contains(" | "));
        assert_eq!(gateway.count(ActivityKind::RevertCharge), 0);
        assert_eq!(gateway.count(ActivityKind::RevertPayment), 0);
    }

    #[tokio::test]
    async fn test_failed_compensation_is_reported_with_original_cause() {
        let (executor, gateway) = setup();
        gateway.fail_on(ActivityKind::PayToAccount);
        gateway.fail_on(ActivityKind::RevertCharge);

        let err = executor.execute(&transfer()).await.unwrap_err();

        match &err {
            ExecutionError::PaymentFailed {
                cause,
                compensation: Some(comp),
            } => {
                assert_eq!(cause.activity(), ActivityKind::PayToAccount);
                assert_eq!(comp.activity(), ActivityKind::RevertCharge);
            }
            other => panic!("expected PaymentFailed with compensation error, got {other:?}"),
        }
        assert!(err.is_inconsistent());
        assert_eq!(gateway.count(ActivityKind::RevertCharge), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compensation_completes_before_returning() {
        let (executor, gateway) = setup();
        gateway.fail_on(ActivityKind::ChargeAccount);
        gateway.set_delay(ActivityKind::RevertPayment, Duration::from_millis(40));

        executor.execute(&transfer()).await.unwrap_err();

        assert!(
            gateway
                .completed()
                .contains(&ActivityCall::RevertPayment(AccountId::new("B1"), 100))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_legs_run_concurrently() {
        let (executor, gateway) = setup();
        gateway.set_delay(ActivityKind::ChargeAccount, Duration::from_millis(30));
        gateway.set_delay(ActivityKind::PayToAccount, Duration::from_millis(30));

        let started = tokio::time::Instant::now();
        executor.execute(&transfer()).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(60));
    }
}
