//! Transfer orchestrator driving the saga state machine.

use std::sync::Arc;

use chrono::Utc;
use common::RunId;

use crate::activities::ActivityGateway;
use crate::executor::TransferExecutor;
use crate::notifier::Notifier;
use crate::state::TransferState;
use crate::transfer::{TransferOutcome, TransferRequest, TransferRun};
use crate::verifier::{CustomerVerifier, RiskPolicy};

/// A state together with the data it carries.
enum Step {
    Start,
    Verifying,
    Executing,
    Notifying(TransferOutcome),
    Done(TransferOutcome),
}

impl Step {
    fn state(&self) -> TransferState {
        match self {
            Step::Start => TransferState::Start,
            Step::Verifying => TransferState::Verifying,
            Step::Executing => TransferState::Executing,
            Step::Notifying(outcome) if outcome.is_success() => TransferState::NotifyingSuccess,
            Step::Notifying(_) => TransferState::NotifyingFailure,
            Step::Done(_) => TransferState::Done,
        }
    }
}

/// Sequences verification, execution and notification for one transfer.
///
/// Ledger calls are only issued once verification has fully succeeded,
/// and the outcome is only returned after the notification call returned.
pub struct TransferOrchestrator<G> {
    verifier: CustomerVerifier<G>,
    executor: TransferExecutor<G>,
    notifier: Notifier<G>,
}

impl<G> TransferOrchestrator<G>
where
    G: ActivityGateway + 'static,
{
    /// Creates an orchestrator whose stages share one gateway.
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            verifier: CustomerVerifier::new(Arc::clone(&gateway)),
            executor: TransferExecutor::new(Arc::clone(&gateway)),
            notifier: Notifier::new(gateway),
        }
    }

    pub fn with_risk_policy(mut self, risk_policy: RiskPolicy) -> Self {
        self.verifier = self.verifier.with_risk_policy(risk_policy);
        self
    }

    pub fn risk_policy(&self) -> RiskPolicy {
        self.verifier.risk_policy()
    }

    /// Runs a transfer under a fresh run ID.
    pub async fn run(&self, request: TransferRequest) -> TransferRun {
        self.run_with_id(RunId::new(), request).await
    }

    /// Runs a transfer to completion and returns its record.
    #[tracing::instrument(
        skip(self, run_id, request),
        fields(
            run_id = %run_id,
            origin = %request.origin,
            destination = %request.destination,
            amount = request.amount
        )
    )]
    pub async fn run_with_id(&self, run_id: RunId, request: TransferRequest) -> TransferRun {
        metrics::counter!("transfer_saga_executions_total").increment(1);
        let started_at = Utc::now();

        let mut history = vec![TransferState::Start];
        let mut step = Step::Start;

        let outcome = loop {
            step = match step {
                Step::Start => Step::Verifying,
                Step::Verifying => match self.verifier.verify(&request.origin).await {
                    Ok(verified) => {
                        tracing::info!(customer = %verified.customer_name, "customer verified");
                        Step::Executing
                    }
                    Err(e) => Step::Notifying(TransferOutcome::VerificationRejected(e)),
                },
                Step::Executing => {
                    debug_assert!(
                        history
                            .last()
                            .is_some_and(TransferState::allows_ledger_mutation),
                        "ledger mutation outside the executing state"
                    );
                    match self.executor.execute(&request).await {
                        Ok(()) => Step::Notifying(TransferOutcome::Success),
                        Err(e) => Step::Notifying(TransferOutcome::from_execution(e)),
                    }
                }
                Step::Notifying(outcome) => {
                    self.notify(&request, &outcome).await;
                    Step::Done(outcome)
                }
                Step::Done(outcome) => break outcome,
            };

            let next = step.state();
            debug_assert!(
                history
                    .last()
                    .is_some_and(|current| current.can_transition_to(next)),
                "illegal transfer state transition to {next}"
            );
            tracing::debug!(state = %next, "transfer state changed");
            history.push(next);
        };

        let run = TransferRun {
            run_id,
            request,
            outcome,
            history,
            started_at,
            finished_at: Utc::now(),
        };

        let duration = run
            .duration()
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        metrics::histogram!("transfer_saga_duration_seconds").record(duration);

        match run.outcome.error() {
            None => {
                metrics::counter!("transfer_saga_completed").increment(1);
                tracing::info!(duration, "transfer completed successfully");
            }
            Some(err) => {
                let category = err.category();
                metrics::counter!("transfer_saga_failed", "category" => category.as_str())
                    .increment(1);
                tracing::warn!(%category, error = %err, duration, "transfer failed");
            }
        }

        run
    }

    /// Reports the outcome. Failures are logged and never change it.
    async fn notify(&self, request: &TransferRequest, outcome: &TransferOutcome) {
        let result = if outcome.is_success() {
            self.notifier.notify_success(request).await
        } else {
            self.notifier.notify_failure(request).await
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "failed to notify transfer outcome");
        }
    }
}
