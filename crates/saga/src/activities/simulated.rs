//! Simulated ledger and notification activities.
//!
//! Stand-ins for the real collaborators: each call sleeps for a fixed
//! delay, logs what it would have done and succeeds.

use std::time::Duration;

use async_trait::async_trait;
use common::AccountId;

use super::ActivityGateway;
use crate::error::ActivityError;

/// Fixed latencies of the simulated activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDelays {
    pub customer_lookup: Duration,
    pub risk_check: Duration,
    pub ledger: Duration,
    pub notification: Duration,
}

impl SimulatedDelays {
    /// No delay at all.
    pub const fn none() -> Self {
        Self {
            customer_lookup: Duration::ZERO,
            risk_check: Duration::ZERO,
            ledger: Duration::ZERO,
            notification: Duration::ZERO,
        }
    }
}

impl Default for SimulatedDelays {
    fn default() -> Self {
        Self {
            customer_lookup: Duration::from_millis(20),
            risk_check: Duration::from_millis(100),
            ledger: Duration::from_millis(30),
            notification: Duration::ZERO,
        }
    }
}

/// Always-succeeding activities with constant delays.
#[derive(Debug, Clone, Default)]
pub struct SimulatedActivities {
    delays: SimulatedDelays,
}

impl SimulatedActivities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(delays: SimulatedDelays) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> SimulatedDelays {
        self.delays
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl ActivityGateway for SimulatedActivities {
    async fn get_customer_details(&self, account: &AccountId) -> Result<String, ActivityError> {
        pause(self.delays.customer_lookup).await;
        tracing::info!(%account, "account identified");
        Ok("Customer 1".to_string())
    }

    async fn is_risky_customer(&self, account: &AccountId) -> Result<bool, ActivityError> {
        pause(self.delays.risk_check).await;
        tracing::info!(%account, "customer is not risky");
        Ok(false)
    }

    async fn charge_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        pause(self.delays.ledger).await;
        tracing::info!(%account, amount, "charging account");
        Ok(())
    }

    async fn pay_to_account(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        pause(self.delays.ledger).await;
        tracing::info!(%account, amount, "paying to account");
        Ok(())
    }

    async fn revert_charge(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        pause(self.delays.ledger).await;
        tracing::info!(%account, amount, "reverting charge");
        Ok(())
    }

    async fn revert_payment(&self, account: &AccountId, amount: i64) -> Result<(), ActivityError> {
        pause(self.delays.ledger).await;
        tracing::info!(%account, amount, "reverting payment");
        Ok(())
    }

    async fn notify_failed_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        pause(self.delays.notification).await;
        tracing::info!(%origin, %destination, amount, "transfer failed");
        Ok(())
    }

    async fn notify_successful_transfer(
        &self,
        origin: &AccountId,
        destination: &AccountId,
        amount: i64,
    ) -> Result<(), ActivityError> {
        pause(self.delays.notification).await;
        tracing::info!(%origin, %destination, amount, "transfer succeeded");
        Ok(())
    }
}
