//! Terminal outcome notifications.

use std::sync::Arc;

use crate::activities::ActivityGateway;
use crate::error::ActivityError;
use crate::transfer::TransferRequest;

/// Reports the final outcome of a transfer.
pub struct Notifier<G> {
    gateway: Arc<G>,
}

impl<G: ActivityGateway> Notifier<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn notify_success(&self, transfer: &TransferRequest) -> Result<(), ActivityError> {
        self.gateway
            .notify_successful_transfer(&transfer.origin, &transfer.destination, transfer.amount)
            .await
    }

    pub async fn notify_failure(&self, transfer: &TransferRequest) -> Result<(), ActivityError> {
        self.gateway
            .notify_failed_transfer(&transfer.origin, &transfer.destination, transfer.amount)
            .await
    }
}
