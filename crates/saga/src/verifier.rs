//! Customer verification stage.

use std::str::FromStr;
use std::sync::Arc;

use common::AccountId;
use thiserror::Error;

use crate::activities::{ActivityGateway, ActivityKind, join_activity};
use crate::error::VerificationError;
use crate::transfer::VerificationResult;

/// What to do when the risk check flags a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskPolicy {
    /// Reject the transfer before any ledger call.
    #[default]
    Reject,
    /// Log the flag and let the transfer proceed.
    ///
    /// Matches deployments that only ever logged risky customers.
    LogOnly,
}

impl RiskPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskPolicy::Reject => "reject",
            RiskPolicy::LogOnly => "log-only",
        }
    }
}

impl std::fmt::Display for RiskPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown risk policy '{0}', expected 'reject' or 'log-only'")]
pub struct UnknownRiskPolicy(pub String);

impl FromStr for RiskPolicy {
    type Err = UnknownRiskPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(RiskPolicy::Reject),
            "log-only" | "log_only" | "logonly" => Ok(RiskPolicy::LogOnly),
            other => Err(UnknownRiskPolicy(other.to_string())),
        }
    }
}

/// Resolves the origin customer and checks their risk flag.
pub struct CustomerVerifier<G> {
    gateway: Arc<G>,
    risk_policy: RiskPolicy,
}

impl<G> CustomerVerifier<G>
where
    G: ActivityGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            risk_policy: RiskPolicy::default(),
        }
    }

    pub fn with_risk_policy(mut self, risk_policy: RiskPolicy) -> Self {
        self.risk_policy = risk_policy;
        self
    }

    pub fn risk_policy(&self) -> RiskPolicy {
        self.risk_policy
    }

    /// Verifies the customer owning `account`.
    ///
    /// Lookup and risk check are dispatched together before either is
    /// awaited. A lookup failure wins over a risk-check failure; the
    /// pending risk check is then left to finish on its own.
    #[tracing::instrument(skip(self))]
    pub async fn verify(
        &self,
        account: &AccountId,
    ) -> Result<VerificationResult, VerificationError> {
        let lookup = {
            let gateway = Arc::clone(&self.gateway);
            let account = account.clone();
            tokio::spawn(async move { gateway.get_customer_details(&account).await })
        };
        let risk = {
            let gateway = Arc::clone(&self.gateway);
            let account = account.clone();
            tokio::spawn(async move { gateway.is_risky_customer(&account).await })
        };

        let customer_name = join_activity(ActivityKind::GetCustomerDetails, lookup)
            .await
            .map_err(|cause| {
                tracing::error!(%account, error = %cause, "failed to get customer details");
                VerificationError::LookupFailed {
                    account: account.clone(),
                    cause,
                }
            })?;

        let is_risky = join_activity(ActivityKind::IsRiskyCustomer, risk)
            .await
            .map_err(|cause| {
                tracing::error!(%account, error = %cause, "failed to resolve customer risk");
                VerificationError::RiskCheckFailed {
                    account: account.clone(),
                    cause,
                }
            })?;

        if is_risky {
            match self.risk_policy {
                RiskPolicy::Reject => {
                    tracing::warn!(%account, customer = %customer_name, "customer is risky, rejecting");
                    return Err(VerificationError::CustomerFlagged {
                        account: account.clone(),
                    });
                }
                RiskPolicy::LogOnly => {
                    tracing::warn!(
                        %account,
                        customer = %customer_name,
                        "customer is risky, continuing under log-only policy"
                    );
                }
            }
        } else {
            tracing::info!(%account, customer = %customer_name, "customer is not risky");
        }

        Ok(VerificationResult {
            customer_name,
            is_risky,
        })
    }
}
