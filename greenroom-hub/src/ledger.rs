use async_trait::async_trait;
use log::info;

use crate::HubError;

/// The ledger collaborator: mints a commemorative token for a user after
/// a leaderboard or role event.
///
/// Calls are fire-and-forget from the hub's point of view; an
/// implementation owns its own retry policy and its failures never touch
/// room state.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn mint(&self, user_id: &str, reason: &str) -> Result<(), HubError>;
}

/// A [Ledger] that only logs, for deployments without a wallet backend
pub struct NoopLedger;

#[async_trait]
impl Ledger for NoopLedger {
    async fn mint(&self, user_id: &str, reason: &str) -> Result<(), HubError> {
        info!("Skipping mint for {} ({}): no ledger configured", user_id, reason);
        Ok(())
    }
}
