//! Drives [`TrustRepository::sweep_expired_blacklist`]. Not exposed
//! through a cron endpoint (spec §6 lists only billing/ACH/audit
//! sweeps) — this one is purely internal upkeep for the `jwt_blacklist`
//! table, which would otherwise grow forever since every verified
//! token's `jti` is blacklisted on logout/rotation but never deleted
//! (spec §4.5) until its `expires_at` has passed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::TrustRepository;

pub async fn run_once(trust: &dyn TrustRepository) -> Result<u64, OrchestratorError> {
    let removed = trust.sweep_expired_blacklist(Utc::now()).await?;
    tracing::info!(removed, "jwt blacklist cleanup sweep complete");
    Ok(removed)
}

pub fn spawn(
    trust: Arc<dyn TrustRepository>,
    tick: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(super::run_sweeper("jwt_cleanup", tick, shutdown, move || {
        let trust = trust.clone();
        async move {
            if let Err(e) = run_once(trust.as_ref()).await {
                tracing::warn!(error = %e, "jwt blacklist cleanup sweep errored");
            }
        }
    }))
}
