//! Drives [`AuditRepository::cleanup_older_than`] (spec §9), retiring
//! audit rows past the retention window. Backs both the interval
//! sweeper and `POST /cron/cleanup-audit-logs`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::AuditRepository;

pub const DEFAULT_BATCH_SIZE: i64 = 1000;
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

pub async fn run_once(
    audit: &dyn AuditRepository,
    retention_days: i64,
    batch_size: i64,
) -> Result<u64, OrchestratorError> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let deleted = audit.cleanup_older_than(cutoff, batch_size).await?;
    tracing::info!(deleted, retention_days, "audit log cleanup sweep complete");
    Ok(deleted)
}

pub fn spawn(
    audit: Arc<dyn AuditRepository>,
    tick: Duration,
    retention_days: i64,
    batch_size: i64,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(super::run_sweeper("audit_cleanup", tick, shutdown, move || {
        let audit = audit.clone();
        async move {
            if let Err(e) = run_once(audit.as_ref(), retention_days, batch_size).await {
                tracing::warn!(error = %e, "audit cleanup sweep errored");
            }
        }
    }))
}
