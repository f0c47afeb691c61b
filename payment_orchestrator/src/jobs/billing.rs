//! Drives [`SubscriptionEngine::process_due_billing`] (spec §4.8,
//! §9). The cron endpoint `POST /cron/process-billing` and the
//! interval sweeper both call [`run_once`] — the HTTP handler for an
//! on-demand/backfill run, the sweeper for the steady-state schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::error::OrchestratorError;
use crate::use_cases::subscription_engine::{BillingBatchSummary, SubscriptionEngine};

pub const DEFAULT_BATCH_SIZE: i64 = 200;

pub async fn run_once(
    engine: &SubscriptionEngine,
    as_of: NaiveDate,
    batch_size: i64,
) -> Result<BillingBatchSummary, OrchestratorError> {
    let summary = engine.process_due_billing(as_of, batch_size).await?;
    tracing::info!(
        billed = summary.billed,
        failed = summary.failed,
        past_due = summary.past_due,
        skipped = summary.skipped,
        "billing sweep complete"
    );
    Ok(summary)
}

pub fn spawn(
    engine: Arc<SubscriptionEngine>,
    tick: Duration,
    batch_size: i64,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(super::run_sweeper("billing", tick, shutdown, move || {
        let engine = engine.clone();
        async move {
            if let Err(e) = run_once(&engine, Utc::now().date_naive(), batch_size).await {
                tracing::warn!(error = %e, "billing sweep errored");
            }
        }
    }))
}
