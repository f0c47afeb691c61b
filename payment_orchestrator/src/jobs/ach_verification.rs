//! Drives [`PaymentMethodEngine::verify_pending_ach_batch`] (spec
//! §4.7, §9): promotes ACH payment methods whose pre-note has had time
//! to clear from `pending` to `verified`. Backs both the interval
//! sweeper and `POST /cron/verify-ach`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::error::OrchestratorError;
use crate::use_cases::payment_method_engine::PaymentMethodEngine;

pub const DEFAULT_BATCH_SIZE: i64 = 200;
/// A pre-note is considered clear after this much time has elapsed
/// without a return, matching the ACH return-window assumption in
/// spec §4.7's "separate verification sweep" note.
pub const DEFAULT_VERIFICATION_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

pub async fn run_once(
    engine: &PaymentMethodEngine,
    verification_delay: Duration,
    batch_size: i64,
) -> Result<u64, OrchestratorError> {
    let cutoff = Utc::now()
        - chrono::Duration::from_std(verification_delay)
            .unwrap_or_else(|_| chrono::Duration::zero());
    let promoted = engine.verify_pending_ach_batch(cutoff, batch_size).await?;
    tracing::info!(promoted, "ACH verification sweep complete");
    Ok(promoted)
}

pub fn spawn(
    engine: Arc<PaymentMethodEngine>,
    tick: Duration,
    verification_delay: Duration,
    batch_size: i64,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(super::run_sweeper(
        "ach_verification",
        tick,
        shutdown,
        move || {
            let engine = engine.clone();
            async move {
                if let Err(e) = run_once(&engine, verification_delay, batch_size).await {
                    tracing::warn!(error = %e, "ACH verification sweep errored");
                }
            }
        },
    ))
}
