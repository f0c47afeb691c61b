//! Background sweepers (spec §9: "a ticker channel selects against a
//! shutdown channel; on tick, one sweep iteration runs to completion
//! before the next tick fires. Cancellation of the shutdown channel is
//! the only exit."). Each sweeper here is the counterpart of the
//! teacher's `RetryFailedTransactionJob`: a `tokio::time::interval`
//! loop that runs one batch per tick and logs-and-continues past a
//! single row's failure. The one addition over the teacher's bare
//! `loop { interval.tick().await; job.run().await; }` is the shutdown
//! side of the `select!`, since this spec (unlike the teacher's)
//! requires sweepers to stop cleanly rather than being abandoned when
//! the process exits.
//!
//! `infrastructure::storage::run_pool_monitor` is a fourth sweeper of
//! this shape but lives in `infrastructure` since it watches pool
//! state rather than driving a business sweep.

pub mod ach_verification;
pub mod audit_cleanup;
pub mod billing;
pub mod jwt_cleanup;

use std::time::Duration;
use tokio::sync::watch;

/// Runs `sweep` once per `tick`, stopping as soon as `shutdown` changes.
/// Shared driver for every sweeper below so each one only has to
/// provide its own single-iteration logic.
pub(crate) async fn run_sweeper<F, Fut>(
    name: &'static str,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut sweep: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(tick);
    tracing::info!(sweeper = name, "sweeper started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!(sweeper = name, "sweeper shutting down");
                    break;
                }
            }
        }
    }
}
