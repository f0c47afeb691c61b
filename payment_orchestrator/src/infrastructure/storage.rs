//! Storage layer (C1, spec §4.1). The teacher's repositories each hold
//! a bare `PgPool` and issue one statement per call
//! (`PostgresTransactionRepository::save`); this spec needs
//! multi-statement, row-locked transactions (parent-sum locking,
//! subscription billing, default-flag swaps), so this module adds the
//! one primitive the teacher never needed: `with_tx`.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::{Config, PoolConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Single-row lookup, ~2s (spec §5).
    Simple,
    /// Joins/aggregations, ~5s.
    Complex,
    /// Sweeps, ~30s.
    Report,
}

impl TimeoutClass {
    pub fn duration(&self) -> Duration {
        match self {
            TimeoutClass::Simple => Duration::from_secs(2),
            TimeoutClass::Complex => Duration::from_secs(5),
            TimeoutClass::Report => Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub async fn connect(database_url: &str, pool_config: &PoolConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .min_connections(pool_config.min_connections)
            .max_lifetime(pool_config.max_lifetime)
            .idle_timeout(pool_config.idle_timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `f` against a connection bound to an open transaction. On
    /// `Ok`, commits; on `Err`, rolls back and propagates the error
    /// untouched; a panic inside `f` unwinds through the rollback (the
    /// `Transaction` guard rolls back on drop) and re-raises, matching
    /// spec §4.1's "re-throws on panic after rolling back".
    pub async fn with_tx<F, Fut, T, E>(&self, timeout: TimeoutClass, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut SqlxTransaction<'_, Postgres>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| E::from(StorageError::Database(e)))?;

        let result = tokio::time::timeout(timeout.duration(), f(&mut tx)).await;

        match result {
            Ok(Ok(value)) => {
                tx.commit()
                    .await
                    .map_err(|e| E::from(StorageError::Database(e)))?;
                Ok(value)
            }
            Ok(Err(e)) => {
                let _ = tx.rollback().await;
                Err(e)
            }
            Err(_) => {
                let _ = tx.rollback().await;
                Err(E::from(StorageError::Timeout(timeout.duration())))
            }
        }
    }

    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    pub fn num_idle(&self) -> usize {
        self.pool.num_idle()
    }
}

/// Samples pool utilization on an interval (spec §4.1, §5: "Pool
/// monitors utilization; logs warning at 80%, error at 95%"). Lives in
/// `infrastructure` rather than `jobs` because it watches
/// infrastructure state rather than driving a business sweep, but is
/// spawned the same way the teacher spawns `RetryFailedTransactionJob`.
pub async fn run_pool_monitor(storage: Storage, max_connections: u32, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let size = storage.size();
        let idle = storage.num_idle() as u32;
        let in_use = size.saturating_sub(idle);
        let utilization = in_use as f64 / max_connections.max(1) as f64;

        if utilization >= 0.95 {
            error!(utilization, size, idle, "connection pool utilization critical");
        } else if utilization >= 0.80 {
            warn!(utilization, size, idle, "connection pool utilization high");
        }
    }
}

pub fn config_pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .max_lifetime(config.pool.max_lifetime)
        .idle_timeout(config.pool.idle_timeout)
}
