use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::audit::AuditLog;
use crate::domain::error::OrchestratorError;
use crate::domain::repository::AuditRepository;

pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn record(&self, log: AuditLog) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, timestamp, actor, entity, entity_id, action, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id.into_uuid())
        .bind(log.timestamp)
        .bind(&log.actor)
        .bind(&log.entity)
        .bind(&log.entity_id)
        .bind(&log.action)
        .bind(&log.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cleanup_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, OrchestratorError> {
        let result = sqlx::query(
            r#"
            DELETE FROM audit_logs WHERE id IN (
                SELECT id FROM audit_logs WHERE timestamp < $1 ORDER BY timestamp ASC LIMIT $2
            )
            "#,
        )
        .bind(cutoff)
        .bind(batch_size)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
