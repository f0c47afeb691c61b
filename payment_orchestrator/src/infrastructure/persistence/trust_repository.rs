use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::TrustRepository;
use crate::domain::trust::{IpAllowlistEntry, JwtBlacklistEntry};

pub struct PostgresTrustRepository {
    pool: PgPool,
}

impl PostgresTrustRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrustRepository for PostgresTrustRepository {
    async fn blacklist_jti(&self, entry: JwtBlacklistEntry) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"
            INSERT INTO jwt_blacklist (jti, expires_at) VALUES ($1, $2)
            ON CONFLICT (jti) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.jti)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool, OrchestratorError> {
        let row: Option<(String,)> =
            sqlx::query_as(r#"SELECT jti FROM jwt_blacklist WHERE jti = $1"#)
                .bind(jti)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn sweep_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, OrchestratorError> {
        let result = sqlx::query(r#"DELETE FROM jwt_blacklist WHERE expires_at <= $1"#)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn is_ip_allowed(&self, ip: &str) -> Result<bool, OrchestratorError> {
        let row: Option<(String,)> =
            sqlx::query_as(r#"SELECT ip FROM ip_allowlist WHERE ip = $1"#)
                .bind(ip)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn add_allowed_ip(&self, entry: IpAllowlistEntry) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"
            INSERT INTO ip_allowlist (ip, description, created_at) VALUES ($1, $2, $3)
            ON CONFLICT (ip) DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(&entry.ip)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
