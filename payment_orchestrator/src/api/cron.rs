//! Time-driven endpoints (spec §4.5, §6): `POST /cron/process-billing`,
//! `POST /cron/verify-ach`, `POST /cron/cleanup-audit-logs`. Each is
//! authenticated by the shared cron secret — `X-Cron-Secret` header,
//! `Authorization: Bearer`, or (discouraged) a `secret` query param —
//! and invokes the identical `run_once` function the matching
//! background sweeper under `jobs` calls on its own schedule, so an
//! on-demand trigger and the steady-state tick never drift apart.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::audit::Actor;
use crate::domain::error::OrchestratorError;
use crate::infrastructure::trust::cron::{verify_cron_secret, CronCredentials};

use super::error::ApiResult;
use super::router::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct CronQuery {
    pub secret: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CronRequestBody {
    pub as_of_date: Option<NaiveDate>,
    pub batch_size: Option<i64>,
    pub retention_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub processed: u64,
    pub processed_at: chrono::DateTime<Utc>,
}

fn authenticate_cron(
    configured_secret: &str,
    headers: &HeaderMap,
    query_secret: Option<&str>,
) -> Result<(), OrchestratorError> {
    let header = headers.get("X-Cron-Secret").and_then(|v| v.to_str().ok());
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let credentials = CronCredentials {
        header,
        authorization,
        query_secret,
    };
    if verify_cron_secret(configured_secret, credentials) {
        Ok(())
    } else {
        Err(OrchestratorError::Unauthenticated)
    }
}

/// Optional JSON body on a cron request is accepted as empty — most
/// schedulers POST with no body at all, and every field here already
/// has a sensible default.
async fn read_body(bytes: axum::body::Bytes) -> CronRequestBody {
    if bytes.is_empty() {
        return CronRequestBody::default();
    }
    serde_json::from_slice(&bytes).unwrap_or_default()
}

pub async fn process_billing(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CronQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<CronResponse>> {
    authenticate_cron(&state.cron_secret, &headers, query.secret.as_deref())?;
    let body = read_body(body).await;
    let as_of = body.as_of_date.unwrap_or_else(|| Utc::now().date_naive());
    let batch_size = body
        .batch_size
        .unwrap_or(crate::jobs::billing::DEFAULT_BATCH_SIZE);

    let summary = crate::jobs::billing::run_once(&state.subscriptions, as_of, batch_size).await?;
    state
        .audit
        .record(crate::domain::audit::AuditLog {
            id: common::AuditLogId::new(),
            timestamp: Utc::now(),
            actor: Actor::Cron.as_storage_string(),
            entity: "subscription_billing_batch".to_string(),
            entity_id: as_of.to_string(),
            action: "process_due_billing".to_string(),
            metadata: serde_json::json!({
                "billed": summary.billed,
                "failed": summary.failed,
                "past_due": summary.past_due,
                "skipped": summary.skipped,
            }),
        })
        .await
        .ok();

    Ok(Json(CronResponse {
        success: true,
        processed: (summary.billed + summary.failed + summary.past_due + summary.skipped) as u64,
        processed_at: Utc::now(),
    }))
}

pub async fn verify_ach(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CronQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<CronResponse>> {
    authenticate_cron(&state.cron_secret, &headers, query.secret.as_deref())?;
    let body = read_body(body).await;
    let batch_size = body
        .batch_size
        .unwrap_or(crate::jobs::ach_verification::DEFAULT_BATCH_SIZE);

    let promoted = crate::jobs::ach_verification::run_once(
        &state.payment_methods,
        crate::jobs::ach_verification::DEFAULT_VERIFICATION_DELAY,
        batch_size,
    )
    .await?;

    Ok(Json(CronResponse {
        success: true,
        processed: promoted,
        processed_at: Utc::now(),
    }))
}

pub async fn cleanup_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CronQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<CronResponse>> {
    authenticate_cron(&state.cron_secret, &headers, query.secret.as_deref())?;
    let body = read_body(body).await;
    let retention_days = body
        .retention_days
        .unwrap_or(crate::jobs::audit_cleanup::DEFAULT_RETENTION_DAYS);
    let batch_size = body
        .batch_size
        .unwrap_or(crate::jobs::audit_cleanup::DEFAULT_BATCH_SIZE);

    let deleted =
        crate::jobs::audit_cleanup::run_once(state.audit.as_ref(), retention_days, batch_size)
            .await?;

    Ok(Json(CronResponse {
        success: true,
        processed: deleted,
        processed_at: Utc::now(),
    }))
}
