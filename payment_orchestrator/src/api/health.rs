//! `GET /healthz` (spec §6): unauthenticated liveness probe.

use axum::http::StatusCode;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
