//! Service (caller identity) provisioning RPC handlers (spec §6):
//! create, update, key rotation, get, and merchant-grant management.
//! Authenticated via [`super::auth::authenticate_admin`], same reasoning
//! as [`super::merchants`].

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use common::{MerchantId, ServiceId};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::use_cases::service_admin::{CreateServiceRequest, UpdateServiceRequest};

use super::auth::authenticate_admin;
use super::dto::{
    parse_scope, parse_service_environment, CreateServiceRequestDto, GrantAccessRequestDto,
    RotateServiceKeyRequestDto, ServiceMerchantGrantView, ServiceView, UpdateServiceRequestDto,
};
use super::error::ApiResult;
use super::router::AppState;

fn parse_service_id(raw: &str) -> Result<ServiceId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(ServiceId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid service id {raw}")))
}

fn parse_merchant_id(raw: &str) -> Result<MerchantId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(MerchantId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid merchant id {raw}")))
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequestDto>,
) -> ApiResult<Json<ServiceView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let req = CreateServiceRequest {
        external_id: body.external_id,
        public_key_pem: body.public_key_pem,
        environment: parse_service_environment(&body.environment)?,
        rate_limit_per_second: body.rate_limit_per_second,
        rate_limit_burst: body.rate_limit_burst,
    };
    let service = state.service_admin.create_service(req).await?;
    Ok(Json(service.into()))
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateServiceRequestDto>,
) -> ApiResult<Json<ServiceView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_service_id(&id)?;
    let req = UpdateServiceRequest {
        active: body.active,
        rate_limit_per_second: body.rate_limit_per_second,
        rate_limit_burst: body.rate_limit_burst,
    };
    let service = state.service_admin.update_service(id, req).await?;
    Ok(Json(service.into()))
}

pub async fn rotate_service_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RotateServiceKeyRequestDto>,
) -> ApiResult<Json<ServiceView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_service_id(&id)?;
    let service = state
        .service_admin
        .rotate_service_key(id, body.new_public_key_pem)
        .await?;
    Ok(Json(service.into()))
}

pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ServiceView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_service_id(&id)?;
    let service = state.service_admin.get_service(id).await?;
    Ok(Json(service.into()))
}

pub async fn grant_access(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<GrantAccessRequestDto>,
) -> ApiResult<Json<ServiceMerchantGrantView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let service_id = parse_service_id(&id)?;
    let merchant_id = parse_merchant_id(&body.merchant_id)?;
    let scopes = body
        .scopes
        .iter()
        .map(|s| parse_scope(s))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let grant = state
        .service_admin
        .grant_access(service_id, merchant_id, scopes)
        .await?;
    Ok(Json(grant.into()))
}

pub async fn revoke_access(
    State(state): State<Arc<AppState>>,
    Path((id, merchant_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let service_id = parse_service_id(&id)?;
    let merchant_id = parse_merchant_id(&merchant_id)?;
    state.service_admin.revoke_access(service_id, merchant_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
