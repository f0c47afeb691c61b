//! Merchant provisioning RPC handlers (spec §6): register, update,
//! MAC rotation, get, list. Authenticated via [`super::auth::authenticate_admin`]
//! rather than the per-merchant JWT path — there is no grant to check
//! until after `register_merchant` runs.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use common::MerchantId;
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::use_cases::merchant_admin::{RegisterMerchantRequest, UpdateMerchantRequest};

use super::auth::authenticate_admin;
use super::dto::{
    parse_environment, ListQuery, MerchantView, RegisterMerchantRequestDto,
    RotateMerchantMacRequestDto, UpdateMerchantRequestDto,
};
use super::error::ApiResult;
use super::router::AppState;

fn parse_merchant_id(raw: &str) -> Result<MerchantId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(MerchantId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid merchant id {raw}")))
}

pub async fn register_merchant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RegisterMerchantRequestDto>,
) -> ApiResult<Json<MerchantView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let req = RegisterMerchantRequest {
        slug: body.slug,
        gateway_identity: body.gateway_identity.into(),
        mac_secret: body.mac_secret,
        environment: parse_environment(&body.environment)?,
        rate_limit_per_second: body.rate_limit_per_second,
        rate_limit_burst: body.rate_limit_burst,
    };
    let merchant = state.merchant_admin.register_merchant(req).await?;
    Ok(Json(merchant.into()))
}

pub async fn update_merchant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateMerchantRequestDto>,
) -> ApiResult<Json<MerchantView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_merchant_id(&id)?;
    let req = UpdateMerchantRequest {
        gateway_identity: body.gateway_identity.map(Into::into),
        active: body.active,
        rate_limit_per_second: body.rate_limit_per_second,
        rate_limit_burst: body.rate_limit_burst,
    };
    let merchant = state.merchant_admin.update_merchant(id, req).await?;
    Ok(Json(merchant.into()))
}

pub async fn rotate_merchant_mac(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RotateMerchantMacRequestDto>,
) -> ApiResult<Json<serde_json::Value>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_merchant_id(&id)?;
    state
        .merchant_admin
        .rotate_merchant_mac(id, body.new_mac_secret)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn get_merchant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<MerchantView>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let id = parse_merchant_id(&id)?;
    let merchant = state.merchant_admin.get_merchant(id).await?;
    Ok(Json(merchant.into()))
}

pub async fn list_merchants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<MerchantView>>> {
    authenticate_admin(&state.admin_secret, &headers)?;
    let merchants = state
        .merchant_admin
        .list_merchants(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(merchants.into_iter().map(Into::into).collect()))
}
