//! Subscription RPC handlers (spec §6): create, update (carries status
//! for pause/resume/cancel), get, list-by-customer, and the on-demand
//! billing-batch trigger.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use common::{CustomerId, MerchantId, PaymentMethodId, SubscriptionId};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::service::Scope;
use crate::use_cases::subscription_engine::{CreateSubscriptionRequest, UpdateSubscriptionRequest};

use super::auth::authenticate;
use super::dto::{
    parse_subscription_status, BillingBatchSummaryView, CreateSubscriptionRequestDto, ListQuery,
    SubscriptionView, UpdateSubscriptionRequestDto,
};
use super::error::ApiResult;
use super::router::AppState;

fn parse_merchant_id(raw: &str) -> Result<MerchantId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(MerchantId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid merchant id {raw}")))
}

fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(SubscriptionId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid subscription id {raw}")))
}

fn parse_payment_method_id(raw: &str) -> Result<PaymentMethodId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(PaymentMethodId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid payment method id {raw}")))
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateSubscriptionRequestDto>,
) -> ApiResult<Json<SubscriptionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::SubscriptionManage], merchant_id).await?;
    let req = CreateSubscriptionRequest {
        merchant_id,
        customer_id: CustomerId::from(body.customer_id),
        payment_method_id: parse_payment_method_id(&body.payment_method_id)?,
        amount: body.amount.into_money()?,
        interval: body.interval.into_interval()?,
        start_date: body.start_date,
        max_retries: body.max_retries,
        metadata: body.metadata,
    };
    let subscription = state.subscriptions.create_subscription(req).await?;
    Ok(Json(subscription.into()))
}

pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<UpdateSubscriptionRequestDto>,
) -> ApiResult<Json<SubscriptionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::SubscriptionManage], merchant_id).await?;
    let req = UpdateSubscriptionRequest {
        merchant_id,
        id: parse_subscription_id(&id)?,
        amount: body.amount.map(|m| m.into_money()).transpose()?,
        payment_method_id: body
            .payment_method_id
            .map(|raw| parse_payment_method_id(&raw))
            .transpose()?,
        status: body.status.map(|raw| parse_subscription_status(&raw)).transpose()?,
    };
    let subscription = state.subscriptions.update_subscription(req).await?;
    Ok(Json(subscription.into()))
}

pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<SubscriptionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::SubscriptionManage], merchant_id).await?;
    let id = parse_subscription_id(&id)?;
    let subscription = state.subscriptions.get_subscription(merchant_id, id).await?;
    Ok(Json(subscription.into()))
}

pub async fn list_customer_subscriptions(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, customer_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<SubscriptionView>>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::SubscriptionManage], merchant_id).await?;
    let customer_id = CustomerId::from(customer_id);
    let subscriptions = state
        .subscriptions
        .list_customer_subscriptions(merchant_id, &customer_id)
        .await?;
    Ok(Json(subscriptions.into_iter().map(Into::into).collect()))
}

/// On-demand trigger for the same batch [`crate::jobs::billing`] runs
/// on a schedule; `ListQuery.limit` doubles as the batch size here
/// since there is no natural "offset" for a billing batch.
pub async fn process_due_billing(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<BillingBatchSummaryView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::SubscriptionManage], merchant_id).await?;
    let batch_size = query.limit.unwrap_or(crate::jobs::billing::DEFAULT_BATCH_SIZE);
    let summary = crate::jobs::billing::run_once(
        &state.subscriptions,
        chrono::Utc::now().date_naive(),
        batch_size,
    )
    .await?;
    Ok(Json(summary.into()))
}
