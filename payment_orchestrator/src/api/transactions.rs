//! Transaction RPC handlers (spec §6): authorize, capture, sale, void,
//! refund, get, list. Each handler authenticates, parses its DTO into
//! the engine's request type, and hands off to
//! [`crate::use_cases::transaction_engine::TransactionEngine`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use common::{CustomerId, MerchantId, TransactionId};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::service::Scope;
use crate::use_cases::transaction_engine::{CaptureRequest, ChargeRequest, RefundRequest, VoidRequest};

use super::auth::authenticate;
use super::dto::{
    CaptureRequestDto, ChargeRequestDto, GetTransactionQuery, ListTransactionsQuery,
    RefundRequestDto, TransactionView, TransactionWithLineageView, VoidRequestDto,
};
use super::error::ApiResult;
use super::router::AppState;

fn parse_merchant_id(raw: &str) -> Result<MerchantId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(MerchantId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid merchant id {raw}")))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(TransactionId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid transaction id {raw}")))
}

fn charge_request(merchant_id: MerchantId, body: ChargeRequestDto) -> ApiResult<ChargeRequest> {
    Ok(ChargeRequest {
        merchant_id,
        customer_id: body.customer_id.map(CustomerId::from),
        payment_method_id: body
            .payment_method_id
            .map(|raw| {
                Uuid::parse_str(&raw)
                    .map(common::PaymentMethodId::from_uuid)
                    .map_err(|_| OrchestratorError::InvalidRequest("invalid payment_method_id".into()))
            })
            .transpose()?,
        amount: body.amount.into_money()?,
        source: body.source.into_source()?,
        idempotency_key: body.idempotency_key,
        metadata: body.metadata,
    })
}

pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ChargeRequestDto>,
) -> ApiResult<Json<TransactionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentCreate], merchant_id).await?;
    let req = charge_request(merchant_id, body)?;
    let transaction = state.transactions.authorize(req).await?;
    Ok(Json(transaction.into()))
}

pub async fn sale(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ChargeRequestDto>,
) -> ApiResult<Json<TransactionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentCreate], merchant_id).await?;
    let req = charge_request(merchant_id, body)?;
    let transaction = state.transactions.sale(req).await?;
    Ok(Json(transaction.into()))
}

pub async fn capture(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CaptureRequestDto>,
) -> ApiResult<Json<TransactionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentUpdate], merchant_id).await?;
    let req = CaptureRequest {
        merchant_id,
        parent_id: parse_transaction_id(&body.parent_id)?,
        amount: body.amount.map(|m| m.into_money()).transpose()?,
        idempotency_key: body.idempotency_key,
        metadata: body.metadata,
    };
    let transaction = state.transactions.capture(req).await?;
    Ok(Json(transaction.into()))
}

pub async fn void(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VoidRequestDto>,
) -> ApiResult<Json<TransactionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentUpdate], merchant_id).await?;
    let req = VoidRequest {
        merchant_id,
        parent_id: parse_transaction_id(&body.parent_id)?,
        idempotency_key: body.idempotency_key,
        metadata: body.metadata,
    };
    let transaction = state.transactions.void(req).await?;
    Ok(Json(transaction.into()))
}

pub async fn refund(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RefundRequestDto>,
) -> ApiResult<Json<TransactionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentRefund], merchant_id).await?;
    let req = RefundRequest {
        merchant_id,
        parent_id: parse_transaction_id(&body.parent_id)?,
        amount: body.amount.map(|m| m.into_money()).transpose()?,
        idempotency_key: body.idempotency_key,
        metadata: body.metadata,
    };
    let transaction = state.transactions.refund(req).await?;
    Ok(Json(transaction.into()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, id)): Path<(String, String)>,
    Query(query): Query<GetTransactionQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<TransactionWithLineageView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentRead], merchant_id).await?;
    let id = parse_transaction_id(&id)?;
    let result = state
        .transactions
        .get(merchant_id, id, query.include_lineage)
        .await?;
    Ok(Json(result.into()))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TransactionView>>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentRead], merchant_id).await?;
    let customer_id = query.customer_id.map(CustomerId::from);
    let transactions = state
        .transactions
        .list(
            merchant_id,
            customer_id.as_ref(),
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}
