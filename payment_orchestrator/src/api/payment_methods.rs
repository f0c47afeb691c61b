//! Payment-method RPC handlers (spec §6): the tokenization-session
//! begin step, finance-token conversion, ACH account storage, listing,
//! default selection, and soft delete. Same shape as
//! [`super::transactions`] — authenticate, parse, call the engine, map
//! the response.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use common::{CustomerId, MerchantId, PaymentMethodId};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::service::Scope;
use crate::use_cases::payment_method_engine::{
    BeginTokenizationRequest, ConvertFinanceTokenRequest, StoreAchAccountRequest,
};

use super::auth::authenticate;
use super::dto::{
    parse_ach_account_type, BeginTokenizationRequestDto, ConvertFinanceTokenRequestDto,
    ListPaymentMethodsQuery, PaymentMethodView, StoreAchAccountRequestDto, TokenizationSessionView,
};
use super::error::ApiResult;
use super::router::AppState;

fn parse_merchant_id(raw: &str) -> Result<MerchantId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(MerchantId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid merchant id {raw}")))
}

fn parse_payment_method_id(raw: &str) -> Result<PaymentMethodId, OrchestratorError> {
    Uuid::parse_str(raw)
        .map(PaymentMethodId::from_uuid)
        .map_err(|_| OrchestratorError::InvalidRequest(format!("invalid payment method id {raw}")))
}

pub async fn begin_tokenization(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<BeginTokenizationRequestDto>,
) -> ApiResult<Json<TokenizationSessionView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let req = BeginTokenizationRequest {
        merchant_id,
        customer_id: body.customer_id.map(CustomerId::from),
        amount: body.amount.into_money()?,
        return_url: body.return_url,
        cancel_url: body.cancel_url,
        idempotency_key: body.idempotency_key,
        metadata: body.metadata,
    };
    let session = state.payment_methods.begin_tokenization(req).await?;
    Ok(Json(TokenizationSessionView {
        transaction_id: session.transaction_id.to_string(),
        auth_code: session.auth_code,
        expires_in_secs: session.expires_in_secs,
    }))
}

pub async fn convert_finance_token(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ConvertFinanceTokenRequestDto>,
) -> ApiResult<Json<PaymentMethodView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let req = ConvertFinanceTokenRequest {
        merchant_id,
        customer_id: CustomerId::from(body.customer_id),
        finance_token: body.finance_token,
        last_four: body.last_four,
        card: crate::domain::payment_method::CardDetails {
            brand: body.card_brand,
            exp_month: body.exp_month,
            exp_year: body.exp_year,
        },
    };
    let method = state
        .payment_methods
        .convert_finance_token_to_storage_token(req)
        .await?;
    Ok(Json(method.into()))
}

pub async fn store_ach_account(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<StoreAchAccountRequestDto>,
) -> ApiResult<Json<PaymentMethodView>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let req = StoreAchAccountRequest {
        merchant_id,
        customer_id: CustomerId::from(body.customer_id),
        routing_nbr: body.routing_nbr,
        account_nbr: body.account_nbr,
        account_type: parse_ach_account_type(&body.account_type)?,
        last_four: body.last_four,
        bank_name: body.bank_name,
    };
    let method = state.payment_methods.store_ach_account(req).await?;
    Ok(Json(method.into()))
}

pub async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(query): Query<ListPaymentMethodsQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<PaymentMethodView>>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let customer_id = CustomerId::from(query.customer_id);
    let methods = state
        .payment_methods
        .list_payment_methods(merchant_id, &customer_id)
        .await?;
    Ok(Json(methods.into_iter().map(Into::into).collect()))
}

pub async fn set_default_payment_method(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, customer_id, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let id = parse_payment_method_id(&id)?;
    let customer_id = CustomerId::from(customer_id);
    state
        .payment_methods
        .set_default_payment_method(merchant_id, &customer_id, id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn delete_payment_method(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, customer_id, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let merchant_id = parse_merchant_id(&merchant_id)?;
    authenticate(&state.jwt, &state.rate_limiter, &headers, &[Scope::PaymentMethodManage], merchant_id).await?;
    let id = parse_payment_method_id(&id)?;
    let customer_id = CustomerId::from(customer_id);
    state
        .payment_methods
        .delete_payment_method(merchant_id, &customer_id, id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
