//! Assembles the `axum::Router` and holds `AppState`, the shared handle
//! every handler reaches into (spec §9: "Cron secret, pool size, and
//! feature flags are passed via configuration structs, not process-wide
//! singletons" — `AppState` is that struct, built once in `main` and
//! shared via `axum::extract::State`, the same shape as the teacher's
//! `transaction_service::api::http_routes::AppState`).

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::domain::repository::AuditRepository;
use crate::infrastructure::credential_cache::MerchantCredentialCache;
use crate::infrastructure::trust::{CallbackVerifier, JwtAuthenticator, RateLimiter};
use crate::use_cases::merchant_admin::MerchantAdminEngine;
use crate::use_cases::payment_method_engine::PaymentMethodEngine;
use crate::use_cases::service_admin::ServiceAdminEngine;
use crate::use_cases::subscription_engine::SubscriptionEngine;
use crate::use_cases::transaction_engine::TransactionEngine;

pub struct AppState {
    pub jwt: JwtAuthenticator,
    pub rate_limiter: RateLimiter,
    pub callback_verifier: CallbackVerifier,
    pub credentials: Arc<MerchantCredentialCache>,
    pub audit: Arc<dyn AuditRepository>,
    pub admin_secret: String,
    pub cron_secret: String,

    pub transactions: Arc<TransactionEngine>,
    pub payment_methods: Arc<PaymentMethodEngine>,
    pub subscriptions: Arc<SubscriptionEngine>,
    pub merchant_admin: MerchantAdminEngine,
    pub service_admin: ServiceAdminEngine,
}

#[derive(OpenApi)]
#[openapi(components(schemas(
    super::dto::MoneyDto,
    super::dto::MoneyView,
    super::dto::ChargeRequestDto,
    super::dto::CaptureRequestDto,
    super::dto::VoidRequestDto,
    super::dto::RefundRequestDto,
    super::dto::TransactionView,
    super::dto::TransactionWithLineageView,
    super::dto::BeginTokenizationRequestDto,
    super::dto::TokenizationSessionView,
    super::dto::ConvertFinanceTokenRequestDto,
    super::dto::StoreAchAccountRequestDto,
    super::dto::PaymentMethodView,
    super::dto::CreateSubscriptionRequestDto,
    super::dto::UpdateSubscriptionRequestDto,
    super::dto::SubscriptionView,
    super::dto::BillingBatchSummaryView,
    super::dto::RegisterMerchantRequestDto,
    super::dto::UpdateMerchantRequestDto,
    super::dto::MerchantView,
    super::dto::CreateServiceRequestDto,
    super::dto::UpdateServiceRequestDto,
    super::dto::ServiceView,
    super::dto::ServiceMerchantGrantView,
)))]
struct ApiDoc;

/// Mounted the way the teacher's `main.rs` mounts its own router: one
/// `.route` per handler, a single `.with_state`, plus the Swagger UI
/// the ambient-stack section of the spec calls for.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(super::health::healthz))
        .route("/callback/browser-post", post(super::callback::browser_post))
        .route("/cron/process-billing", post(super::cron::process_billing))
        .route("/cron/verify-ach", post(super::cron::verify_ach))
        .route(
            "/cron/cleanup-audit-logs",
            post(super::cron::cleanup_audit_logs),
        )
        .route("/merchants", post(super::merchants::register_merchant))
        .route("/merchants", get(super::merchants::list_merchants))
        .route("/merchants/{id}", get(super::merchants::get_merchant))
        .route("/merchants/{id}", axum::routing::patch(super::merchants::update_merchant))
        .route(
            "/merchants/{id}/rotate-mac",
            post(super::merchants::rotate_merchant_mac),
        )
        .route("/services", post(super::services::create_service))
        .route("/services/{id}", get(super::services::get_service))
        .route(
            "/services/{id}",
            axum::routing::patch(super::services::update_service),
        )
        .route(
            "/services/{id}/rotate-key",
            post(super::services::rotate_service_key),
        )
        .route("/services/{id}/grants", post(super::services::grant_access))
        .route(
            "/services/{id}/grants/{merchant_id}",
            axum::routing::delete(super::services::revoke_access),
        )
        .route(
            "/merchants/{merchant_id}/transactions/authorize",
            post(super::transactions::authorize),
        )
        .route(
            "/merchants/{merchant_id}/transactions/sale",
            post(super::transactions::sale),
        )
        .route(
            "/merchants/{merchant_id}/transactions/capture",
            post(super::transactions::capture),
        )
        .route(
            "/merchants/{merchant_id}/transactions/void",
            post(super::transactions::void),
        )
        .route(
            "/merchants/{merchant_id}/transactions/refund",
            post(super::transactions::refund),
        )
        .route(
            "/merchants/{merchant_id}/transactions/{id}",
            get(super::transactions::get),
        )
        .route(
            "/merchants/{merchant_id}/transactions",
            get(super::transactions::list),
        )
        .route(
            "/merchants/{merchant_id}/payment-methods/begin-tokenization",
            post(super::payment_methods::begin_tokenization),
        )
        .route(
            "/merchants/{merchant_id}/payment-methods/finance-token",
            post(super::payment_methods::convert_finance_token),
        )
        .route(
            "/merchants/{merchant_id}/payment-methods/ach",
            post(super::payment_methods::store_ach_account),
        )
        .route(
            "/merchants/{merchant_id}/payment-methods",
            get(super::payment_methods::list_payment_methods),
        )
        .route(
            "/merchants/{merchant_id}/customers/{customer_id}/payment-methods/{id}/default",
            post(super::payment_methods::set_default_payment_method),
        )
        .route(
            "/merchants/{merchant_id}/customers/{customer_id}/payment-methods/{id}",
            axum::routing::delete(super::payment_methods::delete_payment_method),
        )
        .route(
            "/merchants/{merchant_id}/subscriptions",
            post(super::subscriptions::create_subscription),
        )
        .route(
            "/merchants/{merchant_id}/subscriptions/{id}",
            axum::routing::patch(super::subscriptions::update_subscription),
        )
        .route(
            "/merchants/{merchant_id}/subscriptions/{id}",
            get(super::subscriptions::get_subscription),
        )
        .route(
            "/merchants/{merchant_id}/customers/{customer_id}/subscriptions",
            get(super::subscriptions::list_customer_subscriptions),
        )
        .route(
            "/merchants/{merchant_id}/subscriptions/process-due-billing",
            post(super::subscriptions::process_due_billing),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
