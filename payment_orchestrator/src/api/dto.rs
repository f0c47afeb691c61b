//! Wire DTOs for the RPC surface (spec §6). Every identifier crosses
//! the wire as a plain string (UUID or merchant-assigned customer key)
//! and is parsed into its typed newtype at the edge; every amount
//! crosses as `{amount, currency}` minor units, matching
//! `common::Money`'s own representation one field at a time rather than
//! serializing the struct directly, so the wire shape stays stable even
//! if the internal type changes.

use chrono::NaiveDate;
use common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::error::OrchestratorError;
use crate::domain::merchant::{Environment, GatewayIdentity, Merchant};
use crate::domain::payment_method::{
    AchAccountType, AchDetails, CardDetails, PaymentMethod, PaymentMethodType, VerificationStatus,
};
use crate::domain::service::{Scope, Service, ServiceEnvironment, ServiceMerchantGrant};
use crate::domain::subscription::{Interval, IntervalUnit, Subscription, SubscriptionStatus};
use crate::domain::transaction::{CardIndicators, Transaction, TransactionStatus, TransactionType};
use crate::use_cases::transaction_engine::TransactionWithLineage;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MoneyDto {
    pub amount: i64,
    pub currency: String,
}

impl MoneyDto {
    pub fn into_money(self) -> Result<Money, OrchestratorError> {
        Money::new(self.amount, &self.currency)
            .map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoneyView {
    pub amount: i64,
    pub currency: String,
}

impl From<Money> for MoneyView {
    fn from(m: Money) -> Self {
        Self {
            amount: m.minor_units,
            currency: m.currency_str().to_string(),
        }
    }
}

// ---- transactions ----

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChargeSourceDto {
    /// One of `finance_token`, `storage_token`, `ach_account` must be set.
    pub finance_token: Option<String>,
    pub storage_token: Option<String>,
    pub storage_token_kind: Option<String>,
    pub ach_routing_nbr: Option<String>,
    pub ach_account_nbr: Option<String>,
    pub ach_account_type: Option<String>,
}

impl ChargeSourceDto {
    pub fn into_source(
        self,
    ) -> Result<crate::domain::gateway::TokenOrAccount, OrchestratorError> {
        use crate::domain::gateway::{StoredMethodKind, TokenOrAccount};

        if let Some(token) = self.finance_token {
            return Ok(TokenOrAccount::FinanceToken(token));
        }
        if let Some(token) = self.storage_token {
            let kind = match self.storage_token_kind.as_deref() {
                Some("card") | None => StoredMethodKind::Card,
                Some("ach") => StoredMethodKind::Ach,
                Some(other) => {
                    return Err(OrchestratorError::InvalidRequest(format!(
                        "unknown storage_token_kind {other}"
                    )))
                }
            };
            return Ok(TokenOrAccount::StorageToken { token, kind });
        }
        if let (Some(routing_nbr), Some(account_nbr)) =
            (self.ach_routing_nbr, self.ach_account_nbr)
        {
            let account_type = parse_ach_account_type(
                self.ach_account_type.as_deref().unwrap_or("checking"),
            )?;
            return Ok(TokenOrAccount::AchAccount {
                routing_nbr,
                account_nbr,
                account_type,
            });
        }
        Err(OrchestratorError::InvalidRequest(
            "charge source must set finance_token, storage_token, or ach account fields".into(),
        ))
    }
}

pub fn parse_ach_account_type(raw: &str) -> Result<AchAccountType, OrchestratorError> {
    match raw {
        "checking" => Ok(AchAccountType::Checking),
        "savings" => Ok(AchAccountType::Savings),
        other => Err(OrchestratorError::InvalidRequest(format!(
            "unknown ach account type {other}"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChargeRequestDto {
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount: MoneyDto,
    pub source: ChargeSourceDto,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CaptureRequestDto {
    pub parent_id: String,
    pub amount: Option<MoneyDto>,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VoidRequestDto {
    pub parent_id: String,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefundRequestDto {
    pub parent_id: String,
    pub amount: Option<MoneyDto>,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListTransactionsQuery {
    pub customer_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GetTransactionQuery {
    #[serde(default)]
    pub include_lineage: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardIndicatorsView {
    pub card_brand: Option<String>,
    pub avs_result: Option<String>,
    pub cvv_result: Option<String>,
}

impl From<CardIndicators> for CardIndicatorsView {
    fn from(c: CardIndicators) -> Self {
        Self {
            card_brand: c.card_brand,
            avs_result: c.avs_result,
            cvv_result: c.cvv_result,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: String,
    pub parent_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub subscription_id: Option<String>,
    pub transaction_type: String,
    pub amount: MoneyView,
    pub status: String,
    pub gateway_tran_nbr: Option<String>,
    pub gateway_response_code: Option<String>,
    pub gateway_response_text: Option<String>,
    pub card_indicators: CardIndicatorsView,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id.to_string(),
            parent_id: t.parent_id.map(|id| id.to_string()),
            customer_id: t.customer_id.map(|c| c.0),
            payment_method_id: t.payment_method_id.map(|id| id.to_string()),
            subscription_id: t.subscription_id.map(|id| id.to_string()),
            transaction_type: transaction_type_str(t.transaction_type).to_string(),
            amount: t.amount.into(),
            status: transaction_status_str(t.status).to_string(),
            gateway_tran_nbr: t.gateway_tran_nbr,
            gateway_response_code: t.gateway_response_code,
            gateway_response_text: t.gateway_response_text,
            card_indicators: t.card_indicators.into(),
            idempotency_key: t.idempotency_key,
            metadata: t.metadata,
            processed_at: t.processed_at,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionWithLineageView {
    pub transaction: TransactionView,
    pub lineage: Vec<TransactionView>,
}

impl From<TransactionWithLineage> for TransactionWithLineageView {
    fn from(t: TransactionWithLineage) -> Self {
        Self {
            transaction: t.transaction.into(),
            lineage: t.lineage.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn transaction_type_str(t: TransactionType) -> &'static str {
    match t {
        TransactionType::Auth => "auth",
        TransactionType::Capture => "capture",
        TransactionType::Sale => "sale",
        TransactionType::Refund => "refund",
        TransactionType::Void => "void",
        TransactionType::Storage => "storage",
        TransactionType::Debit => "debit",
    }
}

pub fn transaction_status_str(s: TransactionStatus) -> &'static str {
    match s {
        TransactionStatus::Pending => "pending",
        TransactionStatus::Approved => "approved",
        TransactionStatus::Declined => "declined",
        TransactionStatus::Failed => "failed",
    }
}

// ---- payment methods ----

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BeginTokenizationRequestDto {
    pub customer_id: Option<String>,
    pub amount: MoneyDto,
    pub return_url: String,
    pub cancel_url: String,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenizationSessionView {
    pub transaction_id: String,
    pub auth_code: String,
    pub expires_in_secs: u32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConvertFinanceTokenRequestDto {
    pub customer_id: String,
    pub finance_token: String,
    pub last_four: String,
    pub card_brand: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StoreAchAccountRequestDto {
    pub customer_id: String,
    pub routing_nbr: String,
    pub account_nbr: String,
    pub account_type: String,
    pub last_four: String,
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardDetailsView {
    pub brand: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

impl From<CardDetails> for CardDetailsView {
    fn from(c: CardDetails) -> Self {
        Self {
            brand: c.brand,
            exp_month: c.exp_month,
            exp_year: c.exp_year,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchDetailsView {
    pub bank_name: Option<String>,
    pub account_type: String,
}

impl From<AchDetails> for AchDetailsView {
    fn from(a: AchDetails) -> Self {
        Self {
            bank_name: a.bank_name,
            account_type: ach_account_type_str(a.account_type).to_string(),
        }
    }
}

pub fn ach_account_type_str(t: AchAccountType) -> &'static str {
    match t {
        AchAccountType::Checking => "checking",
        AchAccountType::Savings => "savings",
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentMethodView {
    pub id: String,
    pub customer_id: String,
    pub method_type: String,
    pub last_four: String,
    pub card: Option<CardDetailsView>,
    pub ach: Option<AchDetailsView>,
    pub is_default: bool,
    pub active: bool,
    pub verification_status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PaymentMethod> for PaymentMethodView {
    fn from(m: PaymentMethod) -> Self {
        Self {
            id: m.id.to_string(),
            customer_id: m.customer_id.0,
            method_type: match m.method_type {
                PaymentMethodType::Card => "card",
                PaymentMethodType::Ach => "ach",
            }
            .to_string(),
            last_four: m.last_four,
            card: m.card.map(Into::into),
            ach: m.ach.map(Into::into),
            is_default: m.is_default,
            active: m.active,
            verification_status: match m.verification_status {
                VerificationStatus::Pending => "pending",
                VerificationStatus::Verified => "verified",
                VerificationStatus::Failed => "failed",
            }
            .to_string(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListPaymentMethodsQuery {
    pub customer_id: String,
}

// ---- subscriptions ----

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IntervalDto {
    pub value: u32,
    pub unit: String,
}

impl IntervalDto {
    pub fn into_interval(self) -> Result<Interval, OrchestratorError> {
        let unit = match self.unit.as_str() {
            "day" => IntervalUnit::Day,
            "week" => IntervalUnit::Week,
            "month" => IntervalUnit::Month,
            "year" => IntervalUnit::Year,
            other => {
                return Err(OrchestratorError::InvalidRequest(format!(
                    "unknown interval unit {other}"
                )))
            }
        };
        Ok(Interval {
            value: self.value,
            unit,
        })
    }
}

fn interval_unit_str(u: IntervalUnit) -> &'static str {
    match u {
        IntervalUnit::Day => "day",
        IntervalUnit::Week => "week",
        IntervalUnit::Month => "month",
        IntervalUnit::Year => "year",
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequestDto {
    pub customer_id: String,
    pub payment_method_id: String,
    pub amount: MoneyDto,
    pub interval: IntervalDto,
    pub start_date: NaiveDate,
    pub max_retries: u32,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequestDto {
    pub amount: Option<MoneyDto>,
    pub payment_method_id: Option<String>,
    pub status: Option<String>,
}

pub fn parse_subscription_status(
    raw: &str,
) -> Result<SubscriptionStatus, OrchestratorError> {
    match raw {
        "active" => Ok(SubscriptionStatus::Active),
        "paused" => Ok(SubscriptionStatus::Paused),
        "past_due" => Ok(SubscriptionStatus::PastDue),
        "cancelled" => Ok(SubscriptionStatus::Cancelled),
        other => Err(OrchestratorError::InvalidRequest(format!(
            "unknown subscription status {other}"
        ))),
    }
}

fn subscription_status_str(s: SubscriptionStatus) -> &'static str {
    match s {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Paused => "paused",
        SubscriptionStatus::PastDue => "past_due",
        SubscriptionStatus::Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionView {
    pub id: String,
    pub customer_id: String,
    pub payment_method_id: String,
    pub amount: MoneyView,
    pub interval: IntervalDto,
    pub status: String,
    pub next_billing_date: NaiveDate,
    pub failure_retry_count: u32,
    pub max_retries: u32,
    pub metadata: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Subscription> for SubscriptionView {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id.to_string(),
            customer_id: s.customer_id.0,
            payment_method_id: s.payment_method_id.to_string(),
            amount: s.amount.into(),
            interval: IntervalDto {
                value: s.interval.value,
                unit: interval_unit_str(s.interval.unit).to_string(),
            },
            status: subscription_status_str(s.status).to_string(),
            next_billing_date: s.next_billing_date,
            failure_retry_count: s.failure_retry_count,
            max_retries: s.max_retries,
            metadata: s.metadata,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillingBatchSummaryView {
    pub billed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub past_due: u64,
}

impl From<crate::use_cases::subscription_engine::BillingBatchSummary> for BillingBatchSummaryView {
    fn from(s: crate::use_cases::subscription_engine::BillingBatchSummary) -> Self {
        Self {
            billed: s.billed,
            failed: s.failed,
            skipped: s.skipped,
            past_due: s.past_due,
        }
    }
}

// ---- merchants ----

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GatewayIdentityDto {
    pub customer_number: String,
    pub merchant_number: String,
    pub dba_number: String,
    pub terminal_number: String,
}

impl From<GatewayIdentityDto> for GatewayIdentity {
    fn from(d: GatewayIdentityDto) -> Self {
        GatewayIdentity {
            customer_number: d.customer_number,
            merchant_number: d.merchant_number,
            dba_number: d.dba_number,
            terminal_number: d.terminal_number,
        }
    }
}

fn gateway_identity_view(g: &GatewayIdentity) -> GatewayIdentityDto {
    GatewayIdentityDto {
        customer_number: g.customer_number.clone(),
        merchant_number: g.merchant_number.clone(),
        dba_number: g.dba_number.clone(),
        terminal_number: g.terminal_number.clone(),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterMerchantRequestDto {
    pub slug: String,
    pub gateway_identity: GatewayIdentityDto,
    pub mac_secret: String,
    pub environment: String,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

pub fn parse_environment(raw: &str) -> Result<Environment, OrchestratorError> {
    match raw {
        "sandbox" => Ok(Environment::Sandbox),
        "production" => Ok(Environment::Production),
        other => Err(OrchestratorError::InvalidRequest(format!(
            "unknown environment {other}"
        ))),
    }
}

fn environment_str(e: Environment) -> &'static str {
    match e {
        Environment::Sandbox => "sandbox",
        Environment::Production => "production",
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateMerchantRequestDto {
    pub gateway_identity: Option<GatewayIdentityDto>,
    pub active: Option<bool>,
    pub rate_limit_per_second: Option<u32>,
    pub rate_limit_burst: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RotateMerchantMacRequestDto {
    pub new_mac_secret: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MerchantView {
    pub id: String,
    pub slug: String,
    pub gateway_identity: GatewayIdentityDto,
    pub environment: String,
    pub active: bool,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Merchant> for MerchantView {
    fn from(m: Merchant) -> Self {
        Self {
            id: m.id.to_string(),
            slug: m.slug,
            gateway_identity: gateway_identity_view(&m.gateway_identity),
            environment: environment_str(m.environment).to_string(),
            active: m.active,
            rate_limit_per_second: m.rate_limit_per_second,
            rate_limit_burst: m.rate_limit_burst,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---- services ----

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateServiceRequestDto {
    pub external_id: String,
    pub public_key_pem: String,
    pub environment: String,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

pub fn parse_service_environment(raw: &str) -> Result<ServiceEnvironment, OrchestratorError> {
    match raw {
        "sandbox" => Ok(ServiceEnvironment::Sandbox),
        "production" => Ok(ServiceEnvironment::Production),
        other => Err(OrchestratorError::InvalidRequest(format!(
            "unknown environment {other}"
        ))),
    }
}

fn service_environment_str(e: ServiceEnvironment) -> &'static str {
    match e {
        ServiceEnvironment::Sandbox => "sandbox",
        ServiceEnvironment::Production => "production",
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateServiceRequestDto {
    pub active: Option<bool>,
    pub rate_limit_per_second: Option<u32>,
    pub rate_limit_burst: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RotateServiceKeyRequestDto {
    pub new_public_key_pem: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantAccessRequestDto {
    pub merchant_id: String,
    pub scopes: Vec<String>,
}

pub fn parse_scope(raw: &str) -> Result<Scope, OrchestratorError> {
    match raw {
        "payment:create" => Ok(Scope::PaymentCreate),
        "payment:read" => Ok(Scope::PaymentRead),
        "payment:update" => Ok(Scope::PaymentUpdate),
        "payment:refund" => Ok(Scope::PaymentRefund),
        "subscription:manage" => Ok(Scope::SubscriptionManage),
        "payment_method:manage" => Ok(Scope::PaymentMethodManage),
        other => Err(OrchestratorError::InvalidRequest(format!(
            "unknown scope {other}"
        ))),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceView {
    pub id: String,
    pub external_id: String,
    pub key_fingerprint: String,
    pub environment: String,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Service> for ServiceView {
    fn from(s: Service) -> Self {
        Self {
            id: s.id.to_string(),
            external_id: s.external_id,
            key_fingerprint: s.key_fingerprint,
            environment: service_environment_str(s.environment).to_string(),
            rate_limit_per_second: s.rate_limit_per_second,
            rate_limit_burst: s.rate_limit_burst,
            active: s.active,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceMerchantGrantView {
    pub service_id: String,
    pub merchant_id: String,
    pub scopes: Vec<String>,
}

impl From<ServiceMerchantGrant> for ServiceMerchantGrantView {
    fn from(g: ServiceMerchantGrant) -> Self {
        Self {
            service_id: g.service_id.to_string(),
            merchant_id: g.merchant_id.to_string(),
            scopes: g.scopes.iter().map(|s| s.as_str().to_string()).collect(),
        }
    }
}
