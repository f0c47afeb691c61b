//! `FromRow` persistence models, one per table, plus conversions to/from
//! the domain entities in `crate::domain`. Kept distinct from the
//! domain types the way the teacher's `TransactionModel` is kept
//! distinct from `domain::entities::Transaction` — the model owns the
//! column layout (flattened money, flattened card/ACH variants), the
//! domain type owns the business shape.

use chrono::{DateTime, NaiveDate, Utc};
use common::{
    CustomerId, MerchantId, Money, PaymentMethodId, ServiceId, SubscriptionId, TransactionId,
};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::audit::AuditLog;
use crate::domain::merchant::{Environment, GatewayIdentity, Merchant};
use crate::domain::payment_method::{
    AchAccountType, AchDetails, CardDetails, PaymentMethod, PaymentMethodType, VerificationStatus,
};
use crate::domain::rate_limit::RateLimitBucket;
use crate::domain::service::{Scope, Service, ServiceEnvironment, ServiceMerchantGrant};
use crate::domain::subscription::{Interval, IntervalUnit, Subscription, SubscriptionStatus};
use crate::domain::transaction::{CardIndicators, Transaction, TransactionStatus, TransactionType};

#[derive(Debug, FromRow)]
pub struct MerchantModel {
    pub id: Uuid,
    pub slug: String,
    pub customer_number: String,
    pub merchant_number: String,
    pub dba_number: String,
    pub terminal_number: String,
    pub mac_secret_path: String,
    pub environment: Environment,
    pub active: bool,
    pub rate_limit_per_second: i32,
    pub rate_limit_burst: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MerchantModel> for Merchant {
    fn from(m: MerchantModel) -> Self {
        Merchant {
            id: MerchantId::from(m.id),
            slug: m.slug,
            gateway_identity: GatewayIdentity {
                customer_number: m.customer_number,
                merchant_number: m.merchant_number,
                dba_number: m.dba_number,
                terminal_number: m.terminal_number,
            },
            mac_secret_path: m.mac_secret_path,
            environment: m.environment,
            active: m.active,
            rate_limit_per_second: m.rate_limit_per_second as u32,
            rate_limit_burst: m.rate_limit_burst as u32,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ServiceModel {
    pub id: Uuid,
    pub external_id: String,
    pub public_key_pem: String,
    pub key_fingerprint: String,
    pub environment: ServiceEnvironment,
    pub rate_limit_per_second: i32,
    pub rate_limit_burst: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServiceModel> for Service {
    fn from(m: ServiceModel) -> Self {
        Service {
            id: ServiceId::from(m.id),
            external_id: m.external_id,
            public_key_pem: m.public_key_pem,
            key_fingerprint: m.key_fingerprint,
            environment: m.environment,
            rate_limit_per_second: m.rate_limit_per_second as u32,
            rate_limit_burst: m.rate_limit_burst as u32,
            active: m.active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ServiceMerchantGrantModel {
    pub service_id: Uuid,
    pub merchant_id: Uuid,
    pub scopes: Vec<Scope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServiceMerchantGrantModel> for ServiceMerchantGrant {
    fn from(m: ServiceMerchantGrantModel) -> Self {
        ServiceMerchantGrant {
            service_id: ServiceId::from(m.service_id),
            merchant_id: MerchantId::from(m.merchant_id),
            scopes: m.scopes.into_iter().collect::<BTreeSet<_>>(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PaymentMethodModel {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub customer_id: String,
    pub method_type: PaymentMethodType,
    pub storage_token: String,
    pub last_four: String,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i16>,
    pub card_exp_year: Option<i16>,
    pub ach_bank_name: Option<String>,
    pub ach_account_type: Option<AchAccountType>,
    pub is_default: bool,
    pub active: bool,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentMethodModel> for PaymentMethod {
    fn from(m: PaymentMethodModel) -> Self {
        let card = match m.method_type {
            PaymentMethodType::Card => Some(CardDetails {
                brand: m.card_brand.unwrap_or_default(),
                exp_month: m.card_exp_month.unwrap_or_default().max(0) as u8,
                exp_year: m.card_exp_year.unwrap_or_default().max(0) as u16,
            }),
            PaymentMethodType::Ach => None,
        };
        let ach = match m.method_type {
            PaymentMethodType::Ach => Some(AchDetails {
                bank_name: m.ach_bank_name,
                account_type: m.ach_account_type.unwrap_or(AchAccountType::Checking),
            }),
            PaymentMethodType::Card => None,
        };
        PaymentMethod {
            id: PaymentMethodId::from(m.id),
            merchant_id: MerchantId::from(m.merchant_id),
            customer_id: CustomerId::from(m.customer_id),
            method_type: m.method_type,
            storage_token: m.storage_token,
            last_four: m.last_four,
            card,
            ach,
            is_default: m.is_default,
            active: m.active,
            verification_status: m.verification_status,
            verified_at: m.verified_at,
            last_used_at: m.last_used_at,
            deleted_at: m.deleted_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TransactionModel {
    pub id: Uuid,
    pub parent_transaction_id: Option<Uuid>,
    pub merchant_id: Uuid,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_tran_nbr: Option<String>,
    pub gateway_token: Option<String>,
    pub gateway_response_code: Option<String>,
    pub gateway_response_text: Option<String>,
    pub card_brand: Option<String>,
    pub avs_result: Option<String>,
    pub cvv_result: Option<String>,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionModel> for Transaction {
    fn from(m: TransactionModel) -> Self {
        Transaction {
            id: TransactionId::from(m.id),
            parent_id: m.parent_transaction_id.map(TransactionId::from),
            merchant_id: MerchantId::from(m.merchant_id),
            customer_id: m.customer_id.map(CustomerId::from),
            payment_method_id: m.payment_method_id.map(PaymentMethodId::from),
            subscription_id: m.subscription_id.map(SubscriptionId::from),
            transaction_type: m.transaction_type,
            amount: Money::new(m.amount_minor_units, &m.currency)
                .expect("persisted amount/currency must already be valid"),
            status: m.status,
            gateway_tran_nbr: m.gateway_tran_nbr,
            gateway_token: m.gateway_token,
            gateway_response_code: m.gateway_response_code,
            gateway_response_text: m.gateway_response_text,
            card_indicators: CardIndicators {
                card_brand: m.card_brand,
                avs_result: m.avs_result,
                cvv_result: m.cvv_result,
            },
            idempotency_key: m.idempotency_key,
            metadata: m.metadata,
            processed_at: m.processed_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SubscriptionModel {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub customer_id: String,
    pub payment_method_id: Uuid,
    pub amount_minor_units: i64,
    pub currency: String,
    pub interval_value: i32,
    pub interval_unit: IntervalUnit,
    pub status: SubscriptionStatus,
    pub next_billing_date: NaiveDate,
    pub failure_retry_count: i32,
    pub max_retries: i32,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionModel> for Subscription {
    fn from(m: SubscriptionModel) -> Self {
        Subscription {
            id: SubscriptionId::from(m.id),
            merchant_id: MerchantId::from(m.merchant_id),
            customer_id: CustomerId::from(m.customer_id),
            payment_method_id: PaymentMethodId::from(m.payment_method_id),
            amount: Money::new(m.amount_minor_units, &m.currency)
                .expect("persisted amount/currency must already be valid"),
            interval: Interval {
                value: m.interval_value.max(0) as u32,
                unit: m.interval_unit,
            },
            status: m.status,
            next_billing_date: m.next_billing_date,
            failure_retry_count: m.failure_retry_count.max(0) as u32,
            max_retries: m.max_retries.max(0) as u32,
            cancelled_at: m.cancelled_at,
            metadata: m.metadata,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RateLimitBucketModel {
    pub key: String,
    pub tokens: f64,
    pub capacity: f64,
    pub refill_rate_per_sec: f64,
    pub last_refill_at: DateTime<Utc>,
}

impl From<RateLimitBucketModel> for RateLimitBucket {
    fn from(m: RateLimitBucketModel) -> Self {
        RateLimitBucket {
            key: m.key,
            tokens: m.tokens,
            capacity: m.capacity,
            refill_rate_per_sec: m.refill_rate_per_sec,
            last_refill_at: m.last_refill_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AuditLogModel {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub metadata: Value,
}

impl From<AuditLogModel> for AuditLog {
    fn from(m: AuditLogModel) -> Self {
        AuditLog {
            id: common::AuditLogId::from(m.id),
            timestamp: m.timestamp,
            actor: m.actor,
            entity: m.entity,
            entity_id: m.entity_id,
            action: m.action,
            metadata: m.metadata,
        }
    }
}
