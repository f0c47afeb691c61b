//! Caller identity (spec §3). A `Service` is a trusted caller (POS app,
//! storefront, billing scheduler); only its public key lives here, the
//! matching private key never leaves the caller. `ServiceMerchantGrant`
//! is the authorization join consulted by the trust layer (C5) on every
//! inbound RPC.

use chrono::{DateTime, Utc};
use common::{MerchantId, ServiceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "environment", rename_all = "lowercase")]
pub enum ServiceEnvironment {
    Sandbox,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub external_id: String,
    pub public_key_pem: String,
    pub key_fingerprint: String,
    pub environment: ServiceEnvironment,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scope", rename_all = "snake_case")]
pub enum Scope {
    PaymentCreate,
    PaymentRead,
    PaymentUpdate,
    PaymentRefund,
    SubscriptionManage,
    PaymentMethodManage,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::PaymentCreate => "payment:create",
            Scope::PaymentRead => "payment:read",
            Scope::PaymentUpdate => "payment:update",
            Scope::PaymentRefund => "payment:refund",
            Scope::SubscriptionManage => "subscription:manage",
            Scope::PaymentMethodManage => "payment_method:manage",
        }
    }
}

/// Authorization join between a service and a merchant. Composite key
/// `(service_id, merchant_id)` is unique; absence means no access at
/// all, not an empty-scope grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMerchantGrant {
    pub service_id: ServiceId,
    pub merchant_id: MerchantId,
    pub scopes: BTreeSet<Scope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceMerchantGrant {
    pub fn permits(&self, required: &[Scope]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }
}
