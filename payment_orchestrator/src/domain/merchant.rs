//! Merchant entity (spec §3). Created by operator tooling, mutated only
//! through explicit update, soft-deactivated but never hard-deleted —
//! the `active` flag is the only state-removal mechanism, mirroring the
//! teacher's `Wallet` balance row which is likewise never deleted, only
//! mutated in place.

use chrono::{DateTime, Utc};
use common::MerchantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "environment", rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

/// The gateway-identity quadruple every server-to-server request must
/// carry (spec §4.4, §6): customer/merchant/dba/terminal numbers
/// assigned out-of-band by the gateway operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIdentity {
    pub customer_number: String,
    pub merchant_number: String,
    pub dba_number: String,
    pub terminal_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub slug: String,
    pub gateway_identity: GatewayIdentity,
    /// Path into the secret store (C2) where the per-merchant MAC
    /// secret used for callback verification (C5) is stored.
    pub mac_secret_path: String,
    pub environment: Environment,
    pub active: bool,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
