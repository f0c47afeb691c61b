//! Durable, tokenized payment instrument (spec §3, §4.7). A row is
//! chargeable only once `active && verification_status == Verified`;
//! ACH rows start `Pending` until the verification sweep (C7) promotes
//! them.

use chrono::{DateTime, Utc};
use common::{CustomerId, MerchantId, PaymentMethodId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method_type", rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    Ach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ach_account_type", rename_all = "snake_case")]
pub enum AchAccountType {
    Checking,
    Savings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchDetails {
    pub bank_name: Option<String>,
    pub account_type: AchAccountType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub method_type: PaymentMethodType,
    /// Opaque gateway-issued storage token. Never expires.
    pub storage_token: String,
    pub last_four: String,
    pub card: Option<CardDetails>,
    pub ach: Option<AchDetails>,
    pub is_default: bool,
    pub active: bool,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn is_chargeable(&self) -> bool {
        self.active
            && self.deleted_at.is_none()
            && matches!(self.verification_status, VerificationStatus::Verified)
    }

    pub fn is_listable(&self) -> bool {
        self.deleted_at.is_none()
    }
}
