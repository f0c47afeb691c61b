//! Transaction tree entity (spec §3, §4.6) — the core of the
//! orchestrator. Every financial event is one row; parent/child
//! relationships model the auth→capture/void and sale→refund lineage
//! as a tree via a nullable `parent_id`, queried recursively rather
//! than held in memory (spec §9 "cyclic or graph-shaped state").

use chrono::{DateTime, Utc};
use common::{CustomerId, MerchantId, Money, PaymentMethodId, SubscriptionId, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Auth,
    Capture,
    Sale,
    Refund,
    Void,
    Storage,
    Debit,
}

impl TransactionType {
    /// §3 invariants (a)-(c): the type a parent must have for a given
    /// child type to be valid. `None` means the type has no parent
    /// constraint (root transactions: auth, sale, storage, debit).
    pub fn required_parent_type(&self) -> Option<TransactionType> {
        match self {
            TransactionType::Capture => Some(TransactionType::Auth),
            TransactionType::Void => Some(TransactionType::Auth),
            TransactionType::Refund => None, // checked against a set, see validate_refund_parent
            _ => None,
        }
    }

    pub fn valid_refund_parent(parent: TransactionType) -> bool {
        matches!(parent, TransactionType::Sale | TransactionType::Capture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Declined,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Card-network indicators returned alongside a gateway response code;
/// absent for ACH operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardIndicators {
    pub card_brand: Option<String>,
    pub avs_result: Option<String>,
    pub cvv_result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub parent_id: Option<TransactionId>,
    pub merchant_id: MerchantId,
    pub customer_id: Option<CustomerId>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub subscription_id: Option<SubscriptionId>,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub status: TransactionStatus,
    pub gateway_tran_nbr: Option<String>,
    pub gateway_token: Option<String>,
    pub gateway_response_code: Option<String>,
    pub gateway_response_text: Option<String>,
    pub card_indicators: CardIndicators,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// §7: a gateway decline is determined strictly by response code,
    /// never inferred from transport outcome.
    pub fn is_approved_response_code(code: &str) -> bool {
        code == "00"
    }
}
