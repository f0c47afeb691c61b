//! Gateway adapter port (C4). Grounded in the teacher's `WalletGateway`
//! trait (one `async_trait`, one call-through method) but widened from
//! a single `process_movement` call into the sum-typed request the
//! spec's design notes call for (§9 "Dynamic dispatch... modelled as a
//! sum-typed request; the adapter pattern-matches on the operation
//! tag"), following the shape of the pack's `AgnosticPaymentGateway`
//! example.

use async_trait::async_trait;
use common::Money;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::payment_method::AchAccountType;
use crate::domain::transaction::CardIndicators;

/// The gateway-identity quadruple plus MAC secret every request must
/// carry (spec §4.4).
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub customer_number: String,
    pub merchant_number: String,
    pub dba_number: String,
    pub terminal_number: String,
    pub mac_secret: String,
}

/// Which rail a durable storage token was minted against. The gateway
/// uses a different type code for a card-storage token charged as a
/// sale (`CCE1`) than for an ACH-storage token charged as a debit
/// (`CKC1`), so the adapter needs this alongside the opaque token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredMethodKind {
    Card,
    Ach,
}

#[derive(Debug, Clone)]
pub enum TokenOrAccount {
    FinanceToken(String),
    StorageToken {
        token: String,
        kind: StoredMethodKind,
    },
    AchAccount {
        routing_nbr: String,
        account_nbr: String,
        account_type: AchAccountType,
    },
}

/// Sum type over every server-to-server (and tokenization) operation
/// the gateway exposes. The adapter pattern-matches on this to pick the
/// `TRAN_TYPE`/type code and assemble the payload (spec §6).
#[derive(Debug, Clone)]
pub enum GatewayRequest {
    Authorize {
        tran_nbr: String,
        amount: Money,
        source: TokenOrAccount,
    },
    Capture {
        tran_nbr: String,
        amount: Money,
        orig_auth_guid: String,
    },
    Sale {
        tran_nbr: String,
        amount: Money,
        source: TokenOrAccount,
    },
    Void {
        tran_nbr: String,
        orig_auth_guid: String,
    },
    Refund {
        tran_nbr: String,
        amount: Money,
        orig_auth_guid: String,
    },
    PreNote {
        tran_nbr: String,
        routing_nbr: String,
        account_nbr: String,
        account_type: AchAccountType,
    },
    StorageToken {
        tran_nbr: String,
        source: TokenOrAccount,
    },
    Tokenization {
        tran_nbr: String,
        amount: Money,
        group_id: String,
        return_url: String,
        cancel_url: String,
    },
}

impl GatewayRequest {
    pub fn tran_nbr(&self) -> &str {
        match self {
            GatewayRequest::Authorize { tran_nbr, .. }
            | GatewayRequest::Capture { tran_nbr, .. }
            | GatewayRequest::Sale { tran_nbr, .. }
            | GatewayRequest::Void { tran_nbr, .. }
            | GatewayRequest::Refund { tran_nbr, .. }
            | GatewayRequest::PreNote { tran_nbr, .. }
            | GatewayRequest::StorageToken { tran_nbr, .. }
            | GatewayRequest::Tokenization { tran_nbr, .. } => tran_nbr,
        }
    }

    /// Whether this request carries a business decision that should
    /// never be retried by the circuit-breaker/retry layer once the
    /// gateway has responded in-band (decline codes are handled
    /// upstream of retry, this only covers requests that must never be
    /// attempted twice even on transport failure — none today, kept for
    /// symmetry with the retry policy's request-shape dispatch).
    pub fn is_idempotent_retry_safe(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub gateway_token: Option<String>,
    pub response_code: String,
    pub response_text: String,
    pub authorization_code: Option<String>,
    pub network_transaction_id: Option<String>,
    pub card_indicators: CardIndicators,
    pub raw_payload: HashMap<String, String>,
}

impl GatewayResponse {
    pub fn is_approved(&self) -> bool {
        self.response_code == "00"
    }
}

#[derive(Debug, Clone)]
pub struct TokenizationResponse {
    pub auth_code: String,
    pub expires_in_secs: u32,
}

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway circuit open")]
    CircuitOpen,
    #[error("gateway invalid request: {0}")]
    InvalidRequest(String),
    #[error("gateway declined: {code} {text}")]
    Declined { code: String, text: String },
}

impl GatewayError {
    /// Per spec §4.4 retry policy: transient transport failures and
    /// transport-classified response codes retry; declines and
    /// invalid-request codes never do.
    pub fn is_retriable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    async fn execute(
        &self,
        credentials: &GatewayCredentials,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError>;

    async fn tokenize(
        &self,
        credentials: &GatewayCredentials,
        request: GatewayRequest,
    ) -> Result<TokenizationResponse, GatewayError>;
}
