//! C6: the transaction engine. Grounded in the teacher's
//! `ProcessTransactionUseCase` (idempotency check → create entity →
//! persist pending → call the external service → finalize exactly
//! once), generalized from a single `process_movement` call into the
//! full auth/capture/sale/void/refund state machine spec §4.6 and §3
//! describe, with the row-locked amount accounting spec §4.1/§4.6 add
//! on top of what the teacher's single-statement repository could do.

use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, MerchantId, Money, PaymentMethodId, SubscriptionId, TransactionId};
use serde_json::Value;

use crate::domain::audit::{Actor, AuditLog};
use crate::domain::error::OrchestratorError;
use crate::domain::gateway::{
    GatewayAdapter, GatewayCredentials, GatewayError, GatewayRequest, TokenOrAccount,
};
use crate::domain::repository::{AuditRepository, TransactionRepository};
use crate::domain::transaction::{CardIndicators, Transaction, TransactionStatus, TransactionType};
use crate::infrastructure::credential_cache::MerchantCredentialCache;
use crate::infrastructure::storage::{Storage, TimeoutClass};
use common::tran_nbr_from_uuid;

/// Shared shape for the two root operations (auth, sale) — both create
/// a parent-less pending row and hand the same source off to the
/// gateway, differing only in which `TRAN_TYPE` is used.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub merchant_id: MerchantId,
    pub customer_id: Option<CustomerId>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub amount: Money,
    pub source: TokenOrAccount,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}

/// Root request for a browser-originated charge (spec §4.4
/// "Tokenization request", §4.9 design note: the pending row is the
/// join point a later callback finalizes). Has no `source` — the
/// cardholder's browser supplies that directly to the gateway — so it
/// cannot reuse [`ChargeRequest`].
#[derive(Debug, Clone)]
pub struct BrowserPostRequest {
    pub merchant_id: MerchantId,
    pub customer_id: Option<CustomerId>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub amount: Money,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub merchant_id: MerchantId,
    pub parent_id: TransactionId,
    /// Defaults to the authorization's remaining (uncaptured) amount
    /// when omitted — an Open Question the spec leaves unresolved for
    /// capture, decided the same way it is resolved explicitly for
    /// refund (see DESIGN.md).
    pub amount: Option<Money>,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct VoidRequest {
    pub merchant_id: MerchantId,
    pub parent_id: TransactionId,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub merchant_id: MerchantId,
    pub parent_id: TransactionId,
    /// Omitted means "refund whatever remains" (spec §4.6).
    pub amount: Option<Money>,
    pub idempotency_key: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct TransactionWithLineage {
    pub transaction: Transaction,
    pub lineage: Vec<Transaction>,
}

pub struct TransactionEngine {
    storage: Storage,
    transactions: Arc<dyn TransactionRepository>,
    credentials: Arc<MerchantCredentialCache>,
    gateway: Arc<dyn GatewayAdapter>,
    audit: Arc<dyn AuditRepository>,
}

impl TransactionEngine {
    pub fn new(
        storage: Storage,
        transactions: Arc<dyn TransactionRepository>,
        credentials: Arc<MerchantCredentialCache>,
        gateway: Arc<dyn GatewayAdapter>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            storage,
            transactions,
            credentials,
            gateway,
            audit,
        }
    }

    pub async fn authorize(&self, req: ChargeRequest) -> Result<Transaction, OrchestratorError> {
        self.create_root(req, TransactionType::Auth).await
    }

    pub async fn sale(&self, req: ChargeRequest) -> Result<Transaction, OrchestratorError> {
        self.create_root(req, TransactionType::Sale).await
    }

    async fn create_root(
        &self,
        req: ChargeRequest,
        transaction_type: TransactionType,
    ) -> Result<Transaction, OrchestratorError> {
        if let Some(existing) = self.find_replay(req.merchant_id, &req.idempotency_key).await? {
            return Ok(existing);
        }

        let creds = self.credentials.get(req.merchant_id).await?;
        if !creds.merchant.active {
            return Err(OrchestratorError::FailedPrecondition(
                "merchant is not active".into(),
            ));
        }

        let pending_tx = new_pending(
            req.merchant_id,
            None,
            req.customer_id.clone(),
            req.payment_method_id,
            None,
            transaction_type,
            req.amount,
            req.idempotency_key.clone(),
            req.metadata.clone(),
        );
        let (pending, inserted) = self.insert_pending_tx(pending_tx).await?;
        if !inserted {
            return Ok(pending);
        }

        let credentials = super::gateway_credentials_from(&creds);
        let tran_nbr = tran_nbr_from_uuid(pending.id.into_uuid());
        let request = match transaction_type {
            TransactionType::Auth => GatewayRequest::Authorize {
                tran_nbr: tran_nbr.clone(),
                amount: pending.amount,
                source: req.source,
            },
            TransactionType::Sale => GatewayRequest::Sale {
                tran_nbr: tran_nbr.clone(),
                amount: pending.amount,
                source: req.source,
            },
            other => {
                return Err(OrchestratorError::Internal(format!(
                    "create_root called with unsupported transaction type {other:?}"
                )))
            }
        };

        self.finalize_with_gateway(&credentials, pending.id, request, tran_nbr)
            .await
    }

    /// Creates the pending row a browser-post flow needs before the
    /// cardholder is ever redirected (spec §4.9, §9): no gateway call
    /// happens here — the browser submission and subsequent callback
    /// (see [`Self::finalize_from_callback`]) finalize it — but the
    /// row must exist with its `gateway_tran_nbr` already stamped so
    /// `find_by_gateway_tran_nbr` can resolve the callback regardless
    /// of how quickly it arrives.
    pub async fn begin_browser_post(
        &self,
        req: BrowserPostRequest,
        transaction_type: TransactionType,
    ) -> Result<Transaction, OrchestratorError> {
        if let Some(existing) = self.find_replay(req.merchant_id, &req.idempotency_key).await? {
            return Ok(existing);
        }

        let creds = self.credentials.get(req.merchant_id).await?;
        if !creds.merchant.active {
            return Err(OrchestratorError::FailedPrecondition(
                "merchant is not active".into(),
            ));
        }

        let pending_tx = new_pending(
            req.merchant_id,
            None,
            req.customer_id,
            req.payment_method_id,
            None,
            transaction_type,
            req.amount,
            req.idempotency_key,
            req.metadata,
        );
        let (pending, _inserted) = self.insert_pending_tx(pending_tx).await?;
        Ok(pending)
    }

    pub async fn capture(&self, req: CaptureRequest) -> Result<Transaction, OrchestratorError> {
        if let Some(existing) = self.find_replay(req.merchant_id, &req.idempotency_key).await? {
            return Ok(existing);
        }

        let creds = self.credentials.get(req.merchant_id).await?;
        let merchant_id = req.merchant_id;
        let parent_id = req.parent_id;
        let requested_amount = req.amount;
        let idempotency_key = req.idempotency_key.clone();
        let metadata = req.metadata.clone();

        let (pending, inserted, parent) = self
            .storage
            .with_tx(TimeoutClass::Complex, move |conn| {
                let transactions = self.transactions.clone();
                async move {
                    let (parent, consumed) = transactions
                        .lock_parent_with_child_sum(conn, parent_id, TransactionType::Capture)
                        .await?
                        .ok_or_else(|| {
                            OrchestratorError::NotFound(format!("transaction {parent_id}"))
                        })?;

                    if parent.merchant_id != merchant_id {
                        return Err(OrchestratorError::NotFound(format!(
                            "transaction {parent_id}"
                        )));
                    }
                    if parent.transaction_type != TransactionType::Auth {
                        return Err(OrchestratorError::FailedPrecondition(
                            "capture parent must be an authorization".into(),
                        ));
                    }
                    if parent.status != TransactionStatus::Approved {
                        return Err(OrchestratorError::FailedPrecondition(
                            "capture parent must be approved".into(),
                        ));
                    }

                    let amount = match requested_amount {
                        Some(a) => a,
                        None => parent.amount.checked_sub(consumed).ok_or_else(|| {
                            OrchestratorError::FailedPrecondition(
                                "no remaining amount to capture".into(),
                            )
                        })?,
                    };
                    validate_child_amount(&parent, consumed, amount)?;

                    let child = new_pending(
                        merchant_id,
                        Some(parent_id),
                        parent.customer_id.clone(),
                        parent.payment_method_id,
                        parent.subscription_id,
                        TransactionType::Capture,
                        amount,
                        idempotency_key,
                        metadata,
                    );
                    let (row, inserted) = transactions.insert_pending(conn, child).await?;
                    Ok((row, inserted, parent))
                }
            })
            .await?;

        if !inserted {
            return Ok(pending);
        }

        let credentials = super::gateway_credentials_from(&creds);
        let tran_nbr = tran_nbr_from_uuid(pending.id.into_uuid());
        let orig_auth_guid = parent.gateway_token.clone().unwrap_or_default();
        let request = GatewayRequest::Capture {
            tran_nbr: tran_nbr.clone(),
            amount: pending.amount,
            orig_auth_guid,
        };

        self.finalize_with_gateway(&credentials, pending.id, request, tran_nbr)
            .await
    }

    pub async fn void(&self, req: VoidRequest) -> Result<Transaction, OrchestratorError> {
        if let Some(existing) = self.find_replay(req.merchant_id, &req.idempotency_key).await? {
            return Ok(existing);
        }

        let creds = self.credentials.get(req.merchant_id).await?;
        let merchant_id = req.merchant_id;
        let parent_id = req.parent_id;
        let idempotency_key = req.idempotency_key.clone();
        let metadata = req.metadata.clone();

        let (pending, inserted, parent) = self
            .storage
            .with_tx(TimeoutClass::Complex, move |conn| {
                let transactions = self.transactions.clone();
                async move {
                    let (parent, already_voided) = transactions
                        .lock_parent_with_child_sum(conn, parent_id, TransactionType::Void)
                        .await?
                        .ok_or_else(|| {
                            OrchestratorError::NotFound(format!("transaction {parent_id}"))
                        })?;

                    if parent.merchant_id != merchant_id {
                        return Err(OrchestratorError::NotFound(format!(
                            "transaction {parent_id}"
                        )));
                    }
                    if parent.transaction_type != TransactionType::Auth {
                        return Err(OrchestratorError::FailedPrecondition(
                            "void parent must be an authorization".into(),
                        ));
                    }
                    if parent.status != TransactionStatus::Approved {
                        return Err(OrchestratorError::FailedPrecondition(
                            "void parent must be approved".into(),
                        ));
                    }
                    if already_voided.minor_units > 0 {
                        return Err(OrchestratorError::FailedPrecondition(
                            "authorization already voided".into(),
                        ));
                    }

                    let child = new_pending(
                        merchant_id,
                        Some(parent_id),
                        parent.customer_id.clone(),
                        parent.payment_method_id,
                        parent.subscription_id,
                        TransactionType::Void,
                        parent.amount,
                        idempotency_key,
                        metadata,
                    );
                    let (row, inserted) = transactions.insert_pending(conn, child).await?;
                    Ok((row, inserted, parent))
                }
            })
            .await?;

        if !inserted {
            return Ok(pending);
        }

        let credentials = super::gateway_credentials_from(&creds);
        let tran_nbr = tran_nbr_from_uuid(pending.id.into_uuid());
        let orig_auth_guid = parent.gateway_token.clone().unwrap_or_default();
        let request = GatewayRequest::Void {
            tran_nbr: tran_nbr.clone(),
            orig_auth_guid,
        };

        self.finalize_with_gateway(&credentials, pending.id, request, tran_nbr)
            .await
    }

    pub async fn refund(&self, req: RefundRequest) -> Result<Transaction, OrchestratorError> {
        if let Some(existing) = self.find_replay(req.merchant_id, &req.idempotency_key).await? {
            return Ok(existing);
        }

        let creds = self.credentials.get(req.merchant_id).await?;
        let merchant_id = req.merchant_id;
        let parent_id = req.parent_id;
        let requested_amount = req.amount;
        let idempotency_key = req.idempotency_key.clone();
        let metadata = req.metadata.clone();

        let (pending, inserted, parent) = self
            .storage
            .with_tx(TimeoutClass::Complex, move |conn| {
                let transactions = self.transactions.clone();
                async move {
                    let (parent, consumed) = transactions
                        .lock_parent_with_child_sum(conn, parent_id, TransactionType::Refund)
                        .await?
                        .ok_or_else(|| {
                            OrchestratorError::NotFound(format!("transaction {parent_id}"))
                        })?;

                    if parent.merchant_id != merchant_id {
                        return Err(OrchestratorError::NotFound(format!(
                            "transaction {parent_id}"
                        )));
                    }
                    if !TransactionType::valid_refund_parent(parent.transaction_type) {
                        return Err(OrchestratorError::FailedPrecondition(
                            "refund parent must be a sale or a capture".into(),
                        ));
                    }
                    if parent.status != TransactionStatus::Approved {
                        return Err(OrchestratorError::FailedPrecondition(
                            "refund parent must be approved".into(),
                        ));
                    }

                    let amount = match requested_amount {
                        Some(a) => a,
                        None => parent.amount.checked_sub(consumed).ok_or_else(|| {
                            OrchestratorError::FailedPrecondition(
                                "no remaining amount to refund".into(),
                            )
                        })?,
                    };
                    validate_child_amount(&parent, consumed, amount)?;

                    let child = new_pending(
                        merchant_id,
                        Some(parent_id),
                        parent.customer_id.clone(),
                        parent.payment_method_id,
                        parent.subscription_id,
                        TransactionType::Refund,
                        amount,
                        idempotency_key,
                        metadata,
                    );
                    let (row, inserted) = transactions.insert_pending(conn, child).await?;
                    Ok((row, inserted, parent))
                }
            })
            .await?;

        if !inserted {
            return Ok(pending);
        }

        let credentials = super::gateway_credentials_from(&creds);
        let tran_nbr = tran_nbr_from_uuid(pending.id.into_uuid());
        let orig_auth_guid = parent.gateway_token.clone().unwrap_or_default();
        let request = GatewayRequest::Refund {
            tran_nbr: tran_nbr.clone(),
            amount: pending.amount,
            orig_auth_guid,
        };

        self.finalize_with_gateway(&credentials, pending.id, request, tran_nbr)
            .await
    }

    /// Finalizes a transaction from a gateway callback instead of a
    /// synchronous response (spec §4.9). Resolves the pending row by
    /// its `gateway_tran_nbr`, reuses the same `status = 'pending'`
    /// guard [`finalize_with_gateway`] relies on so a duplicate or
    /// replayed browser-post can never double-finalize, and returns
    /// the merchant id so the caller (the callback HTTP handler) can
    /// look up the MAC secret to verify before trusting this call in
    /// the first place.
    pub async fn finalize_from_callback(
        &self,
        tran_nbr: &str,
        status: TransactionStatus,
        gateway_token: Option<String>,
        response_code: Option<String>,
        response_text: Option<String>,
        card_indicators: CardIndicators,
    ) -> Result<Transaction, OrchestratorError> {
        let transaction = self
            .transactions
            .find_by_gateway_tran_nbr(tran_nbr)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("transaction for tran_nbr {tran_nbr}")))?;
        let transaction_id = transaction.id;

        if transaction.status != TransactionStatus::Pending {
            return Ok(transaction);
        }

        let now = Utc::now();
        let tn = tran_nbr.to_string();
        self.storage
            .with_tx(TimeoutClass::Simple, move |conn| {
                let transactions = self.transactions.clone();
                async move {
                    transactions
                        .finalize(
                            conn,
                            transaction_id,
                            status,
                            Some(tn),
                            gateway_token,
                            response_code,
                            response_text,
                            card_indicators,
                            now,
                        )
                        .await
                }
            })
            .await?;

        self.record_audit(
            Actor::System,
            "transaction",
            transaction_id.to_string(),
            if status == TransactionStatus::Approved {
                "approved"
            } else {
                "declined"
            },
            serde_json::json!({ "source": "callback" }),
        )
        .await;

        self.transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| OrchestratorError::Internal("transaction vanished after finalize".into()))
    }

    pub async fn get(
        &self,
        merchant_id: MerchantId,
        id: TransactionId,
        include_lineage: bool,
    ) -> Result<TransactionWithLineage, OrchestratorError> {
        let transaction = self
            .transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("transaction {id}")))?;
        if transaction.merchant_id != merchant_id {
            return Err(OrchestratorError::NotFound(format!("transaction {id}")));
        }
        let lineage = if include_lineage {
            self.transactions.get_lineage(id).await?
        } else {
            Vec::new()
        };
        Ok(TransactionWithLineage {
            transaction,
            lineage,
        })
    }

    pub async fn get_by_idempotency_key(
        &self,
        merchant_id: MerchantId,
        key: &str,
    ) -> Result<Option<Transaction>, OrchestratorError> {
        self.transactions.find_by_idempotency_key(merchant_id, key).await
    }

    /// Resolves the pending row a browser-post callback names, so the
    /// caller (the callback HTTP handler) can look up the owning
    /// merchant's MAC secret before deciding whether the callback's MAC
    /// is trustworthy enough to act on.
    pub async fn find_pending_by_tran_nbr(
        &self,
        tran_nbr: &str,
    ) -> Result<Transaction, OrchestratorError> {
        self.transactions
            .find_by_gateway_tran_nbr(tran_nbr)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("transaction for tran_nbr {tran_nbr}")))
    }

    pub async fn list(
        &self,
        merchant_id: MerchantId,
        customer_id: Option<&CustomerId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, OrchestratorError> {
        self.transactions.list(merchant_id, customer_id, limit, offset).await
    }

    async fn find_replay(
        &self,
        merchant_id: MerchantId,
        idempotency_key: &Option<String>,
    ) -> Result<Option<Transaction>, OrchestratorError> {
        match idempotency_key {
            Some(key) => self.transactions.find_by_idempotency_key(merchant_id, key).await,
            None => Ok(None),
        }
    }

    async fn insert_pending_tx(
        &self,
        transaction: Transaction,
    ) -> Result<(Transaction, bool), OrchestratorError> {
        self.storage
            .with_tx(TimeoutClass::Simple, move |conn| {
                let transactions = self.transactions.clone();
                async move { transactions.insert_pending(conn, transaction).await }
            })
            .await
    }

    /// Calls the gateway and finalizes the pending row exactly once,
    /// regardless of whether the gateway approves, declines, or fails
    /// to respond at all (spec §4.6 "the row ... is updated exactly
    /// once"). A transport failure (after the adapter's own retry and
    /// circuit-breaker policy is exhausted) finalizes the row as
    /// `failed` and is surfaced as `Unavailable`; an in-band decline
    /// finalizes the row as `declined` and is still returned as `Ok`
    /// so the caller gets the full persisted row (the API layer is
    /// what turns a declined row into a non-2xx response, spec §7).
    async fn finalize_with_gateway(
        &self,
        credentials: &GatewayCredentials,
        transaction_id: TransactionId,
        request: GatewayRequest,
        tran_nbr: String,
    ) -> Result<Transaction, OrchestratorError> {
        match self.gateway.execute(credentials, request).await {
            Ok(response) => {
                let status = if response.is_approved() {
                    TransactionStatus::Approved
                } else {
                    TransactionStatus::Declined
                };
                let now = Utc::now();
                let gw_token = response.gateway_token.clone();
                let resp_code = response.response_code.clone();
                let resp_text = response.response_text.clone();
                let indicators = response.card_indicators.clone();
                let tn = tran_nbr.clone();

                self.storage
                    .with_tx(TimeoutClass::Simple, move |conn| {
                        let transactions = self.transactions.clone();
                        async move {
                            transactions
                                .finalize(
                                    conn,
                                    transaction_id,
                                    status,
                                    Some(tn),
                                    gw_token,
                                    Some(resp_code),
                                    Some(resp_text),
                                    indicators,
                                    now,
                                )
                                .await
                        }
                    })
                    .await?;

                self.record_audit(
                    Actor::System,
                    "transaction",
                    transaction_id.to_string(),
                    if status == TransactionStatus::Approved {
                        "approved"
                    } else {
                        "declined"
                    },
                    serde_json::json!({ "response_code": response.response_code }),
                )
                .await;

                self.transactions.find_by_id(transaction_id).await?.ok_or_else(|| {
                    OrchestratorError::Internal("transaction vanished after finalize".into())
                })
            }
            Err(err) => {
                let now = Utc::now();
                let tn = tran_nbr.clone();

                let _ = self
                    .storage
                    .with_tx::<_, _, _, OrchestratorError>(TimeoutClass::Simple, move |conn| {
                        let transactions = self.transactions.clone();
                        async move {
                            transactions
                                .finalize(
                                    conn,
                                    transaction_id,
                                    TransactionStatus::Failed,
                                    Some(tn),
                                    None,
                                    None,
                                    None,
                                    CardIndicators::default(),
                                    now,
                                )
                                .await
                        }
                    })
                    .await;

                self.record_audit(
                    Actor::System,
                    "transaction",
                    transaction_id.to_string(),
                    "failed",
                    serde_json::json!({ "error": err.to_string() }),
                )
                .await;

                Err(match err {
                    GatewayError::CircuitOpen => {
                        OrchestratorError::Unavailable("gateway circuit open".into())
                    }
                    GatewayError::Transport(e) => {
                        OrchestratorError::Unavailable(format!("gateway transport failure: {e}"))
                    }
                    GatewayError::InvalidRequest(e) => OrchestratorError::InvalidRequest(e),
                    GatewayError::Declined { code, text } => {
                        OrchestratorError::Declined { code, text }
                    }
                })
            }
        }
    }

    async fn record_audit(&self, actor: Actor, entity: &str, entity_id: String, action: &str, metadata: Value) {
        let log = AuditLog {
            id: common::AuditLogId::new(),
            timestamp: Utc::now(),
            actor: actor.as_storage_string(),
            entity: entity.to_string(),
            entity_id,
            action: action.to_string(),
            metadata,
        };
        if let Err(e) = self.audit.record(log).await {
            tracing::warn!(error = %e, "failed to record audit log");
        }
    }
}

/// `gateway_tran_nbr` is stamped on the row at creation, not just at
/// finalize: `find_by_gateway_tran_nbr` needs to resolve a still-`pending`
/// row when the callback receiver's browser-post arrives before this
/// row has a chance to finalize (spec §4.9, §9 "the transaction row ...
/// is the join point between the RPC-initiated flow and the
/// browser-initiated callback").
#[allow(clippy::too_many_arguments)]
fn new_pending(
    merchant_id: MerchantId,
    parent_id: Option<TransactionId>,
    customer_id: Option<CustomerId>,
    payment_method_id: Option<PaymentMethodId>,
    subscription_id: Option<SubscriptionId>,
    transaction_type: TransactionType,
    amount: Money,
    idempotency_key: Option<String>,
    metadata: Value,
) -> Transaction {
    let now = Utc::now();
    let id = TransactionId::new();
    let tran_nbr = tran_nbr_from_uuid(id.into_uuid());
    Transaction {
        id,
        parent_id,
        merchant_id,
        customer_id,
        payment_method_id,
        subscription_id,
        transaction_type,
        amount,
        status: TransactionStatus::Pending,
        gateway_tran_nbr: Some(tran_nbr),
        gateway_token: None,
        gateway_response_code: None,
        gateway_response_text: None,
        card_indicators: CardIndicators::default(),
        idempotency_key,
        metadata,
        processed_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn validate_child_amount(
    parent: &Transaction,
    consumed: Money,
    amount: Money,
) -> Result<(), OrchestratorError> {
    if amount.currency_str() != parent.amount.currency_str() {
        return Err(OrchestratorError::InvalidRequest(
            "amount currency must match the parent transaction's currency".into(),
        ));
    }
    let new_total = consumed
        .checked_add(amount)
        .ok_or_else(|| OrchestratorError::Internal("amount overflow".into()))?;
    if new_total.minor_units > parent.amount.minor_units {
        return Err(OrchestratorError::FailedPrecondition(
            "amount exceeds the parent transaction's remaining balance".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merchant::{Environment, GatewayIdentity, Merchant};
    use crate::domain::secret_store::{RotationResult, SecretStoreError, VersionedSecret};
    use crate::domain::secret_store::SecretStore;
    use async_trait::async_trait;
    use common::MerchantId;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub TransactionRepo {}

        #[async_trait]
        impl TransactionRepository for TransactionRepo {
            async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, OrchestratorError>;
            async fn find_by_idempotency_key(&self, merchant_id: MerchantId, key: &str) -> Result<Option<Transaction>, OrchestratorError>;
            async fn find_by_gateway_tran_nbr(&self, tran_nbr: &str) -> Result<Option<Transaction>, OrchestratorError>;
            async fn list(&self, merchant_id: MerchantId, customer_id: Option<&CustomerId>, limit: i64, offset: i64) -> Result<Vec<Transaction>, OrchestratorError>;
            async fn get_lineage(&self, id: TransactionId) -> Result<Vec<Transaction>, OrchestratorError>;
            async fn insert_pending(&self, conn: &mut sqlx::PgConnection, transaction: Transaction) -> Result<(Transaction, bool), OrchestratorError>;
            async fn lock_parent_with_child_sum(&self, conn: &mut sqlx::PgConnection, parent_id: TransactionId, child_type: TransactionType) -> Result<Option<(Transaction, Money)>, OrchestratorError>;
            #[allow(clippy::too_many_arguments)]
            async fn finalize(
                &self,
                conn: &mut sqlx::PgConnection,
                id: TransactionId,
                status: TransactionStatus,
                gateway_tran_nbr: Option<String>,
                gateway_token: Option<String>,
                gateway_response_code: Option<String>,
                gateway_response_text: Option<String>,
                card_indicators: CardIndicators,
                processed_at: chrono::DateTime<Utc>,
            ) -> Result<bool, OrchestratorError>;
        }
    }

    mock! {
        pub Gateway {}

        #[async_trait]
        impl GatewayAdapter for Gateway {
            async fn execute(&self, credentials: &GatewayCredentials, request: GatewayRequest) -> Result<crate::domain::gateway::GatewayResponse, GatewayError>;
            async fn tokenize(&self, credentials: &GatewayCredentials, request: GatewayRequest) -> Result<crate::domain::gateway::TokenizationResponse, GatewayError>;
        }
    }

    mock! {
        pub Audit {}

        #[async_trait]
        impl AuditRepository for Audit {
            async fn record(&self, log: AuditLog) -> Result<(), OrchestratorError>;
            async fn cleanup_older_than(&self, cutoff: chrono::DateTime<Utc>, batch_size: i64) -> Result<u64, OrchestratorError>;
        }
    }

    mock! {
        pub Merchants {}

        #[async_trait]
        impl crate::domain::repository::MerchantRepository for Merchants {
            async fn create(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
            async fn update(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
            async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, OrchestratorError>;
            async fn find_by_slug(&self, slug: &str) -> Result<Option<Merchant>, OrchestratorError>;
            async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Merchant>, OrchestratorError>;
        }
    }

    struct StaticSecretStore;

    #[async_trait]
    impl SecretStore for StaticSecretStore {
        async fn get_latest(&self, _path: &str) -> Result<VersionedSecret, SecretStoreError> {
            Ok(VersionedSecret { value: "mac".into(), version: 1 })
        }
        async fn get_version(&self, _path: &str, _version: u32) -> Result<String, SecretStoreError> {
            unimplemented!()
        }
        async fn put(&self, _path: &str, _value: String) -> Result<u32, SecretStoreError> {
            unimplemented!()
        }
        async fn rotate(&self, _path: &str, _new_value: String) -> Result<RotationResult, SecretStoreError> {
            unimplemented!()
        }
        async fn delete(&self, _path: &str) -> Result<(), SecretStoreError> {
            unimplemented!()
        }
    }

    fn sample_merchant(id: MerchantId) -> Merchant {
        Merchant {
            id,
            slug: "acme".into(),
            gateway_identity: GatewayIdentity {
                customer_number: "1".into(),
                merchant_number: "2".into(),
                dba_number: "3".into(),
                terminal_number: "4".into(),
            },
            mac_secret_path: "merchants/acme/mac".into(),
            environment: Environment::Sandbox,
            active: true,
            rate_limit_per_second: 50,
            rate_limit_burst: 100,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn authorize_returns_existing_row_on_idempotency_replay() {
        let mut repo = MockTransactionRepo::new();
        let gateway = MockGateway::new();
        let audit = MockAudit::new();
        let mut merchants = MockMerchants::new();

        let merchant_id = MerchantId::new();
        let existing = new_pending(
            merchant_id,
            None,
            None,
            None,
            None,
            TransactionType::Auth,
            Money::new(1000, "USD").unwrap(),
            Some("idem-1".into()),
            serde_json::json!({}),
        );
        let expected = existing.clone();

        repo.expect_find_by_idempotency_key()
            .with(eq(merchant_id), eq("idem-1"))
            .times(1)
            .returning(move |_, _| Ok(Some(existing.clone())));

        merchants.expect_find_by_id().returning(move |id| Ok(Some(sample_merchant(id))));

        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(merchants),
            Arc::new(StaticSecretStore),
            std::time::Duration::from_secs(60),
            10,
        ));

        let engine = TransactionEngine::new(
            Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
            Arc::new(repo),
            credentials,
            Arc::new(gateway),
            Arc::new(audit),
        );

        let result = engine
            .authorize(ChargeRequest {
                merchant_id,
                customer_id: None,
                payment_method_id: None,
                amount: Money::new(1000, "USD").unwrap(),
                source: TokenOrAccount::FinanceToken("tok_abc".into()),
                idempotency_key: Some("idem-1".into()),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert_eq!(result.id, expected.id);
    }

    #[test]
    fn validate_child_amount_rejects_over_remaining() {
        let parent = new_pending(
            MerchantId::new(),
            None,
            None,
            None,
            None,
            TransactionType::Auth,
            Money::new(1000, "USD").unwrap(),
            None,
            serde_json::json!({}),
        );
        let consumed = Money::new(400, "USD").unwrap();
        let amount = Money::new(700, "USD").unwrap();
        assert!(validate_child_amount(&parent, consumed, amount).is_err());
    }

    #[test]
    fn validate_child_amount_accepts_exact_remaining() {
        let parent = new_pending(
            MerchantId::new(),
            None,
            None,
            None,
            None,
            TransactionType::Auth,
            Money::new(1000, "USD").unwrap(),
            None,
            serde_json::json!({}),
        );
        let consumed = Money::new(400, "USD").unwrap();
        let amount = Money::new(600, "USD").unwrap();
        assert!(validate_child_amount(&parent, consumed, amount).is_ok());
    }

    #[test]
    fn validate_child_amount_rejects_currency_mismatch() {
        let parent = new_pending(
            MerchantId::new(),
            None,
            None,
            None,
            None,
            TransactionType::Sale,
            Money::new(1000, "USD").unwrap(),
            None,
            serde_json::json!({}),
        );
        let consumed = Money::new(0, "USD").unwrap();
        let amount = Money::new(100, "EUR").unwrap();
        assert!(validate_child_amount(&parent, consumed, amount).is_err());
    }

    fn engine_with(repo: MockTransactionRepo) -> TransactionEngine {
        let mut merchants = MockMerchants::new();
        merchants.expect_find_by_id().returning(move |id| Ok(Some(sample_merchant(id))));
        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(merchants),
            Arc::new(StaticSecretStore),
            std::time::Duration::from_secs(60),
            10,
        ));
        TransactionEngine::new(
            Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
            Arc::new(repo),
            credentials,
            Arc::new(MockGateway::new()),
            Arc::new(MockAudit::new()),
        )
    }

    #[tokio::test]
    async fn finalize_from_callback_errors_on_unknown_tran_nbr() {
        let mut repo = MockTransactionRepo::new();
        repo.expect_find_by_gateway_tran_nbr()
            .with(eq("0000000000"))
            .returning(|_| Ok(None));

        let engine = engine_with(repo);
        let result = engine
            .finalize_from_callback(
                "0000000000",
                TransactionStatus::Approved,
                None,
                Some("00".into()),
                Some("approved".into()),
                CardIndicators::default(),
            )
            .await;

        assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
    }

    #[tokio::test]
    async fn finalize_from_callback_is_a_no_op_on_replayed_terminal_row() {
        let mut existing = new_pending(
            MerchantId::new(),
            None,
            None,
            None,
            None,
            TransactionType::Auth,
            Money::new(1000, "USD").unwrap(),
            None,
            serde_json::json!({}),
        );
        existing.status = TransactionStatus::Approved;
        let tran_nbr = existing.gateway_tran_nbr.clone().unwrap();
        let expected_id = existing.id;

        let mut repo = MockTransactionRepo::new();
        repo.expect_find_by_gateway_tran_nbr()
            .returning(move |_| Ok(Some(existing.clone())));

        let engine = engine_with(repo);
        let result = engine
            .finalize_from_callback(
                &tran_nbr,
                TransactionStatus::Approved,
                None,
                Some("00".into()),
                Some("approved".into()),
                CardIndicators::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.id, expected_id);
        assert_eq!(result.status, TransactionStatus::Approved);
    }
}
