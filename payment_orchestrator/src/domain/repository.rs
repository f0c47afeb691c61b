//! Repository ports (persistence boundary), following the teacher's
//! `TransactionRepository`/`UserRepository` pattern: one `#[async_trait]`
//! per aggregate, implemented by a concrete Postgres struct under
//! `infrastructure::persistence`, and mocked with `mockall` in every
//! use-case test module.
//!
//! Most methods take `&self` and run a single statement against the
//! repository's own pool, exactly like the teacher's repositories.
//! Operations that must participate in a caller-managed transaction
//! (row locks, multi-statement atomicity) instead take an explicit
//! `&mut sqlx::PgConnection` borrowed from `infrastructure::storage`'s
//! `with_tx` — the widening SPEC_FULL.md documents over the teacher's
//! plain `&PgPool`-only repositories.

use crate::domain::audit::AuditLog;
use crate::domain::error::OrchestratorError;
use crate::domain::merchant::Merchant;
use crate::domain::payment_method::PaymentMethod;
use crate::domain::rate_limit::RateLimitBucket;
use crate::domain::service::{Service, ServiceMerchantGrant};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::{Transaction, TransactionType};
use crate::domain::trust::{IpAllowlistEntry, JwtBlacklistEntry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CustomerId, MerchantId, PaymentMethodId, ServiceId, SubscriptionId, TransactionId};

#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn create(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
    async fn update(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
    async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, OrchestratorError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Merchant>, OrchestratorError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Merchant>, OrchestratorError>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: Service) -> Result<Service, OrchestratorError>;
    async fn update(&self, service: Service) -> Result<Service, OrchestratorError>;
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, OrchestratorError>;
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Service>, OrchestratorError>;

    async fn upsert_grant(
        &self,
        grant: ServiceMerchantGrant,
    ) -> Result<ServiceMerchantGrant, OrchestratorError>;
    async fn revoke_grant(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
    ) -> Result<(), OrchestratorError>;
    async fn find_grant(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
    ) -> Result<Option<ServiceMerchantGrant>, OrchestratorError>;
}

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    async fn create(&self, method: PaymentMethod) -> Result<PaymentMethod, OrchestratorError>;
    async fn find_by_id(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, OrchestratorError>;
    async fn list_for_customer(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Vec<PaymentMethod>, OrchestratorError>;
    async fn soft_delete(&self, id: PaymentMethodId) -> Result<(), OrchestratorError>;
    async fn touch_last_used(&self, id: PaymentMethodId) -> Result<(), OrchestratorError>;

    /// Clears any existing default for `(merchant_id, customer_id)` and
    /// sets `id` as the new default, in one transaction (spec §4.7).
    async fn set_default(
        &self,
        conn: &mut sqlx::PgConnection,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
        id: PaymentMethodId,
    ) -> Result<(), OrchestratorError>;

    /// Single atomic `UPDATE ... WHERE verification_status = 'pending'`
    /// (spec §4.7's ACH verification sweep). Returns `true` if this
    /// call performed the transition, `false` if the row had already
    /// moved (concurrent sweep) or didn't match the predicate.
    async fn verify_if_pending(
        &self,
        id: PaymentMethodId,
        now: DateTime<Utc>,
    ) -> Result<bool, OrchestratorError>;

    async fn list_pending_ach_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<Vec<PaymentMethod>, OrchestratorError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, OrchestratorError>;
    async fn find_by_idempotency_key(
        &self,
        merchant_id: MerchantId,
        key: &str,
    ) -> Result<Option<Transaction>, OrchestratorError>;

    /// Resolves the transaction-group id a browser-post callback
    /// carries back to the pending row the RPC path created at
    /// authorize-time (spec §4.9 "resolves the merchant from the
    /// transaction-group id") — the transaction row is the join point
    /// between the two flows (spec §9).
    async fn find_by_gateway_tran_nbr(
        &self,
        tran_nbr: &str,
    ) -> Result<Option<Transaction>, OrchestratorError>;
    async fn list(
        &self,
        merchant_id: MerchantId,
        customer_id: Option<&CustomerId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, OrchestratorError>;

    /// Recursive `WITH RECURSIVE` tree query: ancestors + full
    /// descendant subtree of `id`, in lineage order (spec §4.1, §4.6).
    async fn get_lineage(
        &self,
        id: TransactionId,
    ) -> Result<Vec<Transaction>, OrchestratorError>;

    /// Inserts a new `pending` row. If `idempotency_key` is set and a
    /// row with the same `(merchant_id, idempotency_key)` already
    /// exists, returns the existing row instead of erroring — the
    /// caller distinguishes the two cases via the returned `bool`
    /// (`true` = freshly inserted, `false` = pre-existing row returned).
    async fn insert_pending(
        &self,
        conn: &mut sqlx::PgConnection,
        transaction: Transaction,
    ) -> Result<(Transaction, bool), OrchestratorError>;

    /// Locks the parent row (`SELECT ... FOR UPDATE`) and returns it
    /// together with the sum of approved child amounts of `child_type`
    /// already recorded against it (spec §4.6 "row-level lock on the
    /// parent").
    async fn lock_parent_with_child_sum(
        &self,
        conn: &mut sqlx::PgConnection,
        parent_id: TransactionId,
        child_type: TransactionType,
    ) -> Result<Option<(Transaction, common::Money)>, OrchestratorError>;

    /// Finalizes a `pending` row to a terminal status, guarded by
    /// `status = 'pending'` so a row is never double-finalized.
    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        conn: &mut sqlx::PgConnection,
        id: TransactionId,
        status: crate::domain::transaction::TransactionStatus,
        gateway_tran_nbr: Option<String>,
        gateway_token: Option<String>,
        gateway_response_code: Option<String>,
        gateway_response_text: Option<String>,
        card_indicators: crate::domain::transaction::CardIndicators,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, OrchestratorError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, subscription: Subscription) -> Result<Subscription, OrchestratorError>;
    async fn update(&self, subscription: Subscription) -> Result<Subscription, OrchestratorError>;
    async fn find_by_id(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, OrchestratorError>;
    async fn list_for_customer(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Vec<Subscription>, OrchestratorError>;

    /// `next_billing_date <= as_of`, `status = active`, ordered
    /// ascending, capped at `batch_size` (spec §4.8 due-selection).
    async fn list_due(
        &self,
        as_of: NaiveDate,
        batch_size: i64,
    ) -> Result<Vec<Subscription>, OrchestratorError>;

    /// `SELECT ... FOR UPDATE` on a single subscription row, to be
    /// called inside the per-row transaction the billing sweeper opens
    /// for each due subscription.
    async fn lock_for_billing(
        &self,
        conn: &mut sqlx::PgConnection,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, OrchestratorError>;

    async fn save_in_tx(
        &self,
        conn: &mut sqlx::PgConnection,
        subscription: Subscription,
    ) -> Result<Subscription, OrchestratorError>;
}

#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn get_or_create(
        &self,
        key: &str,
        capacity: f64,
        refill_rate_per_sec: f64,
    ) -> Result<RateLimitBucket, OrchestratorError>;
    async fn save(&self, bucket: RateLimitBucket) -> Result<(), OrchestratorError>;
}

#[async_trait]
pub trait TrustRepository: Send + Sync {
    async fn blacklist_jti(&self, entry: JwtBlacklistEntry) -> Result<(), OrchestratorError>;
    async fn is_blacklisted(&self, jti: &str) -> Result<bool, OrchestratorError>;
    async fn sweep_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, OrchestratorError>;

    async fn is_ip_allowed(&self, ip: &str) -> Result<bool, OrchestratorError>;
    async fn add_allowed_ip(&self, entry: IpAllowlistEntry) -> Result<(), OrchestratorError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, log: AuditLog) -> Result<(), OrchestratorError>;
    async fn cleanup_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, OrchestratorError>;
}
