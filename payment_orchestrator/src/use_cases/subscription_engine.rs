//! C8: the subscription engine. `process_due_billing` is the
//! recurring-charge counterpart of the teacher's
//! `RetryFailedTransactionJob` — both scan a due set and advance each
//! row independently, logging and continuing past a single row's
//! failure instead of aborting the batch — but layered on top of
//! [`super::transaction_engine::TransactionEngine`] rather than calling
//! a gateway directly, since a subscription charge is exactly a sale
//! with a deterministic idempotency key (spec §4.8).

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{CustomerId, MerchantId, Money, PaymentMethodId, SubscriptionId};
use serde_json::Value;

use crate::domain::error::OrchestratorError;
use crate::domain::payment_method::PaymentMethod;
use crate::domain::repository::{PaymentMethodRepository, SubscriptionRepository};
use crate::domain::subscription::{Interval, Subscription, SubscriptionStatus};
use crate::infrastructure::storage::{Storage, TimeoutClass};

use super::transaction_engine::{ChargeRequest, TransactionEngine};

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub payment_method_id: PaymentMethodId,
    pub amount: Money,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub max_retries: u32,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct UpdateSubscriptionRequest {
    pub merchant_id: MerchantId,
    pub id: SubscriptionId,
    pub amount: Option<Money>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BillingBatchSummary {
    pub billed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub past_due: u64,
}

enum BillOutcome {
    Billed,
    FailedRetrying,
    FailedPastDue,
    Skipped,
}

pub struct SubscriptionEngine {
    storage: Storage,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_methods: Arc<dyn PaymentMethodRepository>,
    transactions: Arc<TransactionEngine>,
}

impl SubscriptionEngine {
    pub fn new(
        storage: Storage,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_methods: Arc<dyn PaymentMethodRepository>,
        transactions: Arc<TransactionEngine>,
    ) -> Self {
        Self {
            storage,
            subscriptions,
            payment_methods,
            transactions,
        }
    }

    pub async fn create_subscription(
        &self,
        req: CreateSubscriptionRequest,
    ) -> Result<Subscription, OrchestratorError> {
        let method = self
            .payment_methods
            .find_by_id(req.payment_method_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("payment method {}", req.payment_method_id))
            })?;
        validate_method(&method, req.merchant_id, &req.customer_id)?;

        let now = Utc::now();
        let subscription = Subscription {
            id: SubscriptionId::new(),
            merchant_id: req.merchant_id,
            customer_id: req.customer_id,
            payment_method_id: req.payment_method_id,
            amount: req.amount,
            interval: req.interval,
            status: SubscriptionStatus::Active,
            next_billing_date: req.start_date,
            failure_retry_count: 0,
            max_retries: req.max_retries,
            cancelled_at: None,
            metadata: req.metadata,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.create(subscription).await
    }

    pub async fn update_subscription(
        &self,
        req: UpdateSubscriptionRequest,
    ) -> Result<Subscription, OrchestratorError> {
        let mut subscription = self.get_owned(req.merchant_id, req.id).await?;

        if let Some(payment_method_id) = req.payment_method_id {
            let method = self
                .payment_methods
                .find_by_id(payment_method_id)
                .await?
                .ok_or_else(|| {
                    OrchestratorError::NotFound(format!("payment method {payment_method_id}"))
                })?;
            validate_method(&method, req.merchant_id, &subscription.customer_id)?;
            subscription.payment_method_id = payment_method_id;
        }
        if let Some(amount) = req.amount {
            subscription.amount = amount;
        }
        if let Some(status) = req.status {
            if status == SubscriptionStatus::Cancelled && subscription.cancelled_at.is_none() {
                subscription.cancelled_at = Some(Utc::now());
            }
            subscription.status = status;
        }
        subscription.updated_at = Utc::now();
        self.subscriptions.update(subscription).await
    }

    pub async fn get_subscription(
        &self,
        merchant_id: MerchantId,
        id: SubscriptionId,
    ) -> Result<Subscription, OrchestratorError> {
        self.get_owned(merchant_id, id).await
    }

    pub async fn list_customer_subscriptions(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Vec<Subscription>, OrchestratorError> {
        self.subscriptions.list_for_customer(merchant_id, customer_id).await
    }

    async fn get_owned(
        &self,
        merchant_id: MerchantId,
        id: SubscriptionId,
    ) -> Result<Subscription, OrchestratorError> {
        let subscription = self
            .subscriptions
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("subscription {id}")))?;
        if subscription.merchant_id != merchant_id {
            return Err(OrchestratorError::NotFound(format!("subscription {id}")));
        }
        Ok(subscription)
    }

    /// One batch of the billing sweep (spec §4.8, §9): pulls up to
    /// `batch_size` due rows and bills each independently, continuing
    /// past a single subscription's failure the same way the teacher's
    /// `RetryFailedTransactionJob::run` continues past a single stuck
    /// transaction.
    pub async fn process_due_billing(
        &self,
        as_of: NaiveDate,
        batch_size: i64,
    ) -> Result<BillingBatchSummary, OrchestratorError> {
        let due = self.subscriptions.list_due(as_of, batch_size).await?;
        let mut summary = BillingBatchSummary::default();

        for subscription in due {
            let id = subscription.id;
            match self.bill_one(subscription, as_of).await {
                Ok(BillOutcome::Billed) => summary.billed += 1,
                Ok(BillOutcome::Skipped) => summary.skipped += 1,
                Ok(BillOutcome::FailedRetrying) => summary.failed += 1,
                Ok(BillOutcome::FailedPastDue) => {
                    summary.failed += 1;
                    summary.past_due += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, subscription_id = %id, "subscription billing attempt errored");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Locks the subscription row, charges it, and writes the
    /// resulting status back — all inside the **same** transaction, so
    /// the `FOR UPDATE` taken by `lock_for_billing` is held across the
    /// gateway round trip and is only released once the outcome is
    /// durable (spec §4.8: "within a per-row database transaction with
    /// a row lock on the subscription, the engine either... calls C6
    /// to issue a sale... [or]... increments
    /// `failure_retry_count`..."). A concurrent sweeper attempting the
    /// same row blocks on the lock until this transaction commits, then
    /// re-reads a row that is no longer due — total ordering per spec
    /// §5/§8, not merely per-call deduplication. `TimeoutClass::Report`
    /// is used rather than `Complex` because the held window now spans
    /// a gateway call, not just a row lookup.
    async fn bill_one(
        &self,
        subscription: Subscription,
        as_of: NaiveDate,
    ) -> Result<BillOutcome, OrchestratorError> {
        let id = subscription.id;
        let subscriptions = self.subscriptions.clone();
        let payment_methods = self.payment_methods.clone();
        let transactions = self.transactions.clone();

        self.storage
            .with_tx(TimeoutClass::Report, move |conn| {
                let subscriptions = subscriptions.clone();
                let payment_methods = payment_methods.clone();
                let transactions = transactions.clone();
                async move {
                    let locked = subscriptions.lock_for_billing(conn, id).await?;
                    let subscription = match locked {
                        Some(s) if s.status == SubscriptionStatus::Active && s.next_billing_date <= as_of => {
                            s
                        }
                        _ => return Ok(BillOutcome::Skipped),
                    };

                    let method = match payment_methods.find_by_id(subscription.payment_method_id).await? {
                        Some(m) if m.is_chargeable() => m,
                        _ => return apply_failure(conn, &subscriptions, subscription).await,
                    };

                    let idempotency_key = subscription.idempotency_key();
                    let charge = transactions
                        .sale(ChargeRequest {
                            merchant_id: subscription.merchant_id,
                            customer_id: Some(subscription.customer_id.clone()),
                            payment_method_id: Some(method.id),
                            amount: subscription.amount,
                            source: crate::domain::gateway::TokenOrAccount::StorageToken {
                                token: method.storage_token.clone(),
                                kind: match method.method_type {
                                    crate::domain::payment_method::PaymentMethodType::Card => {
                                        crate::domain::gateway::StoredMethodKind::Card
                                    }
                                    crate::domain::payment_method::PaymentMethodType::Ach => {
                                        crate::domain::gateway::StoredMethodKind::Ach
                                    }
                                },
                            },
                            idempotency_key: Some(idempotency_key),
                            metadata: subscription.metadata.clone(),
                        })
                        .await;

                    match charge {
                        Ok(tx) if tx.status == crate::domain::transaction::TransactionStatus::Approved => {
                            let mut updated = subscription.clone();
                            updated.next_billing_date =
                                subscription.interval.advance(subscription.next_billing_date);
                            updated.failure_retry_count = 0;
                            updated.status = SubscriptionStatus::Active;
                            subscriptions.save_in_tx(conn, updated).await?;
                            Ok(BillOutcome::Billed)
                        }
                        // The idempotency key collided with a row C6 has not
                        // finalized yet (e.g. a prior crash mid gateway-round-trip) —
                        // its outcome is still unknown, so this attempt is neither a
                        // success nor a billing failure; leave the retry count and
                        // `next_billing_date` alone and let the next sweep re-check it.
                        Ok(tx) if tx.status == crate::domain::transaction::TransactionStatus::Pending => {
                            Ok(BillOutcome::Skipped)
                        }
                        _ => apply_failure(conn, &subscriptions, subscription).await,
                    }
                }
            })
            .await
    }
}

/// Advances the retry counter (spec §4.8). `next_billing_date` is left
/// untouched in both branches so the next sweep retries the same
/// billing period; only reaching `max_retries` changes status, to
/// `past_due` — cancellation from there is a separate, explicit
/// `UpdateSubscription` call, never automatic (spec's state diagram has
/// no billing-fail edge into `cancelled`). Runs on the same connection
/// `bill_one` locked the row with, so the write lands before the lock
/// is released.
async fn apply_failure(
    conn: &mut sqlx::PgConnection,
    subscriptions: &Arc<dyn SubscriptionRepository>,
    subscription: Subscription,
) -> Result<BillOutcome, OrchestratorError> {
    let mut updated = subscription;
    updated.failure_retry_count += 1;

    let outcome = if updated.failure_retry_count >= updated.max_retries {
        updated.status = SubscriptionStatus::PastDue;
        BillOutcome::FailedPastDue
    } else {
        BillOutcome::FailedRetrying
    };
    subscriptions.save_in_tx(conn, updated).await?;
    Ok(outcome)
}

fn validate_method(
    method: &PaymentMethod,
    merchant_id: MerchantId,
    customer_id: &CustomerId,
) -> Result<(), OrchestratorError> {
    if method.merchant_id != merchant_id || method.customer_id != *customer_id {
        return Err(OrchestratorError::NotFound(format!("payment method {}", method.id)));
    }
    if !method.is_chargeable() {
        return Err(OrchestratorError::FailedPrecondition(
            "payment method is not chargeable".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::IntervalUnit;

    #[test]
    fn record_failure_reaches_past_due_at_max_retries() {
        // Exercised indirectly through bill_one in integration tests;
        // this covers the pure threshold arithmetic apply_failure
        // relies on.
        let max_retries = 3u32;
        let mut retry_count = 2u32;
        retry_count += 1;
        assert!(retry_count >= max_retries);
    }

    #[test]
    fn interval_advance_is_used_for_next_billing_date() {
        let interval = Interval { value: 1, unit: IntervalUnit::Month };
        let start = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(interval.advance(start), NaiveDate::from_ymd_opt(2026, 2, 15).unwrap());
    }
}
