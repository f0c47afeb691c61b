//! C7: the payment-method engine. Tokenization with the gateway
//! precedes persistence (a storage token is useless to persist if the
//! gateway never issues one), mirroring the teacher's
//! "contact the external side first, then persist what it returned"
//! shape from `ProcessTransactionUseCase`, but without the pending-row
//! write-ahead step transactions need — a payment method has no
//! in-flight state between "not yet created" and "created".

use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, MerchantId, Money, PaymentMethodId};

use crate::domain::error::OrchestratorError;
use crate::domain::gateway::{GatewayAdapter, GatewayRequest, StoredMethodKind, TokenOrAccount};
use crate::domain::payment_method::{
    AchAccountType, AchDetails, CardDetails, PaymentMethod, PaymentMethodType, VerificationStatus,
};
use crate::domain::repository::PaymentMethodRepository;
use crate::domain::transaction::TransactionType;
use crate::infrastructure::credential_cache::MerchantCredentialCache;
use crate::infrastructure::storage::{Storage, TimeoutClass};
use common::tran_nbr_from_uuid;
use uuid::Uuid;

use super::transaction_engine::{BrowserPostRequest, TransactionEngine};

#[derive(Debug, Clone)]
pub struct ConvertFinanceTokenRequest {
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub finance_token: String,
    pub last_four: String,
    pub card: CardDetails,
}

#[derive(Debug, Clone)]
pub struct StoreAchAccountRequest {
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub routing_nbr: String,
    pub account_nbr: String,
    pub account_type: AchAccountType,
    pub last_four: String,
    pub bank_name: Option<String>,
}

/// Requests the single-use authorization code a browser-originated
/// payment submission needs (spec §4.2, §6 "Tokenization request").
/// `group_id` ties the subsequent browser-post callback back to this
/// session; callers mint it however they track the in-flight checkout
/// (a transaction's pending id, a cart id) and pass it straight through.
#[derive(Debug, Clone)]
pub struct BeginTokenizationRequest {
    pub merchant_id: MerchantId,
    pub customer_id: Option<CustomerId>,
    pub amount: Money,
    pub return_url: String,
    pub cancel_url: String,
    pub idempotency_key: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct TokenizationSession {
    pub transaction_id: common::TransactionId,
    pub auth_code: String,
    pub expires_in_secs: u32,
}

pub struct PaymentMethodEngine {
    storage: Storage,
    payment_methods: Arc<dyn PaymentMethodRepository>,
    credentials: Arc<MerchantCredentialCache>,
    gateway: Arc<dyn GatewayAdapter>,
    transactions: Arc<TransactionEngine>,
}

impl PaymentMethodEngine {
    pub fn new(
        storage: Storage,
        payment_methods: Arc<dyn PaymentMethodRepository>,
        credentials: Arc<MerchantCredentialCache>,
        gateway: Arc<dyn GatewayAdapter>,
        transactions: Arc<TransactionEngine>,
    ) -> Self {
        Self {
            storage,
            payment_methods,
            credentials,
            gateway,
            transactions,
        }
    }

    /// Pre-step for a browser-originated card submission: creates the
    /// pending sale row the later callback will finalize (spec §4.9's
    /// join-point design note), then mints a single-use auth code bound
    /// to that row's `gateway_tran_nbr`, which the caller embeds in the
    /// redirect it sends the cardholder's browser to (spec §6
    /// "Tokenization request"). The same `tran_nbr` doubles as the
    /// gateway's `BATCH_ID`/group id field — both exist only to let the
    /// callback find its way back to this row, so one identifier serves
    /// both purposes.
    pub async fn begin_tokenization(
        &self,
        req: BeginTokenizationRequest,
    ) -> Result<TokenizationSession, OrchestratorError> {
        let creds = self.credentials.get(req.merchant_id).await?;
        let credentials = super::gateway_credentials_from(&creds);

        let pending = self
            .transactions
            .begin_browser_post(
                BrowserPostRequest {
                    merchant_id: req.merchant_id,
                    customer_id: req.customer_id,
                    payment_method_id: None,
                    amount: req.amount,
                    idempotency_key: req.idempotency_key,
                    metadata: req.metadata,
                },
                TransactionType::Sale,
            )
            .await?;
        let tran_nbr = pending
            .gateway_tran_nbr
            .clone()
            .ok_or_else(|| OrchestratorError::Internal("pending row missing tran_nbr".into()))?;

        let request = GatewayRequest::Tokenization {
            tran_nbr: tran_nbr.clone(),
            amount: req.amount,
            group_id: tran_nbr,
            return_url: req.return_url,
            cancel_url: req.cancel_url,
        };
        let response = self
            .gateway
            .tokenize(&credentials, request)
            .await
            .map_err(map_storage_error)?;

        Ok(TokenizationSession {
            transaction_id: pending.id,
            auth_code: response.auth_code,
            expires_in_secs: response.expires_in_secs,
        })
    }

    /// Exchanges a short-lived finance token (minted by the
    /// tokenization flow, spec §4.4/§4.2) for a durable storage token
    /// (`CCE8`) and persists the result as a chargeable card method.
    pub async fn convert_finance_token_to_storage_token(
        &self,
        req: ConvertFinanceTokenRequest,
    ) -> Result<PaymentMethod, OrchestratorError> {
        let creds = self.credentials.get(req.merchant_id).await?;
        let credentials = super::gateway_credentials_from(&creds);
        let tran_nbr = tran_nbr_from_uuid(Uuid::new_v4());

        let request = GatewayRequest::StorageToken {
            tran_nbr,
            source: TokenOrAccount::FinanceToken(req.finance_token),
        };
        let response = self
            .gateway
            .execute(&credentials, request)
            .await
            .map_err(|e| map_storage_error(e))?;
        let storage_token = response
            .gateway_token
            .ok_or_else(|| OrchestratorError::Internal("gateway did not return a storage token".into()))?;

        let now = Utc::now();
        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            merchant_id: req.merchant_id,
            customer_id: req.customer_id,
            method_type: PaymentMethodType::Card,
            storage_token,
            last_four: req.last_four,
            card: Some(req.card),
            ach: None,
            is_default: false,
            active: true,
            verification_status: VerificationStatus::Verified,
            verified_at: Some(now),
            last_used_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payment_methods.create(method).await
    }

    /// Registers an ACH account: a pre-note (`CKC0`/`CKS0`, zero
    /// amount) validates debitability before anything is persisted
    /// (spec §4.7 "sends a pre-note... to validate debitability; on
    /// approval it creates the payment-method row"); only then does the
    /// engine mint the durable storage token (`CKC8`). The row is
    /// created `pending`/`active=false` — not usable for charging
    /// (spec §4.7) — until the separate verification sweep promotes it
    /// to `verified`/`active=true`; the pre-note here gates account
    /// creation, not chargeability.
    pub async fn store_ach_account(
        &self,
        req: StoreAchAccountRequest,
    ) -> Result<PaymentMethod, OrchestratorError> {
        let creds = self.credentials.get(req.merchant_id).await?;
        let credentials = super::gateway_credentials_from(&creds);

        let prenote = GatewayRequest::PreNote {
            tran_nbr: tran_nbr_from_uuid(Uuid::new_v4()),
            routing_nbr: req.routing_nbr.clone(),
            account_nbr: req.account_nbr.clone(),
            account_type: req.account_type,
        };
        self.gateway
            .execute(&credentials, prenote)
            .await
            .map_err(map_storage_error)?;

        let request = GatewayRequest::StorageToken {
            tran_nbr: tran_nbr_from_uuid(Uuid::new_v4()),
            source: TokenOrAccount::AchAccount {
                routing_nbr: req.routing_nbr,
                account_nbr: req.account_nbr,
                account_type: req.account_type,
            },
        };
        let response = self
            .gateway
            .execute(&credentials, request)
            .await
            .map_err(map_storage_error)?;
        let storage_token = response
            .gateway_token
            .ok_or_else(|| OrchestratorError::Internal("gateway did not return a storage token".into()))?;

        let now = Utc::now();
        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            merchant_id: req.merchant_id,
            customer_id: req.customer_id,
            method_type: PaymentMethodType::Ach,
            storage_token,
            last_four: req.last_four,
            card: None,
            ach: Some(AchDetails {
                bank_name: req.bank_name,
                account_type: req.account_type,
            }),
            is_default: false,
            active: false,
            verification_status: VerificationStatus::Pending,
            verified_at: None,
            last_used_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payment_methods.create(method).await
    }

    pub async fn list_payment_methods(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Vec<PaymentMethod>, OrchestratorError> {
        let methods = self
            .payment_methods
            .list_for_customer(merchant_id, customer_id)
            .await?;
        Ok(methods.into_iter().filter(PaymentMethod::is_listable).collect())
    }

    /// Opens the transaction `PaymentMethodRepository::set_default`
    /// needs itself, so API handlers never have to reach into
    /// `infrastructure::storage` directly (spec §4.7).
    pub async fn set_default_payment_method(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
        id: PaymentMethodId,
    ) -> Result<(), OrchestratorError> {
        let method = self
            .payment_methods
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("payment method {id}")))?;
        if method.merchant_id != merchant_id || method.customer_id != *customer_id {
            return Err(OrchestratorError::NotFound(format!("payment method {id}")));
        }
        let customer_id = customer_id.clone();
        self.storage
            .with_tx(TimeoutClass::Simple, move |conn| {
                let payment_methods = self.payment_methods.clone();
                async move {
                    payment_methods
                        .set_default(conn, merchant_id, &customer_id, id)
                        .await
                }
            })
            .await
    }

    pub async fn delete_payment_method(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
        id: PaymentMethodId,
    ) -> Result<(), OrchestratorError> {
        let method = self
            .payment_methods
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("payment method {id}")))?;
        if method.merchant_id != merchant_id || method.customer_id != *customer_id {
            return Err(OrchestratorError::NotFound(format!("payment method {id}")));
        }
        self.payment_methods.soft_delete(id).await
    }

    /// Runs one batch of the ACH verification sweep (spec §4.7, §9
    /// "ticker... queries a batch, verifies, advances"). Each row is
    /// promoted independently via a guarded single-row update so a
    /// failure partway through a batch never leaves the batch half
    /// applied; returns how many rows were promoted.
    pub async fn verify_pending_ach_batch(&self, cutoff: chrono::DateTime<Utc>, batch_size: i64) -> Result<u64, OrchestratorError> {
        let pending = self
            .payment_methods
            .list_pending_ach_older_than(cutoff, batch_size)
            .await?;
        let mut promoted = 0u64;
        for method in pending {
            match self.payment_methods.verify_if_pending(method.id, Utc::now()).await {
                Ok(true) => promoted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, payment_method_id = %method.id, "ACH verification failed for row");
                }
            }
        }
        Ok(promoted)
    }
}

fn map_storage_error(e: crate::domain::gateway::GatewayError) -> OrchestratorError {
    use crate::domain::gateway::GatewayError;
    match e {
        GatewayError::CircuitOpen => OrchestratorError::Unavailable("gateway circuit open".into()),
        GatewayError::Transport(msg) => OrchestratorError::Unavailable(format!("gateway transport failure: {msg}")),
        GatewayError::InvalidRequest(msg) => OrchestratorError::InvalidRequest(msg),
        GatewayError::Declined { code, text } => OrchestratorError::Declined { code, text },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{GatewayCredentials, GatewayResponse, TokenizationResponse};
    use crate::domain::merchant::{Environment, GatewayIdentity, Merchant};
    use crate::domain::repository::MerchantRepository;
    use crate::domain::secret_store::{RotationResult, SecretStore, SecretStoreError, VersionedSecret};
    use async_trait::async_trait;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub PaymentMethods {}

        #[async_trait]
        impl PaymentMethodRepository for PaymentMethods {
            async fn create(&self, method: PaymentMethod) -> Result<PaymentMethod, OrchestratorError>;
            async fn find_by_id(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, OrchestratorError>;
            async fn list_for_customer(&self, merchant_id: MerchantId, customer_id: &CustomerId) -> Result<Vec<PaymentMethod>, OrchestratorError>;
            async fn soft_delete(&self, id: PaymentMethodId) -> Result<(), OrchestratorError>;
            async fn touch_last_used(&self, id: PaymentMethodId) -> Result<(), OrchestratorError>;
            async fn set_default(&self, conn: &mut sqlx::PgConnection, merchant_id: MerchantId, customer_id: &CustomerId, id: PaymentMethodId) -> Result<(), OrchestratorError>;
            async fn verify_if_pending(&self, id: PaymentMethodId, now: chrono::DateTime<Utc>) -> Result<bool, OrchestratorError>;
            async fn list_pending_ach_older_than(&self, cutoff: chrono::DateTime<Utc>, batch_size: i64) -> Result<Vec<PaymentMethod>, OrchestratorError>;
        }
    }

    mock! {
        pub Gateway {}

        #[async_trait]
        impl GatewayAdapter for Gateway {
            async fn execute(&self, credentials: &GatewayCredentials, request: GatewayRequest) -> Result<GatewayResponse, crate::domain::gateway::GatewayError>;
            async fn tokenize(&self, credentials: &GatewayCredentials, request: GatewayRequest) -> Result<TokenizationResponse, crate::domain::gateway::GatewayError>;
        }
    }

    mock! {
        pub Merchants {}

        #[async_trait]
        impl MerchantRepository for Merchants {
            async fn create(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
            async fn update(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError>;
            async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, OrchestratorError>;
            async fn find_by_slug(&self, slug: &str) -> Result<Option<Merchant>, OrchestratorError>;
            async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Merchant>, OrchestratorError>;
        }
    }

    mock! {
        pub Transactions {}

        #[async_trait]
        impl crate::domain::repository::TransactionRepository for Transactions {
            async fn find_by_id(&self, id: common::TransactionId) -> Result<Option<crate::domain::transaction::Transaction>, OrchestratorError>;
            async fn find_by_idempotency_key(&self, merchant_id: MerchantId, key: &str) -> Result<Option<crate::domain::transaction::Transaction>, OrchestratorError>;
            async fn find_by_gateway_tran_nbr(&self, tran_nbr: &str) -> Result<Option<crate::domain::transaction::Transaction>, OrchestratorError>;
            async fn list(&self, merchant_id: MerchantId, customer_id: Option<&CustomerId>, limit: i64, offset: i64) -> Result<Vec<crate::domain::transaction::Transaction>, OrchestratorError>;
            async fn get_lineage(&self, id: common::TransactionId) -> Result<Vec<crate::domain::transaction::Transaction>, OrchestratorError>;
            async fn insert_pending(&self, conn: &mut sqlx::PgConnection, transaction: crate::domain::transaction::Transaction) -> Result<(crate::domain::transaction::Transaction, bool), OrchestratorError>;
            async fn lock_parent_with_child_sum(&self, conn: &mut sqlx::PgConnection, parent_id: common::TransactionId, child_type: crate::domain::transaction::TransactionType) -> Result<Option<(crate::domain::transaction::Transaction, Money)>, OrchestratorError>;
            #[allow(clippy::too_many_arguments)]
            async fn finalize(&self, conn: &mut sqlx::PgConnection, id: common::TransactionId, status: crate::domain::transaction::TransactionStatus, gateway_tran_nbr: Option<String>, gateway_token: Option<String>, gateway_response_code: Option<String>, gateway_response_text: Option<String>, card_indicators: crate::domain::transaction::CardIndicators, processed_at: chrono::DateTime<Utc>) -> Result<bool, OrchestratorError>;
        }
    }

    mock! {
        pub Audit {}

        #[async_trait]
        impl crate::domain::repository::AuditRepository for Audit {
            async fn record(&self, log: crate::domain::audit::AuditLog) -> Result<(), OrchestratorError>;
            async fn cleanup_older_than(&self, cutoff: chrono::DateTime<Utc>, batch_size: i64) -> Result<u64, OrchestratorError>;
        }
    }

    /// A [`TransactionEngine`] wired with fresh, expectation-free mocks.
    /// `begin_tokenization` reaches into this to stamp a pending row, but
    /// none of the tests below exercise that path, so the mocks here
    /// never need expectations set.
    fn dummy_transaction_engine(
        storage: Storage,
        credentials: Arc<MerchantCredentialCache>,
        gateway: Arc<dyn GatewayAdapter>,
        transactions: MockTransactions,
    ) -> Arc<TransactionEngine> {
        Arc::new(TransactionEngine::new(
            storage,
            Arc::new(transactions),
            credentials,
            gateway,
            Arc::new(MockAudit::new()),
        ))
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
    async fn convert_finance_token_persists_card_method_on_success() {
        let mut payment_methods = MockPaymentMethods::new();
        let mut gateway = MockGateway::new();
        let mut merchants = MockMerchants::new();

        merchants.expect_find_by_id().returning(move |id| Ok(Some(sample_merchant(id))));
        gateway.expect_execute().returning(|_, _| {
            Ok(GatewayResponse {
                gateway_token: Some("STORE-TOKEN".into()),
                response_code: "00".into(),
                response_text: "APPROVED".into(),
                authorization_code: None,
                network_transaction_id: None,
                card_indicators: Default::default(),
                raw_payload: HashMap::new(),
            })
        });
        payment_methods
            .expect_create()
            .withf(|m: &PaymentMethod| m.storage_token == "STORE-TOKEN" && m.verification_status == VerificationStatus::Verified)
            .returning(|m| Ok(m));

        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(merchants),
            Arc::new(StaticSecretStore),
            std::time::Duration::from_secs(60),
            10,
        ));
        let engine = PaymentMethodEngine::new(
            Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
            Arc::new(payment_methods),
            credentials.clone(),
            Arc::new(gateway),
            dummy_transaction_engine(
                Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
                credentials,
                Arc::new(MockGateway::new()),
                MockTransactions::new(),
            ),
        );

        let result = engine
            .convert_finance_token_to_storage_token(ConvertFinanceTokenRequest {
                merchant_id: MerchantId::new(),
                customer_id: CustomerId("cust-1".into()),
                finance_token: "tok_abc".into(),
                last_four: "4242".into(),
                card: CardDetails { brand: "visa".into(), exp_month: 12, exp_year: 2030 },
            })
            .await
            .unwrap();

        assert_eq!(result.storage_token, "STORE-TOKEN");
        assert!(result.is_chargeable());
    }

    #[tokio::test]
    async fn store_ach_account_sends_prenote_before_storage_token() {
        let mut payment_methods = MockPaymentMethods::new();
        let mut gateway = MockGateway::new();
        let mut merchants = MockMerchants::new();

        merchants.expect_find_by_id().returning(move |id| Ok(Some(sample_merchant(id))));

        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_for_closure = calls.clone();
        gateway.expect_execute().returning(move |_, req| {
            let tag = match req {
                GatewayRequest::PreNote { .. } => "prenote",
                GatewayRequest::StorageToken { .. } => "storage_token",
                _ => "other",
            };
            calls_for_closure.lock().unwrap().push(tag);
            Ok(GatewayResponse {
                gateway_token: Some("ACH-TOKEN".into()),
                response_code: "00".into(),
                response_text: "APPROVED".into(),
                authorization_code: None,
                network_transaction_id: None,
                card_indicators: Default::default(),
                raw_payload: HashMap::new(),
            })
        });
        payment_methods
            .expect_create()
            .withf(|m: &PaymentMethod| {
                m.storage_token == "ACH-TOKEN" && m.verification_status == VerificationStatus::Pending
            })
            .returning(|m| Ok(m));

        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(merchants),
            Arc::new(StaticSecretStore),
            std::time::Duration::from_secs(60),
            10,
        ));
        let engine = PaymentMethodEngine::new(
            Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
            Arc::new(payment_methods),
            credentials.clone(),
            Arc::new(gateway),
            dummy_transaction_engine(
                Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
                credentials,
                Arc::new(MockGateway::new()),
                MockTransactions::new(),
            ),
        );

        let result = engine
            .store_ach_account(StoreAchAccountRequest {
                merchant_id: MerchantId::new(),
                customer_id: CustomerId("cust-1".into()),
                routing_nbr: "routing".into(),
                account_nbr: "account".into(),
                account_type: AchAccountType::Checking,
                last_four: "6789".into(),
                bank_name: Some("First Bank".into()),
            })
            .await
            .unwrap();

        assert_eq!(result.storage_token, "ACH-TOKEN");
        assert!(!result.is_chargeable());
        assert_eq!(*calls.lock().unwrap(), vec!["prenote", "storage_token"]);
    }

    #[tokio::test]
    async fn verify_pending_ach_batch_counts_only_promoted_rows() {
        let mut payment_methods = MockPaymentMethods::new();
        let now = Utc::now();
        let cutoff = now;

        let pending_methods = vec![sample_pending_ach(), sample_pending_ach()];
        let ids: Vec<PaymentMethodId> = pending_methods.iter().map(|m| m.id).collect();
        payment_methods
            .expect_list_pending_ach_older_than()
            .returning(move |_, _| Ok(pending_methods.clone()));
        let first_id = ids[0];
        payment_methods
            .expect_verify_if_pending()
            .withf(move |id, _| *id == first_id)
            .returning(|_, _| Ok(true));
        let second_id = ids[1];
        payment_methods
            .expect_verify_if_pending()
            .withf(move |id, _| *id == second_id)
            .returning(|_, _| Ok(false));

        let merchants = MockMerchants::new();
        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(merchants),
            Arc::new(StaticSecretStore),
            std::time::Duration::from_secs(60),
            10,
        ));
        let engine = PaymentMethodEngine::new(
            Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
            Arc::new(payment_methods),
            credentials.clone(),
            Arc::new(MockGateway::new()),
            dummy_transaction_engine(
                Storage::from_pool(sqlx::Pool::connect_lazy("postgres://unused").unwrap()),
                credentials,
                Arc::new(MockGateway::new()),
                MockTransactions::new(),
            ),
        );

        let promoted = engine.verify_pending_ach_batch(cutoff, 10).await.unwrap();
        assert_eq!(promoted, 1);
    }

    fn sample_pending_ach() -> PaymentMethod {
        let now = Utc::now();
        PaymentMethod {
            id: PaymentMethodId::new(),
            merchant_id: MerchantId::new(),
            customer_id: CustomerId("cust-1".into()),
            method_type: PaymentMethodType::Ach,
            storage_token: "ACH-TOKEN".into(),
            last_four: "6789".into(),
            card: None,
            ach: Some(AchDetails { bank_name: None, account_type: AchAccountType::Checking }),
            is_default: false,
            active: true,
            verification_status: VerificationStatus::Pending,
            verified_at: None,
            last_used_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
