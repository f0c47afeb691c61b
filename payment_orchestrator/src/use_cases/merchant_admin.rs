//! Merchant operator CRUD (spec §6). Thin pass-through over
//! `MerchantRepository`, the same shape as the teacher's
//! `CreateUserUseCase`: a duplicate check, a domain constructor, a
//! repository call. The one addition over a plain CRUD use case is
//! that every mutation also keeps C2 (secret store) and C3 (credential
//! cache) in sync, since a merchant's MAC secret and its cached
//! gateway identity would otherwise drift from what this layer just
//! wrote.

use std::sync::Arc;

use chrono::Utc;
use common::MerchantId;

use crate::domain::error::OrchestratorError;
use crate::domain::merchant::{Environment, GatewayIdentity, Merchant};
use crate::domain::repository::MerchantRepository;
use crate::domain::secret_store::SecretStore;
use crate::infrastructure::credential_cache::MerchantCredentialCache;

#[derive(Debug, Clone)]
pub struct RegisterMerchantRequest {
    pub slug: String,
    pub gateway_identity: GatewayIdentity,
    pub mac_secret: String,
    pub environment: Environment,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMerchantRequest {
    pub gateway_identity: Option<GatewayIdentity>,
    pub active: Option<bool>,
    pub rate_limit_per_second: Option<u32>,
    pub rate_limit_burst: Option<u32>,
}

pub struct MerchantAdminEngine {
    merchants: Arc<dyn MerchantRepository>,
    secrets: Arc<dyn SecretStore>,
    credentials: Arc<MerchantCredentialCache>,
}

impl MerchantAdminEngine {
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        secrets: Arc<dyn SecretStore>,
        credentials: Arc<MerchantCredentialCache>,
    ) -> Self {
        Self {
            merchants,
            secrets,
            credentials,
        }
    }

    /// Creates the merchant row and its MAC secret together; the path
    /// under which the secret is stored is derived from the slug so it
    /// stays stable across rotations.
    pub async fn register_merchant(
        &self,
        req: RegisterMerchantRequest,
    ) -> Result<Merchant, OrchestratorError> {
        if self.merchants.find_by_slug(&req.slug).await?.is_some() {
            return Err(OrchestratorError::AlreadyExists(format!(
                "merchant with slug {}",
                req.slug
            )));
        }

        let mac_secret_path = format!("merchants/{}/mac", req.slug);
        self.secrets
            .put(&mac_secret_path, req.mac_secret)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("secret store error: {e}")))?;

        let now = Utc::now();
        let merchant = Merchant {
            id: MerchantId::new(),
            slug: req.slug,
            gateway_identity: req.gateway_identity,
            mac_secret_path,
            environment: req.environment,
            active: true,
            rate_limit_per_second: req.rate_limit_per_second,
            rate_limit_burst: req.rate_limit_burst,
            created_at: now,
            updated_at: now,
        };
        self.merchants.create(merchant).await
    }

    pub async fn update_merchant(
        &self,
        id: MerchantId,
        req: UpdateMerchantRequest,
    ) -> Result<Merchant, OrchestratorError> {
        let mut merchant = self
            .merchants
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("merchant {id}")))?;

        if let Some(gateway_identity) = req.gateway_identity {
            merchant.gateway_identity = gateway_identity;
        }
        if let Some(active) = req.active {
            merchant.active = active;
        }
        if let Some(rps) = req.rate_limit_per_second {
            merchant.rate_limit_per_second = rps;
        }
        if let Some(burst) = req.rate_limit_burst {
            merchant.rate_limit_burst = burst;
        }
        merchant.updated_at = Utc::now();

        let updated = self.merchants.update(merchant).await?;
        self.credentials.invalidate(id);
        Ok(updated)
    }

    /// Rotates the merchant's MAC secret in C2 and evicts the stale
    /// credential from C3 so the next request picks up the new value
    /// instead of serving out of the TTL window (spec §4.2, §4.3).
    pub async fn rotate_merchant_mac(
        &self,
        id: MerchantId,
        new_mac_secret: String,
    ) -> Result<(), OrchestratorError> {
        let merchant = self
            .merchants
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("merchant {id}")))?;

        self.secrets
            .rotate(&merchant.mac_secret_path, new_mac_secret)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("secret store error: {e}")))?;
        self.credentials.invalidate(id);
        Ok(())
    }

    pub async fn get_merchant(&self, id: MerchantId) -> Result<Merchant, OrchestratorError> {
        self.merchants
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("merchant {id}")))
    }

    pub async fn list_merchants(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Merchant>, OrchestratorError> {
        self.merchants.list(limit, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::secret_store::{RotationResult, SecretStoreError, VersionedSecret};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::time::Duration;

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
        pub Secrets {}
        #[async_trait]
        impl SecretStore for Secrets {
            async fn get_latest(&self, path: &str) -> Result<VersionedSecret, SecretStoreError>;
            async fn get_version(&self, path: &str, version: u32) -> Result<String, SecretStoreError>;
            async fn put(&self, path: &str, value: String) -> Result<u32, SecretStoreError>;
            async fn rotate(&self, path: &str, new_value: String) -> Result<RotationResult, SecretStoreError>;
            async fn delete(&self, path: &str) -> Result<(), SecretStoreError>;
        }
    }

    fn sample_merchant(id: MerchantId) -> Merchant {
        let now = Utc::now();
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
            created_at: now,
            updated_at: now,
        }
    }

    /// `MerchantCredentialCache` needs its own repository/secret-store
    /// handles; tests only exercise `invalidate`, which never reaches
    /// either, so these get no expectations set.
    fn engine(merchants: MockMerchants, secrets: MockSecrets) -> MerchantAdminEngine {
        let credentials = Arc::new(MerchantCredentialCache::new(
            Arc::new(MockMerchants::new()),
            Arc::new(MockSecrets::new()),
            Duration::from_secs(60),
            16,
        ));
        MerchantAdminEngine::new(Arc::new(merchants), Arc::new(secrets), credentials)
    }

    #[tokio::test]
    async fn register_merchant_rejects_duplicate_slug() {
        let mut merchants = MockMerchants::new();
        merchants
            .expect_find_by_slug()
            .with(eq("acme"))
            .returning(|_| Ok(Some(sample_merchant(MerchantId::new()))));
        let secrets = MockSecrets::new();

        let engine = engine(merchants, secrets);
        let result = engine
            .register_merchant(RegisterMerchantRequest {
                slug: "acme".into(),
                gateway_identity: GatewayIdentity {
                    customer_number: "1".into(),
                    merchant_number: "2".into(),
                    dba_number: "3".into(),
                    terminal_number: "4".into(),
                },
                mac_secret: "secret".into(),
                environment: Environment::Sandbox,
                rate_limit_per_second: 50,
                rate_limit_burst: 100,
            })
            .await;

        assert!(matches!(result, Err(OrchestratorError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn register_merchant_stores_secret_before_creating_row() {
        let mut merchants = MockMerchants::new();
        merchants.expect_find_by_slug().returning(|_| Ok(None));
        merchants.expect_create().returning(|m| Ok(m));

        let mut secrets = MockSecrets::new();
        secrets
            .expect_put()
            .with(eq("merchants/acme/mac"), eq("secret".to_string()))
            .returning(|_, _| Ok(1));

        let engine = engine(merchants, secrets);
        let merchant = engine
            .register_merchant(RegisterMerchantRequest {
                slug: "acme".into(),
                gateway_identity: GatewayIdentity {
                    customer_number: "1".into(),
                    merchant_number: "2".into(),
                    dba_number: "3".into(),
                    terminal_number: "4".into(),
                },
                mac_secret: "secret".into(),
                environment: Environment::Sandbox,
                rate_limit_per_second: 50,
                rate_limit_burst: 100,
            })
            .await
            .unwrap();

        assert_eq!(merchant.mac_secret_path, "merchants/acme/mac");
        assert!(merchant.active);
    }

    #[tokio::test]
    async fn rotate_merchant_mac_invalidates_cache() {
        let id = MerchantId::new();
        let mut merchants = MockMerchants::new();
        merchants.expect_find_by_id().returning(move |_| Ok(Some(sample_merchant(id))));

        let mut secrets = MockSecrets::new();
        secrets.expect_rotate().returning(|_, new_value| {
            Ok(RotationResult {
                previous: VersionedSecret { value: "old".into(), version: 1 },
                current: VersionedSecret { value: new_value, version: 2 },
            })
        });

        let engine = engine(merchants, secrets);
        engine.rotate_merchant_mac(id, "new-secret".into()).await.unwrap();
    }
}
