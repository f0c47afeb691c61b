//! Service (caller identity) CRUD and grant management (spec §6). Same
//! thin-CRUD shape as [`super::merchant_admin`]; the one piece of real
//! logic is the key fingerprint the trust layer (C5) uses to look a
//! service up by `kid` (spec §4.5) — computed here so it's never out of
//! sync with what `find_by_fingerprint` expects.

use std::sync::Arc;

use chrono::Utc;
use common::{MerchantId, ServiceId};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::ServiceRepository;
use crate::domain::service::{Scope, Service, ServiceEnvironment, ServiceMerchantGrant};

#[derive(Debug, Clone)]
pub struct CreateServiceRequest {
    pub external_id: String,
    pub public_key_pem: String,
    pub environment: ServiceEnvironment,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateServiceRequest {
    pub active: Option<bool>,
    pub rate_limit_per_second: Option<u32>,
    pub rate_limit_burst: Option<u32>,
}

pub struct ServiceAdminEngine {
    services: Arc<dyn ServiceRepository>,
}

impl ServiceAdminEngine {
    pub fn new(services: Arc<dyn ServiceRepository>) -> Self {
        Self { services }
    }

    pub async fn create_service(&self, req: CreateServiceRequest) -> Result<Service, OrchestratorError> {
        let key_fingerprint = fingerprint_of(&req.public_key_pem)?;
        if self.services.find_by_fingerprint(&key_fingerprint).await?.is_some() {
            return Err(OrchestratorError::AlreadyExists(format!(
                "service with key fingerprint {key_fingerprint}"
            )));
        }

        let now = Utc::now();
        let service = Service {
            id: ServiceId::new(),
            external_id: req.external_id,
            public_key_pem: req.public_key_pem,
            key_fingerprint,
            environment: req.environment,
            rate_limit_per_second: req.rate_limit_per_second,
            rate_limit_burst: req.rate_limit_burst,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.services.create(service).await
    }

    pub async fn update_service(
        &self,
        id: ServiceId,
        req: UpdateServiceRequest,
    ) -> Result<Service, OrchestratorError> {
        let mut service = self
            .services
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("service {id}")))?;

        if let Some(active) = req.active {
            service.active = active;
        }
        if let Some(rps) = req.rate_limit_per_second {
            service.rate_limit_per_second = rps;
        }
        if let Some(burst) = req.rate_limit_burst {
            service.rate_limit_burst = burst;
        }
        service.updated_at = Utc::now();
        self.services.update(service).await
    }

    /// Replaces the service's public key and fingerprint. Existing
    /// grants are untouched — they key on `service_id`, not the
    /// fingerprint, so a rotation doesn't require re-granting access.
    pub async fn rotate_service_key(
        &self,
        id: ServiceId,
        new_public_key_pem: String,
    ) -> Result<Service, OrchestratorError> {
        let mut service = self
            .services
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("service {id}")))?;

        let key_fingerprint = fingerprint_of(&new_public_key_pem)?;
        if let Some(existing) = self.services.find_by_fingerprint(&key_fingerprint).await? {
            if existing.id != id {
                return Err(OrchestratorError::AlreadyExists(format!(
                    "service with key fingerprint {key_fingerprint}"
                )));
            }
        }

        service.public_key_pem = new_public_key_pem;
        service.key_fingerprint = key_fingerprint;
        service.updated_at = Utc::now();
        self.services.update(service).await
    }

    pub async fn get_service(&self, id: ServiceId) -> Result<Service, OrchestratorError> {
        self.services
            .find_by_id(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("service {id}")))
    }

    pub async fn grant_access(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
        scopes: BTreeSet<Scope>,
    ) -> Result<ServiceMerchantGrant, OrchestratorError> {
        let now = Utc::now();
        let existing = self.services.find_grant(service_id, merchant_id).await?;
        let grant = ServiceMerchantGrant {
            service_id,
            merchant_id,
            scopes,
            created_at: existing.map(|g| g.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.services.upsert_grant(grant).await
    }

    pub async fn revoke_access(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
    ) -> Result<(), OrchestratorError> {
        self.services.revoke_grant(service_id, merchant_id).await
    }
}

/// SHA-256 hex digest of the key's DER bytes, recovered by stripping
/// the PEM header/footer lines and base64-decoding the body — avoids
/// pulling in a dedicated ASN.1 parser for what is just "hash the key
/// material".
fn fingerprint_of(public_key_pem: &str) -> Result<String, OrchestratorError> {
    use base64::Engine;

    let der_b64: String = public_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::engine::general_purpose::STANDARD
        .decode(der_b64.trim())
        .map_err(|e| OrchestratorError::InvalidRequest(format!("invalid public key PEM: {e}")))?;

    let digest = Sha256::digest(&der);
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Services {}
        #[async_trait]
        impl ServiceRepository for Services {
            async fn create(&self, service: Service) -> Result<Service, OrchestratorError>;
            async fn update(&self, service: Service) -> Result<Service, OrchestratorError>;
            async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, OrchestratorError>;
            async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Service>, OrchestratorError>;
            async fn upsert_grant(&self, grant: ServiceMerchantGrant) -> Result<ServiceMerchantGrant, OrchestratorError>;
            async fn revoke_grant(&self, service_id: ServiceId, merchant_id: MerchantId) -> Result<(), OrchestratorError>;
            async fn find_grant(&self, service_id: ServiceId, merchant_id: MerchantId) -> Result<Option<ServiceMerchantGrant>, OrchestratorError>;
        }
    }

    const SAMPLE_PEM: &str = "-----BEGIN PUBLIC KEY-----\nMAA=\n-----END PUBLIC KEY-----\n";

    fn sample_service(id: ServiceId, fingerprint: &str) -> Service {
        let now = Utc::now();
        Service {
            id,
            external_id: "pos-app".into(),
            public_key_pem: SAMPLE_PEM.into(),
            key_fingerprint: fingerprint.into(),
            environment: ServiceEnvironment::Sandbox,
            rate_limit_per_second: 50,
            rate_limit_burst: 100,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fingerprint_is_deterministic_and_hex() {
        let a = fingerprint_of(SAMPLE_PEM).unwrap();
        let b = fingerprint_of(SAMPLE_PEM).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_rejects_invalid_base64() {
        let result = fingerprint_of("-----BEGIN PUBLIC KEY-----\nnot base64!!\n-----END PUBLIC KEY-----\n");
        assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn create_service_rejects_duplicate_fingerprint() {
        let fingerprint = fingerprint_of(SAMPLE_PEM).unwrap();
        let mut services = MockServices::new();
        services
            .expect_find_by_fingerprint()
            .with(eq(fingerprint.clone()))
            .returning(move |_| Ok(Some(sample_service(ServiceId::new(), &fingerprint))));

        let engine = ServiceAdminEngine::new(Arc::new(services));
        let result = engine
            .create_service(CreateServiceRequest {
                external_id: "pos-app".into(),
                public_key_pem: SAMPLE_PEM.into(),
                environment: ServiceEnvironment::Sandbox,
                rate_limit_per_second: 50,
                rate_limit_burst: 100,
            })
            .await;

        assert!(matches!(result, Err(OrchestratorError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn grant_access_preserves_created_at_on_update() {
        let service_id = ServiceId::new();
        let merchant_id = MerchantId::new();
        let original_created_at = Utc::now();

        let mut services = MockServices::new();
        services.expect_find_grant().returning(move |_, _| {
            Ok(Some(ServiceMerchantGrant {
                service_id,
                merchant_id,
                scopes: BTreeSet::from([Scope::PaymentRead]),
                created_at: original_created_at,
                updated_at: original_created_at,
            }))
        });
        services.expect_upsert_grant().returning(|g| Ok(g));

        let engine = ServiceAdminEngine::new(Arc::new(services));
        let scopes = BTreeSet::from([Scope::PaymentRead, Scope::PaymentCreate]);
        let grant = engine.grant_access(service_id, merchant_id, scopes).await.unwrap();

        assert_eq!(grant.created_at, original_created_at);
        assert!(grant.scopes.contains(&Scope::PaymentCreate));
    }
}
