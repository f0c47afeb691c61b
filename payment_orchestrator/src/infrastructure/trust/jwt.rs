//! Inbound RPC authentication (spec §4.5): caller presents an RS256
//! bearer token; the server locates the matching public key by `kid`
//! fingerprint, verifies the signature, expiry and not-before, checks
//! `jti` against the blacklist, and confirms `(service_id, merchant_id)`
//! holds a grant whose scopes are a superset of what the operation
//! requires.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::{ServiceRepository, TrustRepository};
use crate::domain::service::{Scope, Service};
use common::MerchantId;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    merchant_id: String,
    scope: Vec<String>,
    jti: String,
    iss: String,
    exp: usize,
    #[serde(default)]
    nbf: Option<usize>,
}

/// The caller identity and authorization established by a verified
/// bearer token, handed to use cases so they never touch raw claims.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub service: Service,
    pub merchant_id: MerchantId,
    pub granted_scopes: BTreeSet<Scope>,
}

impl AuthenticatedCaller {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.granted_scopes.contains(&scope)
    }
}

fn parse_scope(raw: &str) -> Option<Scope> {
    [
        Scope::PaymentCreate,
        Scope::PaymentRead,
        Scope::PaymentUpdate,
        Scope::PaymentRefund,
        Scope::SubscriptionManage,
        Scope::PaymentMethodManage,
    ]
    .into_iter()
    .find(|s| s.as_str() == raw)
}

pub struct JwtAuthenticator {
    services: Arc<dyn ServiceRepository>,
    trust: Arc<dyn TrustRepository>,
    issuer_allowlist: Vec<String>,
}

impl JwtAuthenticator {
    pub fn new(
        services: Arc<dyn ServiceRepository>,
        trust: Arc<dyn TrustRepository>,
        issuer_allowlist: Vec<String>,
    ) -> Self {
        Self {
            services,
            trust,
            issuer_allowlist,
        }
    }

    /// Verifies `token` and checks that the resulting grant covers
    /// every scope in `required`. Every failure path returns the same
    /// opaque `Unauthenticated`/`PermissionDenied` kinds — never a
    /// detail about which check failed (spec §4.5, §7).
    pub async fn authenticate(
        &self,
        token: &str,
        required: &[Scope],
    ) -> Result<AuthenticatedCaller, OrchestratorError> {
        let header =
            decode_header(token).map_err(|_| OrchestratorError::Unauthenticated)?;
        let kid = header.kid.ok_or(OrchestratorError::Unauthenticated)?;

        let service = self
            .services
            .find_by_fingerprint(&kid)
            .await?
            .filter(|s| s.active)
            .ok_or(OrchestratorError::Unauthenticated)?;

        let decoding_key = DecodingKey::from_rsa_pem(service.public_key_pem.as_bytes())
            .map_err(|_| OrchestratorError::Unauthenticated)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        if !self.issuer_allowlist.is_empty() {
            validation.set_issuer(&self.issuer_allowlist);
        }

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| OrchestratorError::Unauthenticated)?;
        let claims = data.claims;

        if claims.sub != service.external_id {
            return Err(OrchestratorError::Unauthenticated);
        }
        if !self.issuer_allowlist.is_empty() && !self.issuer_allowlist.contains(&claims.iss) {
            return Err(OrchestratorError::Unauthenticated);
        }

        if self.trust.is_blacklisted(&claims.jti).await? {
            return Err(OrchestratorError::Unauthenticated);
        }

        let merchant_id = Uuid::parse_str(&claims.merchant_id)
            .map(MerchantId::from_uuid)
            .map_err(|_| OrchestratorError::Unauthenticated)?;

        let grant = self
            .services
            .find_grant(service.id, merchant_id)
            .await?
            .ok_or_else(|| OrchestratorError::PermissionDenied("no grant for merchant".into()))?;

        let requested: BTreeSet<Scope> = claims.scope.iter().filter_map(|s| parse_scope(s)).collect();
        if !requested.iter().all(|s| grant.scopes.contains(s)) {
            return Err(OrchestratorError::PermissionDenied(
                "requested scope exceeds grant".into(),
            ));
        }
        if !grant.permits(required) {
            return Err(OrchestratorError::PermissionDenied(
                "grant missing required scope".into(),
            ));
        }

        Ok(AuthenticatedCaller {
            service,
            merchant_id,
            granted_scopes: grant.scopes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scope_round_trips_every_variant() {
        for scope in [
            Scope::PaymentCreate,
            Scope::PaymentRead,
            Scope::PaymentUpdate,
            Scope::PaymentRefund,
            Scope::SubscriptionManage,
            Scope::PaymentMethodManage,
        ] {
            assert_eq!(parse_scope(scope.as_str()), Some(scope));
        }
    }

    #[test]
    fn parse_scope_rejects_unknown_strings() {
        assert_eq!(parse_scope("not_a_real_scope"), None);
    }
}
