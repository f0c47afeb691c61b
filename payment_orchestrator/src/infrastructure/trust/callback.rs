//! Callback authentication (spec §4.5, §4.9): the gateway's browser-post
//! redirect carries a MAC over an ordered field concatenation; this
//! recomputes it with the per-merchant secret (from C3) and compares in
//! constant time, and separately checks the inbound TCP source IP
//! against the allowlist. Either failure must be indistinguishable to
//! the caller (spec §7 "do not leak which check failed").

use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::TrustRepository;
use crate::infrastructure::gateway_adapter::payload::compute_mac;

pub struct CallbackVerifier {
    trust: Arc<dyn TrustRepository>,
}

impl CallbackVerifier {
    pub fn new(trust: Arc<dyn TrustRepository>) -> Self {
        Self { trust }
    }

    /// `fields` must already be in the gateway's documented MAC order
    /// (spec §4.5 Open Question (b): ordering is gateway-defined; this
    /// adapter reuses the order `infrastructure::gateway_adapter::payload`
    /// builds outbound requests with).
    pub fn verify_mac(&self, mac_secret: &str, fields: &[(&str, &str)], received_mac: &str) -> bool {
        let expected = compute_mac(mac_secret, fields);
        expected.as_bytes().ct_eq(received_mac.as_bytes()).into()
    }

    pub async fn verify_source_ip(&self, source_ip: &str) -> Result<bool, OrchestratorError> {
        self.trust.is_ip_allowed(source_ip).await
    }

    /// Combined check used by the callback receiver: both the MAC and
    /// the source IP must pass. Never reveals which one failed.
    pub async fn verify(
        &self,
        mac_secret: &str,
        fields: &[(&str, &str)],
        received_mac: &str,
        source_ip: &str,
    ) -> Result<bool, OrchestratorError> {
        let mac_ok = self.verify_mac(mac_secret, fields, received_mac);
        let ip_ok = self.verify_source_ip(source_ip).await?;
        Ok(mac_ok && ip_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::IpAllowlistEntry;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeTrustRepo {
        allowed: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl TrustRepository for FakeTrustRepo {
        async fn blacklist_jti(
            &self,
            _entry: crate::domain::trust::JwtBlacklistEntry,
        ) -> Result<(), OrchestratorError> {
            Ok(())
        }
        async fn is_blacklisted(&self, _jti: &str) -> Result<bool, OrchestratorError> {
            Ok(false)
        }
        async fn sweep_expired_blacklist(
            &self,
            _now: chrono::DateTime<Utc>,
        ) -> Result<u64, OrchestratorError> {
            Ok(0)
        }
        async fn is_ip_allowed(&self, ip: &str) -> Result<bool, OrchestratorError> {
            Ok(self.allowed.lock().unwrap().contains(ip))
        }
        async fn add_allowed_ip(&self, entry: IpAllowlistEntry) -> Result<(), OrchestratorError> {
            self.allowed.lock().unwrap().insert(entry.ip);
            Ok(())
        }
    }

    fn repo_with(ips: &[&str]) -> Arc<FakeTrustRepo> {
        Arc::new(FakeTrustRepo {
            allowed: Mutex::new(ips.iter().map(|s| s.to_string()).collect()),
        })
    }

    #[tokio::test]
    async fn matching_mac_and_allowed_ip_passes() {
        let verifier = CallbackVerifier::new(repo_with(&["10.0.0.1"]));
        let fields = [("TRAN_NBR", "1"), ("RESP_CODE", "00")];
        let mac = compute_mac("secret", &fields);
        assert!(verifier
            .verify("secret", &fields, &mac, "10.0.0.1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn tampered_mac_fails_even_with_allowed_ip() {
        let verifier = CallbackVerifier::new(repo_with(&["10.0.0.1"]));
        let fields = [("TRAN_NBR", "1"), ("RESP_CODE", "00")];
        assert!(!verifier
            .verify("secret", &fields, "not-the-real-mac", "10.0.0.1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn disallowed_ip_fails_even_with_correct_mac() {
        let verifier = CallbackVerifier::new(repo_with(&["10.0.0.1"]));
        let fields = [("TRAN_NBR", "1"), ("RESP_CODE", "00")];
        let mac = compute_mac("secret", &fields);
        assert!(!verifier
            .verify("secret", &fields, &mac, "203.0.113.9")
            .await
            .unwrap());
    }
}
