//! Cron-endpoint authentication (spec §4.5, §6): time-driven endpoints
//! (billing, ACH verification, audit cleanup) are authenticated by a
//! shared secret, accepted as an `X-Cron-Secret` header, a `Bearer`
//! authorization header, or (discouraged — logged) a `secret` query
//! parameter for schedulers that cannot set headers.

use subtle::ConstantTimeEq;

pub struct CronCredentials<'a> {
    pub header: Option<&'a str>,
    pub authorization: Option<&'a str>,
    pub query_secret: Option<&'a str>,
}

fn matches(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// Returns `true` if any supplied credential matches the configured
/// cron secret. Logs (via `tracing`) when the match came from the
/// query-string fallback, since that form ends up in access logs.
pub fn verify_cron_secret(configured_secret: &str, credentials: CronCredentials<'_>) -> bool {
    if let Some(header) = credentials.header {
        if matches(configured_secret, header) {
            return true;
        }
    }
    if let Some(auth) = credentials.authorization {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            if matches(configured_secret, token) {
                return true;
            }
        }
    }
    if let Some(query) = credentials.query_secret {
        if matches(configured_secret, query) {
            tracing::warn!("cron request authenticated via query-string secret fallback");
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_match_succeeds() {
        let creds = CronCredentials {
            header: Some("s3cr3t"),
            authorization: None,
            query_secret: None,
        };
        assert!(verify_cron_secret("s3cr3t", creds));
    }

    #[test]
    fn bearer_token_match_succeeds() {
        let creds = CronCredentials {
            header: None,
            authorization: Some("Bearer s3cr3t"),
            query_secret: None,
        };
        assert!(verify_cron_secret("s3cr3t", creds));
    }

    #[test]
    fn query_fallback_match_succeeds() {
        let creds = CronCredentials {
            header: None,
            authorization: None,
            query_secret: Some("s3cr3t"),
        };
        assert!(verify_cron_secret("s3cr3t", creds));
    }

    #[test]
    fn no_matching_credential_fails() {
        let creds = CronCredentials {
            header: Some("wrong"),
            authorization: None,
            query_secret: None,
        };
        assert!(!verify_cron_secret("s3cr3t", creds));
    }
}
