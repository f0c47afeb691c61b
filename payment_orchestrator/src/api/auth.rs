//! Bearer-token authentication glue between axum's `HeaderMap` and C5's
//! `JwtAuthenticator`/`RateLimiter` (spec §4.5). A plain async function
//! rather than a custom extractor: required scopes differ per route, so
//! the handler passes them in rather than the framework inferring them.

use axum::http::HeaderMap;
use common::MerchantId;

use crate::domain::error::OrchestratorError;
use crate::domain::rate_limit::RateLimitBucketKey;
use crate::domain::service::Scope;
use crate::infrastructure::trust::cron::{verify_cron_secret, CronCredentials};
use crate::infrastructure::trust::{AuthenticatedCaller, JwtAuthenticator, RateLimiter};

use super::error::ApiError;

fn bearer_token(headers: &HeaderMap) -> Result<&str, OrchestratorError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(OrchestratorError::Unauthenticated)
}

/// Merchant/service provisioning (`RegisterMerchant`, `CreateService`,
/// ...) has no merchant grant to check against — the grant doesn't
/// exist until after these calls run — so it is authenticated the same
/// way the cron endpoints are: a shared operator secret, never the
/// per-merchant JWT path. Reuses `verify_cron_secret`'s header/bearer/
/// query matching since the check is identical in shape, just against
/// a different configured value.
pub fn authenticate_admin(configured_secret: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let header = headers
        .get("X-Admin-Secret")
        .and_then(|v| v.to_str().ok());
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let credentials = CronCredentials {
        header,
        authorization,
        query_secret: None,
    };
    if verify_cron_secret(configured_secret, credentials) {
        Ok(())
    } else {
        Err(OrchestratorError::Unauthenticated.into())
    }
}

/// Verifies the caller's bearer token against `required` scopes and
/// against the merchant named in the request path, then debits the
/// caller's rate-limit bucket. Both checks share one opaque failure
/// mode from the caller's point of view (401 or 429), but the order
/// matters: an unauthenticated caller never gets to consume quota meant
/// for a legitimate one.
///
/// The token's own `merchant_id` claim is what `JwtAuthenticator`
/// checks the scope grant against (spec §4.5), but a handler's URL
/// path names its own merchant id independently — without comparing
/// the two, a service holding a valid grant for merchant A could quote
/// merchant B's id in the path and operate on B's data using a token
/// that was only ever authorized for A.
pub async fn authenticate(
    jwt: &JwtAuthenticator,
    rate_limiter: &RateLimiter,
    headers: &HeaderMap,
    required: &[Scope],
    merchant_id: MerchantId,
) -> Result<AuthenticatedCaller, ApiError> {
    let token = bearer_token(headers)?;
    let caller = jwt.authenticate(token, required).await?;
    if caller.merchant_id != merchant_id {
        return Err(OrchestratorError::PermissionDenied(
            "token not granted for this merchant".into(),
        )
        .into());
    }

    let key = RateLimitBucketKey {
        service_id: caller.service.id,
        merchant_id: Some(caller.merchant_id),
    };
    let allowed = rate_limiter
        .check(
            &key,
            caller.service.rate_limit_burst,
            caller.service.rate_limit_per_second,
        )
        .await?;
    if !allowed {
        return Err(OrchestratorError::ResourceExhausted(
            "rate limit exceeded".into(),
        )
        .into());
    }

    Ok(caller)
}
