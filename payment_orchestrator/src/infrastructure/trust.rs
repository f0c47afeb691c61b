//! Trust layer (C5, spec §4.5): inbound RPC authentication (RS256 JWT,
//! `kid`-based key lookup, blacklist, scope+merchant grant check),
//! callback authentication (MAC + source-IP allowlist), rate limiting
//! (in-process `governor` absorbing most checks, `RateLimitRepository`
//! for cross-restart durability), and the cron-secret check shared by
//! every time-driven endpoint.

pub mod callback;
pub mod cron;
pub mod jwt;
pub mod rate_limiter;

pub use callback::CallbackVerifier;
pub use cron::verify_cron_secret;
pub use jwt::{AuthenticatedCaller, JwtAuthenticator};
pub use rate_limiter::RateLimiter;
