//! Trust-layer persisted state (spec §3): blacklisted JWT ids and the
//! callback source-IP allowlist. The verification logic itself lives in
//! `infrastructure::trust` (C5); these are just the rows it reads and
//! writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtBlacklistEntry {
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAllowlistEntry {
    pub ip: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
