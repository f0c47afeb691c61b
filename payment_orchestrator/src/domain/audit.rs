//! Append-only audit trail (spec §3). Retention-capped by the audit
//! cleanup sweeper (`jobs::audit_cleanup_sweeper`).

use chrono::{DateTime, Utc};
use common::AuditLogId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Actor {
    Service(common::ServiceId),
    Cron,
    System,
}

impl Actor {
    pub fn as_storage_string(&self) -> String {
        match self {
            Actor::Service(id) => id.to_string(),
            Actor::Cron => "cron".to_string(),
            Actor::System => "system".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub metadata: Value,
}
