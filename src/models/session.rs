//! Server-side session record, stored as JSON in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated device binding, independent of bearer-token lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque 128-bit identifier, base64url
    pub id: String,
    pub user_id: Uuid,
    pub device_info: String,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
