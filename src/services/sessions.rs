// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Redis-backed session registry.
//!
//! Two key shapes: `session:<sid>` holds the JSON session record and
//! `user_sessions:<uid>` is the set of a user's session ids. Both carry the
//! configured session TTL.

use crate::cache::{keys, KvCache};
use crate::error::{AppError, Result};
use crate::models::Session;
use crate::services::crypto::generate_state;
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Session id entropy: 128 bits, base64url.
const SESSION_ID_BYTES: usize = 16;

/// Creates, enumerates, and revokes server-side sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    cache: KvCache,
    ttl_secs: i64,
}

impl SessionRegistry {
    pub fn new(cache: KvCache, ttl_secs: i64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Create a session and index it under the user, atomically.
    pub async fn create(
        &self,
        user_id: Uuid,
        device_info: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: generate_state(SESSION_ID_BYTES)?,
            user_id,
            device_info: device_info.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            created_at: now,
            last_active: now,
            expires_at: now + Duration::seconds(self.ttl_secs),
        };

        let json = serde_json::to_string(&session)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize session: {e}")))?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(session_key(&session.id), &json, self.ttl_secs as u64)
            .ignore()
            .sadd(user_key(user_id), &session.id)
            .ignore()
            .expire(user_key(user_id), self.ttl_secs)
            .ignore();
        self.cache.exec_atomic(&pipe).await?;

        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(json) = self.cache.get(&session_key(session_id)).await? else {
            return Ok(None);
        };
        let session = serde_json::from_str(&json)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("deserialize session: {e}")))?;
        Ok(Some(session))
    }

    /// Update last-active, preserving the remaining TTL. Races between
    /// concurrent touches resolve as last-writer-wins.
    pub async fn touch(&self, session_id: &str) -> Result<()> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(());
        };
        session.last_active = Utc::now();

        let remaining = self.cache.ttl(&session_key(session_id)).await?;
        if remaining <= 0 {
            return Ok(()); // expired under us
        }

        let json = serde_json::to_string(&session)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize session: {e}")))?;
        self.cache
            .set_ex(&session_key(session_id), &json, remaining as u64)
            .await?;
        Ok(())
    }

    /// List a user's live sessions, pruning ids whose session has expired.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let ids = self.cache.smembers(&user_key(user_id)).await?;

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {
                    // Stale index entry; drop it.
                    self.cache.srem(&user_key(user_id), &id).await?;
                }
                Err(err) => {
                    tracing::warn!(session_id = %id, error = %err, "skipping unreadable session");
                }
            }
        }

        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(sessions)
    }

    /// Delete one session and its index entry atomically.
    pub async fn revoke(&self, session_id: &str, user_id: Uuid) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(session_key(session_id))
            .ignore()
            .srem(user_key(user_id), session_id)
            .ignore();
        self.cache.exec_atomic(&pipe).await?;
        Ok(())
    }

    /// Revoke every session except `keep_sid` (the caller's current device).
    pub async fn revoke_all_except(&self, user_id: Uuid, keep_sid: &str) -> Result<()> {
        let ids = self.cache.smembers(&user_key(user_id)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in ids.iter().filter(|id| id.as_str() != keep_sid) {
            pipe.del(session_key(id)).ignore();
            pipe.srem(user_key(user_id), id).ignore();
        }
        self.cache.exec_atomic(&pipe).await?;
        Ok(())
    }

    /// Revoke every session and the index set itself.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<()> {
        let ids = self.cache.smembers(&user_key(user_id)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            pipe.del(session_key(id)).ignore();
        }
        pipe.del(user_key(user_id)).ignore();
        self.cache.exec_atomic(&pipe).await?;
        Ok(())
    }
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", keys::SESSION, session_id)
}

fn user_key(user_id: Uuid) -> String {
    format!("{}{}", keys::USER_SESSIONS, user_id)
}
