// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Optional Redis key-value cache.
//!
//! Backs sessions, OAuth state, the token denylist, WS admission tickets,
//! and pending MFA enrolments. The gateway holds `Option<KvCache>` and every
//! dependent feature degrades when it is absent.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Key prefixes shared by the services built on the cache.
pub mod keys {
    pub const SESSION: &str = "session:";
    pub const USER_SESSIONS: &str = "user_sessions:";
    pub const OAUTH_STATE: &str = "oauth_state:";
    pub const REVOKED_TOKEN: &str = "revoked:token:";
    pub const WS_TICKET: &str = "ws_ticket:";
    pub const MFA_SETUP: &str = "mfa_setup:";
}

/// Handle to the ephemeral key-value store.
#[derive(Clone)]
pub struct KvCache {
    conn: ConnectionManager,
}

impl KvCache {
    /// Connect and verify the server answers a PING.
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    pub async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_secs).await
    }

    /// Delete a key, reporting whether it existed. The atomicity of DEL is
    /// what makes OAuth state consumption single-use.
    pub async fn del(&self, key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.sadd(key, member).await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.srem(key, member).await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_secs).await
    }

    /// Remaining TTL in seconds; negative when the key is missing or
    /// has no expiry, mirroring the Redis TTL contract.
    pub async fn ttl(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.ttl(key).await
    }

    /// Publish a message on a pub/sub channel.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.publish(channel, message).await
    }

    /// Execute a MULTI/EXEC pipeline.
    pub async fn exec_atomic(&self, pipe: &redis::Pipeline) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
