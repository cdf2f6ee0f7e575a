// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Event publishing to the worker service over the shared Redis channel.
//!
//! Publishing is best effort from the handlers' point of view; a missing
//! cache simply means no events flow.

use crate::cache::KvCache;
use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Channel the worker service subscribes to.
const EVENTS_CHANNEL: &str = "kyros:events";

/// Kinds of event the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskCreated => "task_created",
            EventType::TaskUpdated => "task_updated",
        }
    }
}

/// Envelope published on the events channel.
#[derive(Debug, Serialize)]
struct Event<'a, T: Serialize> {
    id: String,
    project_id: String,
    event_type: &'a str,
    payload: &'a T,
    published_at: String,
}

/// Publishes gateway events for the worker pipeline.
#[derive(Clone)]
pub struct EventPublisher {
    cache: Option<KvCache>,
}

impl EventPublisher {
    pub fn new(cache: Option<KvCache>) -> Self {
        Self { cache }
    }

    /// Publish an event. A no-op without Redis.
    pub async fn publish<T: Serialize>(
        &self,
        project_id: Uuid,
        event_type: EventType,
        payload: &T,
    ) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let event = Event {
            id: format!("{}-{}", event_type.as_str(), Uuid::new_v4()),
            project_id: project_id.to_string(),
            event_type: event_type.as_str(),
            payload,
            published_at: Utc::now().to_rfc3339(),
        };
        let data = serde_json::to_string(&event)
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!("serialize event: {e}")))?;

        cache.publish(EVENTS_CHANNEL, &data).await?;
        Ok(())
    }
}
