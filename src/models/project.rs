//! Project and task models the gateway proxies to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Project owned by a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task within a project.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a project.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for creating a task.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// One of P0..P3; defaults to P2
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

impl CreateTaskRequest {
    /// Validate the optional priority enum by hand; `validator` has no
    /// option-aware oneof rule.
    pub fn priority_or_default(&self) -> Result<String, String> {
        match self.priority.as_deref() {
            None | Some("") => Ok("P2".to_string()),
            Some(p @ ("P0" | "P1" | "P2" | "P3")) => Ok(p.to_string()),
            Some(other) => Err(format!("invalid priority '{other}'")),
        }
    }
}

/// Project dashboard aggregate.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub project: Project,
    pub tasks: Vec<Task>,
    pub total_tasks: usize,
    pub completed_tasks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_defaults_to_p2() {
        let req = CreateTaskRequest {
            title: "t".into(),
            description: String::new(),
            priority: None,
            dependencies: None,
        };
        assert_eq!(req.priority_or_default().unwrap(), "P2");
    }

    #[test]
    fn test_priority_rejects_unknown() {
        let req = CreateTaskRequest {
            title: "t".into(),
            description: String::new(),
            priority: Some("P9".into()),
            dependencies: None,
        };
        assert!(req.priority_or_default().is_err());
    }
}
