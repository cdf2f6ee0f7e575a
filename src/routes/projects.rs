// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Project and task routes the gateway proxies to the store, plus the
//! admin provider snapshot.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::project::{
    CreateProjectRequest, CreateTaskRequest, DashboardResponse, Project, Task,
};
use crate::services::events::EventType;
use crate::AppState;

use super::auth::decode_and_validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", get(get_project))
        .route(
            "/projects/:id/tasks",
            get(list_tasks).post(create_task),
        )
        .route("/projects/:id/dashboard", get(get_dashboard))
        .route("/admin/providers", get(admin_providers))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidId)
}

/// The mutating project routes share their paths with public reads, so
/// identity is asserted here instead of via a route layer.
fn require_user(user: Option<Extension<CurrentUser>>) -> Result<crate::models::User> {
    user.map(|Extension(CurrentUser(u))| u)
        .ok_or(AppError::Unauthorized)
}

/// POST /projects
async fn create_project(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
    body: std::result::Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<Response> {
    let user = require_user(user)?;
    let req = decode_and_validate(body)?;

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        user_id: Some(user.id),
        name: req.name,
        description: req.description,
        status: "active".to_string(),
        created_at: now,
        updated_at: now,
    };
    state.db.create_project(&project).await?;

    Ok((StatusCode::CREATED, Json(project)).into_response())
}

/// GET /projects: scoped to the caller when authenticated.
async fn list_projects(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Response> {
    let user_id = user.map(|Extension(CurrentUser(u))| u.id);
    let projects = state.db.list_projects(user_id).await?;
    Ok(Json(projects).into_response())
}

/// GET /projects/:id
async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let project = state
        .db
        .get_project_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
    Ok(Json(project).into_response())
}

/// POST /projects/:id/tasks
async fn create_task(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Response> {
    require_user(user)?;
    let project_id = parse_id(&id)?;
    if state.db.get_project_by_id(project_id).await?.is_none() {
        return Err(AppError::NotFound("Project".to_string()));
    }

    let req = decode_and_validate(body)?;
    let priority = req.priority_or_default().map_err(AppError::Validation)?;

    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4(),
        project_id,
        title: req.title,
        description: req.description,
        priority,
        status: "queued".to_string(),
        dependencies: req.dependencies,
        created_at: now,
        updated_at: now,
    };
    state.db.create_task(&task).await?;

    // Notify the worker pipeline; the task is created either way.
    let payload = serde_json::json!({ "task_id": task.id, "title": task.title });
    if let Err(err) = state
        .events
        .publish(project_id, EventType::TaskCreated, &payload)
        .await
    {
        tracing::warn!(error = %err, "failed to publish task_created event");
    }

    Ok((StatusCode::CREATED, Json(task)).into_response())
}

/// GET /projects/:id/tasks
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let project_id = parse_id(&id)?;
    let tasks = state.db.list_tasks_by_project(project_id).await?;
    Ok(Json(tasks).into_response())
}

/// GET /projects/:id/dashboard
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
    Path(id): Path<String>,
) -> Result<Response> {
    require_user(user)?;
    let project_id = parse_id(&id)?;
    let project = state
        .db
        .get_project_by_id(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

    let tasks = state.db.list_tasks_by_project(project_id).await?;
    let completed_tasks = state.db.count_completed_tasks(project_id).await?;

    Ok(Json(DashboardResponse {
        project,
        total_tasks: tasks.len(),
        completed_tasks,
        tasks,
    })
    .into_response())
}

/// GET /admin/providers: OAuth provider configuration, never secrets.
async fn admin_providers(State(state): State<Arc<AppState>>) -> Response {
    Json(serde_json::json!({
        "providers": state.oauth.provider_snapshot(),
    }))
    .into_response()
}
