// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Database layer (Postgres via sqlx).
//!
//! Thin typed queries only; business rules live in the handlers. `get_*`
//! return `Option` so callers can tell not-found from transport errors.

use crate::error::{AppError, Result};
use crate::models::{Project, Task, User};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Database handle wrapping the connection pool.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect with a pool sized for bursty gateway traffic.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = pool_options().connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Build a pool without connecting. Queries fail at call time if no
    /// server is reachable; used by tests that never touch the database.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = pool_options().connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ---- User queries ----

    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, active,
                               mfa_enabled, mfa_secret, backup_codes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.active)
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(&user.backup_codes)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, active,
                   mfa_enabled, mfa_secret, backup_codes, created_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Email lookup is case-insensitive; uniqueness is enforced the same way.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, active,
                   mfa_enabled, mfa_secret, backup_codes, created_at
            FROM users WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, active,
                   mfa_enabled, mfa_secret, backup_codes, created_at
            FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Persist the MFA state of a user in one statement. `backup_codes`
    /// holds bcrypt hashes of unspent codes; a consumed code is removed by
    /// rewriting the list.
    pub async fn update_user_mfa(
        &self,
        user_id: Uuid,
        enabled: bool,
        secret: Option<&str>,
        backup_codes: Option<&[String]>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET mfa_enabled = $2, mfa_secret = $3, backup_codes = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(enabled)
        .bind(secret)
        .bind(backup_codes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        Ok(())
    }

    // ---- Project queries ----

    pub async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, user_id, name, description, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.id)
        .bind(project.user_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.status)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_project_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, user_id, name, description, status, created_at, updated_at
            FROM projects WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    pub async fn list_projects(&self, user_id: Option<Uuid>) -> Result<Vec<Project>> {
        let projects = match user_id {
            Some(uid) => {
                sqlx::query_as::<_, Project>(
                    r#"
                    SELECT id, user_id, name, description, status, created_at, updated_at
                    FROM projects WHERE user_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(uid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Project>(
                    r#"
                    SELECT id, user_id, name, description, status, created_at, updated_at
                    FROM projects
                    ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(projects)
    }

    // ---- Task queries ----

    pub async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, project_id, title, description, priority, status,
                               dependencies, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id)
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.priority)
        .bind(&task.status)
        .bind(&task.dependencies)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_tasks_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, title, description, priority, status,
                   dependencies, created_at, updated_at
            FROM tasks WHERE project_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn count_completed_tasks(&self, project_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE project_id = $1 AND status = 'completed'",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Pool sized to survive bursty traffic; connections are health-checked
/// before being handed out.
fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .max_lifetime(Duration::from_secs(60 * 60))
        .idle_timeout(Duration::from_secs(30 * 60))
        .test_before_acquire(true)
}
