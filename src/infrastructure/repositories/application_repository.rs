//! Application Repository Implementation
//!
//! PostgreSQL implementation of the ApplicationRepository trait over the
//! `oauth_applications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Application, ApplicationEnvironment, ApplicationRepository, ApplicationStatus,
};
use crate::shared::error::{is_unique_violation, AppError};

const COLUMNS: &str = "id, developer_id, name, description, environment, client_id, \
     client_secret_hash, websocket_id, status, scopes, redirect_uris, rate_limit, \
     created_at, updated_at";

/// Unique index enforcing one application per developer and environment
const ENVIRONMENT_CONSTRAINT: &str = "idx_oauth_applications_developer_env";

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    developer_id: i64,
    name: String,
    description: Option<String>,
    environment: String,
    client_id: String,
    client_secret_hash: String,
    websocket_id: Uuid,
    status: String,
    scopes: Vec<String>,
    redirect_uris: Vec<String>,
    rate_limit: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_application(self) -> Result<Application, AppError> {
        let environment = ApplicationEnvironment::parse(&self.environment).ok_or_else(|| {
            AppError::Internal(format!("Unknown environment in row: {}", self.environment))
        })?;
        let status = ApplicationStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown status in row: {}", self.status)))?;

        Ok(Application {
            id: self.id,
            developer_id: self.developer_id,
            name: self.name,
            description: self.description,
            environment,
            client_id: self.client_id,
            client_secret_hash: self.client_secret_hash,
            websocket_id: self.websocket_id,
            status,
            scopes: self.scopes,
            redirect_uris: self.redirect_uris,
            rate_limit: self.rate_limit,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// PostgreSQL application repository implementation.
#[derive(Clone)]
pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, AppError> {
        let sql = format!("SELECT {} FROM oauth_applications WHERE id = $1", COLUMNS);
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ApplicationRow::into_application).transpose()
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, AppError> {
        let sql = format!("SELECT {} FROM oauth_applications WHERE client_id = $1", COLUMNS);
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ApplicationRow::into_application).transpose()
    }

    async fn find_by_websocket_id(&self, websocket_id: Uuid) -> Result<Option<Application>, AppError> {
        let sql = format!("SELECT {} FROM oauth_applications WHERE websocket_id = $1", COLUMNS);
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(websocket_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ApplicationRow::into_application).transpose()
    }

    async fn find_by_developer(&self, developer_id: i64) -> Result<Vec<Application>, AppError> {
        let sql = format!(
            "SELECT {} FROM oauth_applications WHERE developer_id = $1 ORDER BY created_at",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(developer_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ApplicationRow::into_application).collect()
    }

    async fn find_by_status(&self, status: ApplicationStatus) -> Result<Vec<Application>, AppError> {
        let sql = format!(
            "SELECT {} FROM oauth_applications WHERE status = $1 ORDER BY created_at",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ApplicationRow::into_application).collect()
    }

    async fn client_id_exists(&self, client_id: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM oauth_applications WHERE client_id = $1)",
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, app: &Application) -> Result<Application, AppError> {
        let sql = format!(
            r#"
            INSERT INTO oauth_applications (
                id, developer_id, name, description, environment, client_id,
                client_secret_hash, websocket_id, status, scopes, redirect_uris,
                rate_limit, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            COLUMNS
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(app.id)
            .bind(app.developer_id)
            .bind(&app.name)
            .bind(&app.description)
            .bind(app.environment.as_str())
            .bind(&app.client_id)
            .bind(&app.client_secret_hash)
            .bind(app.websocket_id)
            .bind(app.status.as_str())
            .bind(&app.scopes)
            .bind(&app.redirect_uris)
            .bind(app.rate_limit)
            .bind(app.created_at)
            .bind(app.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let on_environment = e
                    .as_database_error()
                    .and_then(|db| db.constraint())
                    .is_some_and(|c| c == ENVIRONMENT_CONSTRAINT);
                if is_unique_violation(&e) && on_environment {
                    AppError::Conflict(format!(
                        "Developer already has a {} application",
                        app.environment
                    ))
                } else {
                    AppError::Database(e)
                }
            })?;

        row.into_application()
    }

    async fn update(&self, app: &Application) -> Result<Application, AppError> {
        let sql = format!(
            r#"
            UPDATE oauth_applications
            SET name = $2, description = $3, scopes = $4, redirect_uris = $5,
                rate_limit = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(app.id)
            .bind(&app.name)
            .bind(&app.description)
            .bind(&app.scopes)
            .bind(&app.redirect_uris)
            .bind(app.rate_limit)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".into()))?;

        row.into_application()
    }

    async fn update_secret_hash(&self, id: Uuid, secret_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE oauth_applications SET client_secret_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(secret_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Application not found".into()));
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE oauth_applications SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Application not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM oauth_applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
