//! Health Check Handlers
//!
//! - `GET /health` - process is up, with version
//! - `GET /health/live` - liveness check
//! - `GET /health/ready` - readiness check; 503 when the database is down

use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::infrastructure::{database, redis_store};
use crate::startup::AppState;

static STARTED: Lazy<(Instant, DateTime<Utc>)> = Lazy::new(|| (Instant::now(), Utc::now()));

/// Pin the uptime origin to process start rather than the first request.
pub fn init_server_start() {
    Lazy::force(&STARTED);
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayCheck {
    pub status: HealthStatus,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: DependencyCheck,
    pub redis: DependencyCheck,
    pub gateway: GatewayCheck,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub checks: ReadinessChecks,
}

pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION")),
    })
}

pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive",
        version: None,
    })
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db {
        Some(pool) => timed_check(database::ping(pool), 100).await,
        None => DependencyCheck::not_configured(),
    };
    let redis = match &state.redis {
        Some(conn) => timed_check(redis_store::ping(conn), 50).await,
        None => DependencyCheck::not_configured(),
    };

    let status = overall_status(&database, &redis);
    let (started, started_at) = *STARTED;
    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: started.elapsed().as_secs(),
        started_at,
        checks: ReadinessChecks {
            database,
            redis,
            gateway: GatewayCheck {
                status: HealthStatus::Healthy,
                connections: state.gateway.connection_count(),
            },
        },
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(response))
}

/// Time a ping; slower than `degraded_after_ms` counts as degraded.
async fn timed_check<E: std::fmt::Display>(
    ping: impl Future<Output = Result<(), E>>,
    degraded_after_ms: u64,
) -> DependencyCheck {
    let start = Instant::now();
    match ping.await {
        Ok(()) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            DependencyCheck {
                status: if latency_ms < degraded_after_ms {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                latency_ms: Some(latency_ms),
                message: None,
            }
        }
        Err(e) => DependencyCheck {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e.to_string()),
        },
    }
}

impl DependencyCheck {
    fn not_configured() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            message: Some("not configured".to_string()),
        }
    }
}

/// The database is required; Redis only backs rate limiting.
fn overall_status(database: &DependencyCheck, redis: &DependencyCheck) -> HealthStatus {
    match (database.status, redis.status) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}
