//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{ApplicationService, GuardChain, OAuthService, TokenService};
use crate::config::Settings;
use crate::domain::UserDirectory;
use crate::infrastructure::repositories::Repositories;
use crate::infrastructure::{database, redis_store};
use crate::presentation::http::{routes, RoutePolicy};
use crate::presentation::websocket::{Gateway, InMemoryConnectionRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub applications: Arc<ApplicationService>,
    pub ledger: Arc<TokenService>,
    pub oauth: Arc<OAuthService>,
    pub guard: Arc<GuardChain>,
    pub route_policy: Arc<RoutePolicy>,
    pub gateway: Arc<Gateway>,
    pub users: Arc<dyn UserDirectory>,
    /// Rate limiting is disabled without Redis
    pub redis: Option<ConnectionManager>,
    /// Only used by the readiness check; services go through `Repositories`
    pub db: Option<PgPool>,
}

impl AppState {
    /// Wire every service from a set of repositories.
    pub fn new(settings: Settings, repositories: Repositories) -> Self {
        let oauth_settings = settings.oauth.clone();

        let applications = Arc::new(ApplicationService::new(
            repositories.applications.clone(),
            repositories.tokens.clone(),
            oauth_settings.clone(),
        ));
        let ledger = Arc::new(TokenService::new(
            repositories.applications.clone(),
            repositories.grants.clone(),
            repositories.tokens.clone(),
            repositories.users.clone(),
            oauth_settings,
        ));
        let oauth = Arc::new(OAuthService::new(
            repositories.applications.clone(),
            ledger.clone(),
        ));
        let guard = Arc::new(GuardChain::new(ledger.clone()));
        let gateway = Arc::new(Gateway::new(
            Arc::new(InMemoryConnectionRegistry::new()),
            applications.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            applications,
            ledger,
            oauth,
            guard,
            route_policy: Arc::new(RoutePolicy::standard()),
            gateway,
            users: repositories.users,
            redis: None,
            db: None,
        }
    }

    pub fn with_redis(mut self, redis: ConnectionManager) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn with_database(mut self, db: PgPool) -> Self {
        self.db = Some(db);
        self
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        crate::presentation::http::handlers::health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        let mut state = AppState::new(settings.clone(), Repositories::postgres(db.clone()))
            .with_database(db);

        // Redis backs rate limiting only
        match settings.redis.url.as_deref() {
            Some(url) => state = state.with_redis(redis_store::create_redis_client(url).await?),
            None => tracing::warn!("REDIS_URL not set; rate limiting disabled"),
        }

        spawn_housekeeping(
            state.ledger.clone(),
            Duration::from_secs(settings.oauth.cleanup_interval_secs),
        );

        let router = routes::create_router(state);

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Periodically purge expired authorization codes and token rows.
fn spawn_housekeeping(ledger: Arc<TokenService>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match ledger.purge_expired().await {
                Ok((grants, tokens)) => {
                    tracing::info!(grants, tokens, "Purged expired OAuth records")
                }
                Err(e) => tracing::error!(error = %e, "OAuth housekeeping failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
