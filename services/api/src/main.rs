use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{
    config::Settings, create_router, middleware::JwtVerifier, scheduler::start_expiry_job,
    state::AppState,
};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use exchange::Sweeper;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Swap API service");

    let settings = Settings::load()?;
    let policy = settings.exchange.policy()?;
    let jwt = JwtVerifier::from_settings(&settings.auth).map_err(anyhow::Error::msg)?;
    if jwt.is_none() {
        info!("No JWT key configured; trusting acting emails");
    }

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let app_state = AppState::new(pool, policy, jwt);

    let mut scheduler = start_expiry_job(
        Sweeper::new(app_state.engine.clone()),
        &settings.exchange.expiry_schedule,
    )
    .await?;

    // Start the web server
    let app = create_router(app_state);

    let addr = settings.server.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    info!("API service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
