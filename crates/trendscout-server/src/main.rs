//! trendscout API server: discovery triggers, trend queries, and the
//! dashboard, plus the cron scheduler that keeps discovery running.

mod api;
mod discovery;
mod middleware;
mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;
use trendscout_core::{load_app_config_from_env, Environment};
use trendscout_db::{connect_pool, run_migrations, PoolConfig};
use trendscout_sources::{shared, RateBudgetConfig, RateBudgetTracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(load_app_config_from_env()?);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(env = ?config.env, "starting trendscout server");

    let pool = connect_pool(&config.database_url, PoolConfig::from_app_config(&config)).await?;
    let applied = run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }

    // One tracker for the whole process: the scheduler and API triggers
    // draw on the same provider budgets.
    let budget = shared(RateBudgetTracker::new(
        RateBudgetConfig::standard(),
        Utc::now(),
    ));

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&config), Arc::clone(&budget)).await?;

    let auth =
        middleware::AuthState::from_env(matches!(config.env, Environment::Development))?;
    let state = api::AppState {
        pool,
        config: Arc::clone(&config),
        budget,
    };
    let app = api::build_app(state, auth, middleware::RateLimitState::standard());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
