//! Cron-driven discovery. One job, scheduled by `TRENDSCOUT_DISCOVERY_CRON`,
//! runs the same orchestration as the API trigger; the interval gate keeps
//! an aggressive schedule from over-calling the providers.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use trendscout_core::AppConfig;
use trendscout_sources::SharedBudget;

use crate::discovery::{run_discovery, DiscoveryOptions};

/// Builds and starts the scheduler. The returned handle must be kept alive
/// for the jobs to keep firing.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    budget: SharedBudget,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cron = config.discovery_cron.clone();
    let job_pool = pool.clone();
    let job_config = Arc::clone(&config);
    let job_budget = Arc::clone(&budget);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = job_pool.clone();
        let config = Arc::clone(&job_config);
        let budget = Arc::clone(&job_budget);
        Box::pin(async move {
            let options = DiscoveryOptions::new("scheduler", Utc::now());
            if let Err(err) = run_discovery(&pool, &config, &budget, options).await {
                tracing::error!(error = %err, "scheduled discovery pass failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron = %config.discovery_cron, "discovery scheduler started");

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_cron_expression_parses() {
        let job = Job::new_async("0 */30 * * * *", |_uuid, _lock| Box::pin(async {}));
        assert!(job.is_ok(), "default schedule must be a valid cron expression");
    }
}
