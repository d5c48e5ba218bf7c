//! Periodic expiry of stale requests

use anyhow::Result;
use chrono::Utc;
use exchange::Sweeper;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Run the expiry sweep on a cron schedule.
///
/// `schedule` is a six-field cron expression with seconds. The returned
/// scheduler keeps running until it is shut down.
pub async fn start_expiry_job(sweeper: Sweeper, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let sweeper = sweeper.clone();
        Box::pin(async move {
            match sweeper.expire_stale(Utc::now()).await {
                Ok(expired) if expired.is_empty() => {}
                Ok(expired) => info!("Expiry job retired {} requests", expired.len()),
                Err(e) => error!("Expiry job failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started expiry scheduler with schedule: {}", schedule);
    Ok(scheduler)
}
