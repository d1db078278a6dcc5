//! Background driver for the queue, the reaper, discovery and retention.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Discovery, QueueCoordinator, StaleJobReaper};
use crate::config::{PipelineConfig, SchedulerConfig};
use crate::database::repositories::JobRepository;

/// Upper bound of jobs run per tick so shutdown is never starved.
const MAX_JOBS_PER_TICK: usize = 100;

pub struct PipelineScheduler {
    coordinator: Arc<QueueCoordinator>,
    reaper: Arc<StaleJobReaper>,
    discovery: Arc<Discovery>,
    jobs: Arc<dyn JobRepository>,
    config: SchedulerConfig,
    discovery_limit: usize,
    job_retention_days: u32,
}

impl PipelineScheduler {
    pub fn new(
        coordinator: Arc<QueueCoordinator>,
        reaper: Arc<StaleJobReaper>,
        discovery: Arc<Discovery>,
        jobs: Arc<dyn JobRepository>,
        config: SchedulerConfig,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            coordinator,
            reaper,
            discovery,
            jobs,
            config,
            discovery_limit: pipeline.discovery_limit,
            job_retention_days: pipeline.job_retention_days,
        }
    }

    /// Spawn one loop per duty. Every loop exits when `token` is cancelled.
    pub fn start(&self, token: CancellationToken) -> Vec<JoinHandle<()>> {
        if !self.config.enabled {
            info!("Pipeline scheduler disabled; queue is driven through the API only");
            return Vec::new();
        }

        let mut handles = Vec::new();

        let coordinator = self.coordinator.clone();
        handles.push(spawn_periodic(
            "queue",
            self.config.tick_interval,
            token.clone(),
            move || {
                let coordinator = coordinator.clone();
                async move {
                    match coordinator.drain(MAX_JOBS_PER_TICK).await {
                        Ok(0) => {}
                        Ok(n) => debug!(processed = n, "Queue tick finished"),
                        Err(e) => error!(error = %e, "Queue tick failed"),
                    }
                }
            },
        ));

        let reaper = self.reaper.clone();
        handles.push(spawn_periodic(
            "reaper",
            self.config.reap_interval,
            token.clone(),
            move || {
                let reaper = reaper.clone();
                async move {
                    if let Err(e) = reaper.sweep().await {
                        error!(error = %e, "Stale-job sweep failed");
                    }
                }
            },
        ));

        if let Some(interval) = self.config.discovery_interval {
            let discovery = self.discovery.clone();
            let limit = self.discovery_limit;
            handles.push(spawn_periodic("discovery", interval, token.clone(), move || {
                let discovery = discovery.clone();
                async move {
                    if let Err(e) = discovery.discover(limit).await {
                        error!(error = %e, "Scheduled discovery failed");
                    }
                }
            }));
        }

        let jobs = self.jobs.clone();
        let retention_days = self.job_retention_days;
        handles.push(spawn_periodic(
            "maintenance",
            self.config.maintenance_interval,
            token,
            move || {
                let jobs = jobs.clone();
                async move {
                    match jobs.cleanup_old_jobs(retention_days).await {
                        Ok(0) => {}
                        Ok(n) => info!(deleted = n, "Cleaned up old jobs"),
                        Err(e) => error!(error = %e, "Job cleanup failed"),
                    }
                }
            },
        ));

        info!(loops = handles.len(), "Pipeline scheduler started");
        handles
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task = name, "Scheduler loop stopping");
                    break;
                }
                _ = interval.tick() => {
                    // Finish the current run before honoring cancellation.
                    run().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_periodic_loop_stops_on_cancel() {
        let token = CancellationToken::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = counter.clone();

        let handle = spawn_periodic("test", Duration::from_millis(5), token.clone(), move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap();
        assert!(counter.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }
}
