//! Retry bounds and stale-job recovery through the service container.

mod common;

use std::time::Duration;

use common::{fast_pipeline_config, harness, harness_with};
use trend_scout::config::PipelineConfig;
use trend_scout::database::models::{JobStatus, JobType};
use trend_scout::pipeline::TickOutcome;

#[tokio::test]
async fn test_failing_fetch_is_retried_until_max_attempts() {
    let h = harness().await;
    // Discoverable but the resolver knows nothing about it.
    h.trending
        .drafts
        .lock()
        .unwrap()
        .push(common::draft("broken"));
    h.services.discovery.discover(5).await.unwrap();

    let mut statuses = Vec::new();
    while let TickOutcome::Processed(outcome) = h.services.coordinator.process_next().await.unwrap()
    {
        assert!(!outcome.success);
        statuses.push(outcome.status);
    }
    assert_eq!(
        statuses,
        vec![
            Some(JobStatus::Pending),
            Some(JobStatus::Pending),
            Some(JobStatus::Failed),
        ]
    );

    let jobs = h
        .services
        .jobs
        .list_jobs_for_candidate("broken")
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].attempts, 3);
    assert_eq!(jobs[0].status, "failed");
    assert!(jobs[0].error_message.as_deref().unwrap().contains("404"));

    let row = h.services.candidates.get_candidate("broken").await.unwrap();
    assert_eq!(row.processing_status, "failed");
}

#[tokio::test]
async fn test_drain_runs_the_whole_chain() {
    let h = harness().await;
    h.video_post("1");
    h.video_post("2");
    h.services.discovery.discover(5).await.unwrap();

    let processed = h.services.coordinator.drain(100).await.unwrap();
    // fetch + analyze + translate per candidate
    assert_eq!(processed, 6);

    let counts = h.services.jobs.count_by_status().await.unwrap();
    assert_eq!(counts.completed, 6);
}

#[tokio::test]
async fn test_drain_stops_at_limit() {
    let h = harness().await;
    h.video_post("1");
    h.services.discovery.discover(5).await.unwrap();

    assert_eq!(h.services.coordinator.drain(1).await.unwrap(), 1);
    let counts = h.services.jobs.count_by_status().await.unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending, 1);
}

#[tokio::test]
async fn test_reaper_fails_abandoned_fetch_and_candidate() {
    let config = PipelineConfig {
        stale_job_timeout: Duration::ZERO,
        ..fast_pipeline_config()
    };
    let h = harness_with(config).await;
    h.video_post("123");
    h.services.discovery.discover(5).await.unwrap();

    // Simulate a worker that claimed the job and died mid-fetch.
    let job = h
        .services
        .jobs
        .claim_next_pending_job()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.kind().unwrap(), JobType::Fetch);
    h.services.candidates.mark_processing("123").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = h.services.reaper.sweep().await.unwrap();
    assert_eq!(report.cleaned, 1);
    assert_eq!(report.videos, vec!["123".to_string()]);

    let job = h.services.jobs.get_job(job.id).await.unwrap();
    assert_eq!(job.status, "failed");
    assert!(job.error_message.unwrap().contains("timed out"));

    let row = h.services.candidates.get_candidate("123").await.unwrap();
    assert_eq!(row.processing_status, "failed");

    // Nothing left to reap.
    let report = h.services.reaper.sweep().await.unwrap();
    assert_eq!(report.cleaned, 0);
    assert!(report.videos.is_empty());
}

#[tokio::test]
async fn test_reaper_leaves_fresh_jobs_alone() {
    let h = harness().await;
    h.video_post("123");
    h.services.discovery.discover(5).await.unwrap();
    h.services.jobs.claim_next_pending_job().await.unwrap();

    let report = h.services.reaper.sweep().await.unwrap();
    assert_eq!(report.cleaned, 0);

    let counts = h.services.jobs.count_by_status().await.unwrap();
    assert_eq!(counts.processing, 1);
}

#[tokio::test]
async fn test_background_scheduler_stops_on_shutdown() {
    let h = harness().await;
    h.services.start_background().await;
    h.services
        .shutdown_with_timeout(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(h.services.cancellation_token().is_cancelled());
}
