//! Pipeline orchestration for one job.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use crux_media::{generate_thumbnail, transcode_video, FfmpegRunner};
use crux_models::{JobId, JobStatus};
use futures::FutureExt;
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{JobLogger, Stage};
use crate::metrics;
use crate::publisher::{ArtifactPublisher, PublishedArtifacts};
use crate::staging::StagingDir;
use crate::status::StatusTracker;

/// Drives a staged job to exactly one terminal status.
#[derive(Clone)]
pub struct Orchestrator {
    config: WorkerConfig,
    runner: FfmpegRunner,
    publisher: ArtifactPublisher,
    tracker: StatusTracker,
}

impl Orchestrator {
    pub fn new(config: WorkerConfig, publisher: ArtifactPublisher, tracker: StatusTracker) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(path) = &config.ffmpeg_path {
            runner = runner.with_binary(path);
        }

        Self {
            config,
            runner,
            publisher,
            tracker,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn publisher(&self) -> &ArtifactPublisher {
        &self.publisher
    }

    /// Process the job, record its terminal status and release staging.
    ///
    /// Never fails and never unwinds: pipeline errors and panics both end
    /// in a terminal write.
    pub async fn run(&self, job_id: JobId, staging: StagingDir) -> JobStatus {
        let logger = JobLogger::new(job_id);
        let span = logger.span();

        async move {
            logger.started(staging.path());

            let outcome = AssertUnwindSafe(self.process(&logger, &staging))
                .catch_unwind()
                .await;

            let (update, failure) = match outcome {
                Ok(Ok(published)) => (published.into_update(), None),
                Ok(Err(e)) => (e.terminal_update(), Some(e.to_string())),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    let update = PipelineError::internal(message.as_str()).terminal_update();
                    (update, Some(format!("pipeline panicked: {}", message)))
                }
            };

            let status = update.status();
            // Errors are logged and counted by the tracker.
            let _ = self.tracker.finish(job_id, &update).await;
            if let Some(reason) = failure {
                logger.failed(&reason);
            }
            metrics::record_job_finished(status);
            logger.finished(status);

            staging.release();
            status
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        logger: &JobLogger,
        staging: &StagingDir,
    ) -> PipelineResult<PublishedArtifacts> {
        let runner = self.runner.clone().with_working_dir(staging.path());
        let normalized = staging.normalized_path();

        let started = Instant::now();
        transcode_video(
            &runner,
            staging.source_path(),
            &normalized,
            &self.config.profile,
            self.config.transcode_timeout,
        )
        .await?;
        metrics::record_transcode_duration(started.elapsed().as_secs_f64());
        logger.stage_done(Stage::Transcode, started.elapsed());

        let started = Instant::now();
        let thumbnail = staging.thumbnail_path();
        let thumbnail = match generate_thumbnail(
            &runner,
            &normalized,
            &thumbnail,
            &self.config.thumbnail_offset,
        )
        .await
        {
            Ok(()) => {
                logger.stage_done(Stage::Thumbnail, started.elapsed());
                Some(thumbnail)
            }
            Err(e) => {
                logger.fallback(Stage::Thumbnail, &e);
                metrics::record_thumbnail_fallback();
                None
            }
        };

        let started = Instant::now();
        let published = self
            .publisher
            .publish(&normalized, thumbnail.as_deref())
            .await?;
        logger.stage_done(Stage::Publish, started.elapsed());
        Ok(published)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use crux_db::{DbResult, JobStore, MemoryJobStore};
    use crux_models::{ClimbMetadata, Job, NewJob, TerminalUpdate};
    use crux_storage::MemoryObjectStore;
    use tempfile::TempDir;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    type Trail = Arc<Mutex<Vec<String>>>;

    /// Records terminal writes into a shared trail.
    struct TrailStore {
        inner: MemoryJobStore,
        trail: Trail,
    }

    #[async_trait]
    impl JobStore for TrailStore {
        async fn create(&self, new_job: NewJob) -> DbResult<Job> {
            self.inner.create(new_job).await
        }
        async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
            self.inner.get(id).await
        }
        async fn list(&self, owner: Option<&str>) -> DbResult<Vec<Job>> {
            self.inner.list(owner).await
        }
        async fn transition(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job> {
            let job = self.inner.transition(id, update).await?;
            self.trail.lock().unwrap().push(format!("write {}", job.status));
            Ok(job)
        }
        async fn delete(&self, id: JobId) -> DbResult<Job> {
            self.inner.delete(id).await
        }
        async fn list_processing_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Job>> {
            self.inner.list_processing_before(cutoff).await
        }
        async fn list_tags(&self) -> DbResult<Vec<String>> {
            self.inner.list_tags().await
        }
        async fn ping(&self) -> DbResult<()> {
            self.inner.ping().await
        }
    }

    /// Records error-level log messages into the same trail.
    struct ErrorTrail(Trail);

    struct MessageVisitor(Option<String>);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for ErrorTrail {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                let mut visitor = MessageVisitor(None);
                event.record(&mut visitor);
                if let Some(message) = visitor.0 {
                    self.0.lock().unwrap().push(format!("log {}", message));
                }
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failure_is_recorded_before_it_is_logged() {
        let trail: Trail = Arc::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(ErrorTrail(trail.clone())),
        );

        let work = TempDir::new().unwrap();
        let store = Arc::new(TrailStore {
            inner: MemoryJobStore::new(),
            trail: trail.clone(),
        });
        let job = store
            .create(NewJob::new(ClimbMetadata::new("climber-1", "Warm up")))
            .await
            .unwrap();

        let config = WorkerConfig::default()
            .with_work_dir(work.path())
            .with_ffmpeg_path("/nonexistent/bin/ffmpeg");
        let orchestrator = Orchestrator::new(
            config,
            ArtifactPublisher::new(Arc::new(MemoryObjectStore::default())),
            StatusTracker::new(store.clone()),
        );

        let staging = StagingDir::create(work.path(), job.id, Some("clip.mp4"))
            .await
            .unwrap();
        staging.write_source(b"raw").await.unwrap();

        let status = orchestrator.run(job.id, staging).await;
        assert_eq!(status, JobStatus::Failed);

        let trail = trail.lock().unwrap();
        let write = trail.iter().position(|e| e == "write failed").unwrap();
        let log = trail
            .iter()
            .position(|e| e.starts_with("log Job failed"))
            .unwrap();
        assert!(write < log, "unexpected order: {:?}", *trail);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("kaput"));
        assert_eq!(panic_message(boxed.as_ref()), "kaput");

        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
