//! Job orchestrator for asynchronous scrape jobs.
//!
//! `submit` records a PENDING job and returns immediately; a background task
//! waits for a concurrency permit, owns one browser session for the job and
//! publishes the outcome to the job store. `poll` reads the job store only.

use crate::egress;
use crate::error::{Result, ScrapeError};
use crate::output::{resolve_output_path, write_result};
use crate::progress::ProgressReporter;
use crate::scraper::Scraper;
use adscope_browser::{BrowserSession, SessionLauncher};
use adscope_core::{AppConfig, JobId, ScrapePhase, ScrapeProgress, ScrapeRequest, ScrapeResult};
use adscope_db::{scrape_jobs, Database, JobState, ScrapeJob};
use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// What a poller sees for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Job identifier
    pub job_id: String,
    /// Lifecycle state
    pub state: JobState,
    /// Human-readable description of `state`
    pub status: String,
    /// Latest progress, only while RUNNING
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ScrapeProgress>,
    /// Result document of a succeeded job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScrapeResult>,
    /// Where the result document was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Failure message of a failed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ScrapeJob> for JobStatus {
    fn from(job: ScrapeJob) -> Self {
        let progress = match job.state {
            JobState::Running => job.progress,
            _ => None,
        };
        Self {
            job_id: job.id,
            status: job.state.status_message().to_string(),
            state: job.state,
            progress,
            result: job.result,
            output_file: job.output_file,
            error: job.error_message,
        }
    }
}

/// Runs scrape jobs in the background, at most `max_concurrent_jobs` at a
/// time, each in its own browser session.
pub struct ScrapeOrchestrator<L: SessionLauncher> {
    launcher: Arc<L>,
    db: Database,
    scraper: Arc<Scraper>,
    output_dir: Arc<PathBuf>,
    permits: Arc<Semaphore>,
}

impl<L: SessionLauncher> Clone for ScrapeOrchestrator<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: Arc::clone(&self.launcher),
            db: self.db.clone(),
            scraper: Arc::clone(&self.scraper),
            output_dir: Arc::clone(&self.output_dir),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<L: SessionLauncher> ScrapeOrchestrator<L> {
    /// Create an orchestrator from its parts.
    pub fn new(
        launcher: L,
        db: Database,
        scraper: Scraper,
        output_dir: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            launcher: Arc::new(launcher),
            db,
            scraper: Arc::new(scraper),
            output_dir: Arc::new(output_dir),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Create an orchestrator wired from application configuration.
    ///
    /// # Errors
    /// Returns error if the output directory cannot be determined or the
    /// egress HTTP client cannot be created.
    pub fn from_config(launcher: L, db: Database, config: &AppConfig) -> Result<Self> {
        let egress = egress::from_config(&config.egress)?;
        Ok(Self::new(
            launcher,
            db,
            Scraper::new(config, egress),
            config.output_dir()?,
            config.jobs.max_concurrent_jobs,
        ))
    }

    /// Accept a scrape request and start it in the background.
    ///
    /// The returned id can be polled straight away; the job is PENDING until
    /// a concurrency permit frees up.
    ///
    /// # Errors
    /// Returns error if the job cannot be recorded.
    pub async fn submit(&self, request: ScrapeRequest) -> Result<JobId> {
        let job_id = JobId::generate();
        scrape_jobs::create_job(self.db.pool(), &job_id, &request).await?;
        tracing::info!(
            job_id = %job_id,
            url = request.target_url(),
            render_mode = ?request.render_mode(),
            "scrape job submitted"
        );

        let worker = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move { worker.run_job(id, request).await });

        Ok(job_id)
    }

    /// Current state of a job.
    ///
    /// # Errors
    /// Returns `ScrapeError::JobNotFound` for an unknown id.
    pub async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        scrape_jobs::get_job(self.db.pool(), job_id)
            .await?
            .map(JobStatus::from)
            .ok_or_else(|| ScrapeError::JobNotFound(job_id.to_string()))
    }

    /// Poll every `interval` until the job reaches a terminal state.
    ///
    /// # Errors
    /// Returns `ScrapeError::JobNotFound` for an unknown id.
    pub async fn wait_for(&self, job_id: &str, interval: Duration) -> Result<JobStatus> {
        loop {
            let status = self.poll(job_id).await?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Job store backing this orchestrator.
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run_job(self, job_id: JobId, request: ScrapeRequest) {
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            tracing::error!(job_id = %job_id, "job queue closed, job left pending");
            return;
        };

        // A panic inside the job must still mark it FAILED.
        let task = tokio::spawn({
            let worker = self.clone();
            let job_id = job_id.clone();
            async move { worker.execute(&job_id, &request).await }
        });

        let failure = match task.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => match e.try_into_panic() {
                Ok(payload) => panic_message(payload.as_ref()),
                Err(e) => format!("Job task was cancelled: {e}"),
            },
        };

        // Also reached when the job never left PENDING.
        tracing::error!(job_id = %job_id, "scrape job failed: {}", failure);
        if let Err(e) = scrape_jobs::mark_failed(self.db.pool(), job_id.as_str(), &failure).await {
            tracing::error!(job_id = %job_id, "could not record job failure: {}", e);
        }
    }

    async fn execute(&self, job_id: &JobId, request: &ScrapeRequest) -> Result<()> {
        let id = job_id.as_str();
        scrape_jobs::mark_running(self.db.pool(), id).await?;
        tracing::info!(job_id = id, "scrape job running");

        // One write in flight; updates made meanwhile collapse into the next.
        let (tx, mut rx) = watch::channel(ScrapeProgress::default());
        let forwarder = tokio::spawn({
            let pool = self.db.pool().clone();
            let id = id.to_string();
            async move {
                while rx.changed().await.is_ok() {
                    let progress = *rx.borrow_and_update();
                    if let Err(e) = scrape_jobs::update_progress(&pool, &id, &progress).await {
                        tracing::debug!(job_id = %id, "progress update dropped: {}", e);
                    }
                }
            }
        });
        let progress = ProgressReporter::new(tx);
        progress.phase(ScrapePhase::Launching);

        let session = self
            .launcher
            .launch(request.render_mode())
            .await
            .map_err(ScrapeError::Launch)?;

        let outcome = AssertUnwindSafe(self.scraper.run(&session, request, &progress))
            .catch_unwind()
            .await;
        if let Err(e) = session.close().await {
            tracing::warn!(job_id = id, "failed to close browser session: {}", e);
        }
        let result = match outcome {
            Ok(result) => result?,
            Err(payload) => std::panic::resume_unwind(payload),
        };

        progress.phase(ScrapePhase::Persisting);
        drop(progress);
        if let Err(e) = forwarder.await {
            tracing::debug!(job_id = id, "progress forwarder ended abnormally: {}", e);
        }

        let path = resolve_output_path(request.output_path(), &self.output_dir, job_id, Utc::now());
        let output_file = match write_result(&path, &result).await {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                tracing::error!(job_id = id, "result file not written: {}", e);
                None
            }
        };

        scrape_jobs::mark_succeeded(self.db.pool(), id, &result, output_file.as_deref()).await?;
        tracing::info!(
            job_id = id,
            records = result.total_ads_processed(),
            output_file = output_file.as_deref().unwrap_or("none"),
            "scrape job succeeded"
        );
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Job task panicked".to_string()
    }
}
