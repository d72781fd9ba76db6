//! Scrape job rows and their lifecycle.
//!
//! Every state change is a compare-and-set on the current state, so a
//! terminal job can never be moved again and a lost race leaves the row as
//! it was.

use crate::error::{DatabaseError, Result};
use adscope_core::{JobId, ScrapeProgress, ScrapeRequest, ScrapeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a scrape job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, waiting for a worker
    Pending,
    /// A worker owns the job
    Running,
    /// Finished with a result document
    Succeeded,
    /// Finished with an error message
    Failed,
}

impl JobState {
    /// Whether the job has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }

    /// Human-readable status reported by polling.
    #[must_use]
    pub fn status_message(self) -> &'static str {
        match self {
            Self::Pending => "Task is pending...",
            Self::Running => "Task is in progress...",
            Self::Succeeded => "Task completed successfully",
            Self::Failed => "Task failed",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(DatabaseError::Decode(format!(
                "invalid state '{other}' in scrape_jobs table"
            ))),
        }
    }
}

/// A scrape job as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// Job identifier (UUID v4)
    pub id: String,
    /// Page being scraped
    pub target_url: String,
    /// Whether the browser runs without a window
    pub headless: bool,
    /// Output path as submitted, before resolution
    pub requested_output: Option<String>,
    /// Current lifecycle state
    pub state: JobState,
    /// Latest progress snapshot while running
    pub progress: Option<ScrapeProgress>,
    /// Where the result document was written
    pub output_file: Option<String>,
    /// Result document of a succeeded job
    pub result: Option<ScrapeResult>,
    /// Error message of a failed job
    pub error_message: Option<String>,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = "SELECT id, target_url, headless, requested_output, state, progress,
        output_file, result, error_message, created_at, started_at, completed_at
 FROM scrape_jobs";

/// Insert a new PENDING job for `request`.
///
/// # Errors
/// Returns an error if the insert fails, including a duplicate `id`.
pub async fn create_job(
    pool: &SqlitePool,
    id: &JobId,
    request: &ScrapeRequest,
) -> Result<ScrapeJob> {
    let created_at = Utc::now();
    let requested_output = request
        .output_path()
        .map(|p| p.to_string_lossy().into_owned());
    let headless = request.render_mode().is_headless();

    sqlx::query(
        "INSERT INTO scrape_jobs (id, target_url, headless, requested_output, state, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(request.target_url())
    .bind(headless)
    .bind(&requested_output)
    .bind(JobState::Pending.as_str())
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(job_id = %id, "created scrape job");

    Ok(ScrapeJob {
        id: id.to_string(),
        target_url: request.target_url().to_string(),
        headless,
        requested_output,
        state: JobState::Pending,
        progress: None,
        output_file: None,
        result: None,
        error_message: None,
        created_at,
        started_at: None,
        completed_at: None,
    })
}

/// Fetch a job by id.
///
/// # Errors
/// Returns an error if the query fails or a column cannot be decoded.
pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<ScrapeJob>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| parse_job_row(&row)).transpose()
}

/// Jobs in `state`, oldest first.
///
/// # Errors
/// Returns an error if the query fails or a column cannot be decoded.
pub async fn list_jobs_in_state(pool: &SqlitePool, state: JobState) -> Result<Vec<ScrapeJob>> {
    let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE state = ? ORDER BY created_at ASC"))
        .bind(state.as_str())
        .fetch_all(pool)
        .await?;

    rows.iter().map(parse_job_row).collect()
}

/// Move a job from PENDING to RUNNING.
///
/// # Errors
/// Returns `DatabaseError::InvalidTransition` if the job is not PENDING, or
/// `NotFoundWithMessage` if it does not exist.
pub async fn mark_running(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE scrape_jobs SET state = ?, started_at = ? WHERE id = ? AND state = ?",
    )
    .bind(JobState::Running.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .bind(JobState::Pending.as_str())
    .execute(pool)
    .await?;

    ensure_transitioned(pool, id, result.rows_affected(), JobState::Running).await
}

/// Record progress for a RUNNING job.
///
/// Returns `false` without touching the row when the job is not RUNNING.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn update_progress(
    pool: &SqlitePool,
    id: &str,
    progress: &ScrapeProgress,
) -> Result<bool> {
    let progress_json = serde_json::to_string(progress)?;
    let result = sqlx::query("UPDATE scrape_jobs SET progress = ? WHERE id = ? AND state = ?")
        .bind(progress_json)
        .bind(id)
        .bind(JobState::Running.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a job from RUNNING to SUCCEEDED, storing its result document.
///
/// # Errors
/// Returns `DatabaseError::InvalidTransition` if the job is not RUNNING.
pub async fn mark_succeeded(
    pool: &SqlitePool,
    id: &str,
    result: &ScrapeResult,
    output_file: Option<&str>,
) -> Result<()> {
    let result_json = serde_json::to_string(result)?;
    let outcome = sqlx::query(
        "UPDATE scrape_jobs SET state = ?, result = ?, output_file = ?, completed_at = ?
         WHERE id = ? AND state = ?",
    )
    .bind(JobState::Succeeded.as_str())
    .bind(result_json)
    .bind(output_file)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .bind(JobState::Running.as_str())
    .execute(pool)
    .await?;

    ensure_transitioned(pool, id, outcome.rows_affected(), JobState::Succeeded).await
}

/// Move a job to FAILED with `error_message`.
///
/// A PENDING job can fail directly when its worker could not start it.
///
/// # Errors
/// Returns `DatabaseError::InvalidTransition` if the job is already terminal.
pub async fn mark_failed(pool: &SqlitePool, id: &str, error_message: &str) -> Result<()> {
    let outcome = sqlx::query(
        "UPDATE scrape_jobs SET state = ?, error_message = ?, completed_at = ?
         WHERE id = ? AND state IN (?, ?)",
    )
    .bind(JobState::Failed.as_str())
    .bind(error_message)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .bind(JobState::Pending.as_str())
    .bind(JobState::Running.as_str())
    .execute(pool)
    .await?;

    ensure_transitioned(pool, id, outcome.rows_affected(), JobState::Failed).await
}

/// Turn a zero-row compare-and-set into the matching error.
async fn ensure_transitioned(
    pool: &SqlitePool,
    id: &str,
    rows_affected: u64,
    to: JobState,
) -> Result<()> {
    if rows_affected > 0 {
        tracing::debug!(job_id = id, state = %to, "job state changed");
        return Ok(());
    }

    let current: Option<String> = sqlx::query_scalar("SELECT state FROM scrape_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match current {
        None => Err(DatabaseError::NotFoundWithMessage(format!(
            "Scrape job '{id}' not found"
        ))),
        Some(state) => Err(DatabaseError::InvalidTransition {
            job_id: id.to_string(),
            from: state.parse()?,
            to,
        }),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn parse_job_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScrapeJob> {
    let state: String = row.try_get("state")?;
    let created_at: String = row.try_get("created_at")?;

    let progress: Option<String> = row.try_get("progress")?;
    let progress = progress
        .as_deref()
        .map(serde_json::from_str::<ScrapeProgress>)
        .transpose()?;

    let result: Option<String> = row.try_get("result")?;
    let result = result
        .as_deref()
        .map(serde_json::from_str::<ScrapeResult>)
        .transpose()?;

    Ok(ScrapeJob {
        id: row.try_get("id")?,
        target_url: row.try_get("target_url")?,
        headless: row.try_get("headless")?,
        requested_output: row.try_get("requested_output")?,
        state: state.parse()?,
        progress,
        output_file: row.try_get("output_file")?,
        result,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp(&created_at)?,
        started_at: parse_optional_timestamp(row.try_get("started_at")?)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
    })
}
