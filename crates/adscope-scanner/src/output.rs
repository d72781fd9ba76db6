//! Result file persistence.

use crate::error::{Result, ScrapeError};
use adscope_core::{JobId, ScrapeResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Where a job's result file goes. A requested relative path is placed under
/// `output_dir`; without a request the file name is timestamped.
pub fn resolve_output_path(
    requested: Option<&Path>,
    output_dir: &Path,
    job_id: &JobId,
    now: DateTime<Utc>,
) -> PathBuf {
    match requested {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => output_dir.join(path),
        None => output_dir.join(format!(
            "ads_data_{}_{}.json",
            now.format("%Y%m%d_%H%M%S"),
            job_id.short()
        )),
    }
}

/// Write `result` as pretty-printed JSON, creating parent directories.
///
/// # Errors
/// Returns `ScrapeError::Output` if the file cannot be written.
pub async fn write_result(path: &Path, result: &ScrapeResult) -> Result<()> {
    let json = result.to_json_pretty()?;
    let io_err = |source| ScrapeError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, json).await.map_err(io_err)?;

    tracing::info!(
        path = %path.display(),
        records = result.total_ads_processed(),
        "result written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_core::AdRecord;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn job_id() -> JobId {
        JobId::new("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap()
    }

    #[test]
    fn test_default_path_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 14, 3, 9).unwrap();
        let path = resolve_output_path(None, Path::new("/data/out"), &job_id(), now);
        assert_eq!(
            path,
            PathBuf::from(format!(
                "/data/out/ads_data_20240105_140309_{}.json",
                job_id().short()
            ))
        );
    }

    #[test]
    fn test_requested_path_wins() {
        let absolute = resolve_output_path(
            Some(Path::new("/tmp/nike.json")),
            Path::new("/data/out"),
            &job_id(),
            Utc::now(),
        );
        assert_eq!(absolute, PathBuf::from("/tmp/nike.json"));

        let relative = resolve_output_path(
            Some(Path::new("results/nike.json")),
            Path::new("/data/out"),
            &job_id(),
            Utc::now(),
        );
        assert_eq!(relative, PathBuf::from("/data/out/results/nike.json"));
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/result.json");
        let result = ScrapeResult::from_records(
            vec![AdRecord::new("123")],
            1,
            Duration::from_secs(2),
            "203.0.113.7",
            "203.0.113.7",
        );

        write_result(&path, &result).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["total_ads_processed"], 1);
        assert!(written["ads_data"]["123"]["ad_text"].is_null());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_output_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_result(&blocker.join("result.json"), &ScrapeResult::new("unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Output { .. }));
    }
}
