//! Progress metadata published while a job is running.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the extraction routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapePhase {
    /// Starting the browser session
    #[default]
    Launching,
    /// Loading the target page
    Navigating,
    /// Scrolling until the list stops growing
    Paginating,
    /// Reading records
    Extracting,
    /// Writing the result document
    Persisting,
}

impl fmt::Display for ScrapePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Launching => "launching",
            Self::Navigating => "navigating",
            Self::Paginating => "paginating",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Snapshot of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrapeProgress {
    /// Current stage
    pub phase: ScrapePhase,
    /// Scroll iterations performed so far
    pub scroll_iterations: u32,
    /// Record containers discovered
    pub records_found: u64,
    /// Records extracted into the result
    pub records_processed: u64,
}

impl ScrapeProgress {
    /// Progress at the start of `phase`, keeping the counters.
    #[must_use]
    pub fn with_phase(self, phase: ScrapePhase) -> Self {
        Self { phase, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_json_shape() {
        let progress = ScrapeProgress {
            phase: ScrapePhase::Paginating,
            scroll_iterations: 12,
            records_found: 0,
            records_processed: 0,
        };
        let json = serde_json::to_value(progress).expect("serialize progress");
        assert_eq!(json["phase"], "paginating");
        assert_eq!(json["scroll_iterations"], 12);
    }

    #[test]
    fn test_with_phase_keeps_counters() {
        let progress = ScrapeProgress {
            records_found: 7,
            ..ScrapeProgress::default()
        }
        .with_phase(ScrapePhase::Extracting);
        assert_eq!(progress.phase, ScrapePhase::Extracting);
        assert_eq!(progress.records_found, 7);
    }
}
