//! Progress reporting from the extraction routine to the orchestrator.

use adscope_core::{ScrapePhase, ScrapeProgress};
use tokio::sync::watch;

/// Publishes [`ScrapeProgress`] snapshots through a watch channel.
///
/// The channel holds only the latest snapshot, so a slow reader sees
/// coalesced updates instead of a backlog. Publishing never fails the
/// caller, with or without a reader.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<ScrapeProgress>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ProgressReporter {
    pub fn new(tx: watch::Sender<ScrapeProgress>) -> Self {
        Self { tx }
    }

    /// A reporter that only tracks the latest snapshot.
    pub fn disabled() -> Self {
        let (tx, _) = watch::channel(ScrapeProgress::default());
        Self { tx }
    }

    pub fn phase(&self, phase: ScrapePhase) {
        self.update(|p| p.phase = phase);
    }

    pub fn scrolled(&self, iterations: u32) {
        self.update(|p| p.scroll_iterations = iterations);
    }

    pub fn found(&self, records: u64) {
        self.update(|p| p.records_found = records);
    }

    pub fn processed(&self, records: u64) {
        self.update(|p| p.records_processed = records);
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> ScrapeProgress {
        *self.tx.borrow()
    }

    fn update(&self, apply: impl FnOnce(&mut ScrapeProgress)) {
        self.tx.send_modify(apply);
    }
}
