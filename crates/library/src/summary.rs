use std::collections::BTreeMap;
use std::path::PathBuf;

use common::{Outcome, WorkResult};
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Summary {
    pub counts: BTreeMap<Outcome, usize>,
    pub failures: Vec<FailedFile>,
    pub dry_run: bool,
    pub interrupted: bool,
}

impl Summary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: WorkResult) {
        log_result(&result);
        *self.counts.entry(result.outcome).or_insert(0) += 1;
        if result.outcome.is_failure() {
            self.failures.push(FailedFile {
                reason: result
                    .detail
                    .unwrap_or_else(|| result.outcome.label().to_string()),
                path: result.path,
                outcome: result.outcome,
            });
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn finish(&mut self) {
        self.failures.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn log_totals(&self) {
        if self.total() == 0 {
            warn!("No audio files found under the configured directories");
        }
        let totals = Outcome::ALL
            .iter()
            .map(|outcome| format!("{}={}", outcome.label(), self.count(*outcome)))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Processed {} files: {}", self.total(), totals);
        if self.interrupted {
            warn!("Run interrupted; files not yet started were left untouched");
        }
        if self.dry_run {
            info!("Dry run complete. No files were modified.");
        } else {
            info!("Genre tagging complete.");
        }
    }
}

pub fn aggregate<I>(results: I, dry_run: bool) -> Summary
where
    I: IntoIterator<Item = WorkResult>,
{
    let mut summary = Summary::new(dry_run);
    for result in results {
        summary.record(result);
    }
    summary.finish();
    summary
}

fn log_result(result: &WorkResult) {
    let path = result.path.display();
    let detail = result.detail.as_deref().unwrap_or("unknown error");
    match result.outcome {
        Outcome::Updated => {
            let action = if result.simulated {
                "Would update genre"
            } else {
                "Updated genre"
            };
            info!(
                "{}: {} - '{}' → '{}'",
                action,
                path,
                result.old_genre.as_deref().unwrap_or("None"),
                result.new_genre.as_deref().unwrap_or("None")
            );
        }
        Outcome::SkippedAlreadyCorrect => debug!("Already correct: {}", path),
        Outcome::SkippedFilteredOut => debug!("Skipped (genre filter): {}", path),
        Outcome::SkippedUnsupportedFormat => warn!("Unsupported format for genre tagging: {}", path),
        Outcome::FailedPermission => error!("Permission error on {}: {}", path, detail),
        Outcome::FailedIo => error!("I/O error on {}: {}", path, detail),
        Outcome::FailedCodec => error!("Error updating {}: {}", path, detail),
    }
}
