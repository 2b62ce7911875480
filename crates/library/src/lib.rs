pub mod config;
pub mod decide;
pub mod genre;
pub mod mutate;
pub mod scan;
pub mod schedule;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::atomic::AtomicBool;

use metadata::{FormatTable, GenreCodec};
use tracing::info;

pub use config::{available_cores, GenreMatch, RunConfig, DEFAULT_BATCH_SIZE};
pub use genre::{label_under, normalize_genre, resolve, GenreLabel};
pub use scan::{AudioFile, ScanEntry, Scanner};
pub use schedule::{process_file, ProgressCounter, ProgressObserver, Scheduler};
pub use summary::{aggregate, FailedFile, Summary};

#[derive(Debug)]
pub enum EngineError {
    NoRoots,
    InvalidBatchSize,
    NoWorkers(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoRoots => write!(f, "no music directories configured"),
            EngineError::InvalidBatchSize => write!(f, "batch size must be at least 1"),
            EngineError::NoWorkers(err) => write!(f, "could not start any worker: {}", err),
        }
    }
}

impl std::error::Error for EngineError {}

pub struct Engine<'a> {
    config: &'a RunConfig,
    codec: &'a dyn GenreCodec,
    formats: FormatTable,
    progress: Option<&'a ProgressCounter>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a RunConfig, codec: &'a dyn GenreCodec) -> Self {
        Self {
            config,
            codec,
            formats: FormatTable::default(),
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressCounter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(&self) -> Result<Summary, EngineError> {
        self.config.validate()?;
        info!(
            "Genre tagging started (dry run: {}, backup: {})",
            self.config.dry_run, self.config.backup
        );
        if let Some(filter) = self.config.genre_filter() {
            info!("Only processing genres matching '{}'", filter);
        }

        let scanner = Scanner::new(&self.config.roots, &self.formats, self.config.genre_filter());
        let mut summary = Summary::new(self.config.dry_run);
        let stats = Scheduler::new(self.config, self.codec)
            .with_progress(self.progress)
            .with_cancel(self.cancel)
            .run(scanner, |results| {
                for result in results {
                    summary.record(result);
                }
            })?;

        summary.interrupted = stats.interrupted;
        summary.finish();
        summary.log_totals();
        Ok(summary)
    }
}
