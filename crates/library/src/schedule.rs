use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

use common::{Outcome, WorkResult};
use metadata::GenreCodec;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::config::{available_cores, RunConfig};
use crate::decide::{decide, Decision};
use crate::genre::label_under;
use crate::mutate::apply;
use crate::scan::{AudioFile, ScanEntry};
use crate::EngineError;

#[derive(Clone, Debug)]
pub struct Batch {
    pub index: usize,
    pub files: Vec<AudioFile>,
}

#[derive(Debug)]
pub struct Batcher {
    size: usize,
    next_index: usize,
    pending: Vec<AudioFile>,
}

impl Batcher {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            next_index: 0,
            pending: Vec::with_capacity(size),
        }
    }

    pub fn push(&mut self, file: AudioFile) -> Option<Batch> {
        self.pending.push(file);
        if self.pending.len() >= self.size {
            self.take()
        } else {
            None
        }
    }

    pub fn finish(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            self.take()
        }
    }

    fn take(&mut self) -> Option<Batch> {
        let files = std::mem::replace(&mut self.pending, Vec::with_capacity(self.size));
        let index = self.next_index;
        self.next_index += 1;
        Some(Batch { index, files })
    }
}

pub trait ProgressObserver: Send + Sync {
    fn advanced(&self, completed: usize);
}

#[derive(Default)]
pub struct ProgressCounter {
    completed: AtomicUsize,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: impl ProgressObserver + 'static) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            observer: Some(Box::new(observer)),
        }
    }

    pub fn advance(&self, files: usize) -> usize {
        let completed = self.completed.fetch_add(files, Ordering::SeqCst) + files;
        if let Some(observer) = &self.observer {
            observer.advanced(completed);
        }
        completed
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub batches: usize,
    pub workers: usize,
    pub interrupted: bool,
}

pub struct Scheduler<'a> {
    config: &'a RunConfig,
    codec: &'a dyn GenreCodec,
    progress: Option<&'a ProgressCounter>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a RunConfig, codec: &'a dyn GenreCodec) -> Self {
        Self {
            config,
            codec,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressCounter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: Option<&'a AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run<I, F>(&self, entries: I, mut on_results: F) -> Result<ScheduleStats, EngineError>
    where
        I: IntoIterator<Item = ScanEntry>,
        F: FnMut(Vec<WorkResult>),
    {
        let limit = self.config.worker_limit();
        info!(
            "Using {} out of {} available CPU cores",
            limit,
            available_cores()
        );

        let mut entries = entries.into_iter();
        let mut batcher = Batcher::new(self.config.batch_size);
        let mut stats = ScheduleStats::default();

        // Cut up to `limit` batches before sizing the pool.
        let mut pending = VecDeque::with_capacity(limit);
        while pending.len() < limit {
            match self.next_batch(&mut entries, &mut batcher, &mut on_results) {
                Some(batch) => pending.push_back(batch),
                None => break,
            }
        }
        if pending.is_empty() {
            stats.interrupted = self.is_cancelled();
            return Ok(stats);
        }

        stats.workers = pending.len();
        let pool = ThreadPoolBuilder::new()
            .num_threads(stats.workers)
            .thread_name(|id| format!("genre-worker-{}", id))
            .build()
            .map_err(EngineError::NoWorkers)?;
        debug!("Started {} workers", stats.workers);

        let (result_tx, result_rx) = mpsc::channel::<Vec<WorkResult>>();
        let max_in_flight = stats.workers * 2;
        pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            loop {
                if self.is_cancelled() {
                    break;
                }
                let next = match pending.pop_front() {
                    Some(batch) => Some(batch),
                    None => self.next_batch(&mut entries, &mut batcher, &mut on_results),
                };
                let Some(batch) = next else {
                    break;
                };

                while in_flight >= max_in_flight {
                    match result_rx.recv() {
                        Ok(results) => {
                            in_flight -= 1;
                            self.deliver(results, &mut on_results);
                        }
                        Err(_) => break,
                    }
                }

                debug!("Dispatching batch {} ({} files)", batch.index, batch.files.len());
                stats.batches += 1;
                in_flight += 1;
                let results = result_tx.clone();
                scope.spawn(move |_| {
                    let _ = results.send(self.process_batch(batch));
                });

                while let Ok(results) = result_rx.try_recv() {
                    in_flight -= 1;
                    self.deliver(results, &mut on_results);
                }
            }

            drop(result_tx);
            for results in result_rx.iter() {
                self.deliver(results, &mut on_results);
            }
        });

        stats.interrupted = self.is_cancelled();
        Ok(stats)
    }

    // Pre-decided entries are reported on the caller's thread as they are met.
    fn next_batch<I, F>(&self, entries: &mut I, batcher: &mut Batcher, on_results: &mut F) -> Option<Batch>
    where
        I: Iterator<Item = ScanEntry>,
        F: FnMut(Vec<WorkResult>),
    {
        loop {
            if self.is_cancelled() {
                return None;
            }
            match entries.next() {
                Some(ScanEntry::Skipped(result)) => self.deliver(vec![result], on_results),
                Some(ScanEntry::Candidate(file)) => {
                    if let Some(batch) = batcher.push(file) {
                        return Some(batch);
                    }
                }
                None => return batcher.finish(),
            }
        }
    }

    fn process_batch(&self, batch: Batch) -> Vec<WorkResult> {
        let mut out = Vec::with_capacity(batch.files.len());
        for file in &batch.files {
            if self.is_cancelled() {
                break;
            }
            out.push(self.process_guarded(file));
        }
        out
    }

    // A panicking codec must not swallow the file's result.
    fn process_guarded(&self, file: &AudioFile) -> WorkResult {
        match panic::catch_unwind(AssertUnwindSafe(|| process_file(file, self.config, self.codec))) {
            Ok(result) => result,
            Err(_) => WorkResult::new(file.path.clone(), Outcome::FailedCodec)
                .with_detail("tag codec panicked while processing the file"),
        }
    }

    fn deliver<F: FnMut(Vec<WorkResult>)>(&self, results: Vec<WorkResult>, on_results: &mut F) {
        if let Some(progress) = self.progress {
            progress.advance(results.len());
        }
        on_results(results);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

pub fn process_file(file: &AudioFile, config: &RunConfig, codec: &dyn GenreCodec) -> WorkResult {
    let target = label_under(&file.root, &file.path);
    match decide(file, target.as_ref(), codec, config.genre_match) {
        Ok(Decision::Update { current, target }) => apply(file, current, &target, config, codec),
        Ok(Decision::Skip { outcome, current }) => WorkResult::new(file.path.clone(), outcome)
            .with_genres(current, target.map(|label| label.into_string())),
        Err(err) => {
            let outcome = if err.is_permission_denied() {
                Outcome::FailedPermission
            } else {
                Outcome::FailedCodec
            };
            WorkResult::new(file.path.clone(), outcome)
                .with_genres(None, target.map(|label| label.into_string()))
                .with_detail(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{audio_file, FileCodec};
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};

    fn files(root: &Path, count: usize) -> Vec<AudioFile> {
        (0..count)
            .map(|i| audio_file(root, &format!("Rock/Band/{:03}.flac", i), None))
            .collect()
    }

    #[test]
    fn batches_cover_every_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let all = files(dir.path(), 23);
        for size in [1, 2, 5, 22, 23, 24, 1000] {
            let mut batcher = Batcher::new(size);
            let mut batches = Vec::new();
            for file in all.iter().cloned() {
                batches.extend(batcher.push(file));
            }
            batches.extend(batcher.finish());

            assert!(batches.iter().all(|batch| batch.files.len() <= size));
            assert!(batches.iter().all(|batch| !batch.files.is_empty()));
            let indices: Vec<usize> = batches.iter().map(|batch| batch.index).collect();
            assert_eq!(indices, (0..batches.len()).collect::<Vec<_>>());
            let flattened: Vec<AudioFile> = batches.into_iter().flat_map(|batch| batch.files).collect();
            assert_eq!(flattened, all, "batch size {}", size);
        }
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut batcher = Batcher::new(0);
        let batch = batcher.push(files(dir.path(), 1).remove(0)).unwrap();
        assert_eq!(batch.files.len(), 1);
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn every_file_gets_one_result_across_workers() {
        let dir = tempfile::tempdir().unwrap();
        let all = files(dir.path(), 37);
        let codec = FileCodec::default();
        let progress = ProgressCounter::new();
        let mut config = RunConfig::new(vec![dir.path().to_path_buf()]);
        config.batch_size = 4;
        config.cpu_limit = Some(3);

        let mut seen = Vec::new();
        let stats = Scheduler::new(&config, &codec)
            .with_progress(Some(&progress))
            .run(all.iter().cloned().map(ScanEntry::Candidate), |results| {
                seen.extend(results)
            })
            .unwrap();

        assert_eq!(stats.batches, 10);
        assert!(stats.workers >= 1 && stats.workers <= 3);
        assert!(!stats.interrupted);
        assert_eq!(seen.len(), 37);
        let unique: HashSet<PathBuf> = seen.iter().map(|result| result.path.clone()).collect();
        assert_eq!(unique.len(), 37);
        assert!(seen.iter().all(|result| result.outcome == Outcome::Updated));
        assert_eq!(progress.completed(), 37);
    }

    #[test]
    fn pool_never_exceeds_batch_count() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FileCodec::default();
        let mut config = RunConfig::new(vec![dir.path().to_path_buf()]);
        config.batch_size = 1000;

        let stats = Scheduler::new(&config, &codec)
            .run(files(dir.path(), 3).into_iter().map(ScanEntry::Candidate), |_| {})
            .unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.workers, 1);
    }

    #[test]
    fn skipped_entries_bypass_workers() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FileCodec::default();
        let config = RunConfig::new(vec![dir.path().to_path_buf()]);
        let skipped = WorkResult::new(dir.path().join("Ambient/old.au"), Outcome::SkippedUnsupportedFormat);

        let progress = ProgressCounter::new();

        let mut seen = Vec::new();
        let stats = Scheduler::new(&config, &codec)
            .with_progress(Some(&progress))
            .run(vec![ScanEntry::Skipped(skipped.clone())], |results| seen.extend(results))
            .unwrap();
        assert_eq!(seen, vec![skipped]);
        assert_eq!(stats.workers, 0);
        assert_eq!(codec.reads(), 0);
        assert_eq!(progress.completed(), 1);
    }

    #[test]
    fn skipped_and_dispatched_files_share_progress() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FileCodec::default();
        let mut config = RunConfig::new(vec![dir.path().to_path_buf()]);
        config.batch_size = 2;
        config.cpu_limit = Some(2);
        let progress = ProgressCounter::new();

        let mut entries: Vec<ScanEntry> = files(dir.path(), 5).into_iter().map(ScanEntry::Candidate).collect();
        entries.insert(
            2,
            ScanEntry::Skipped(WorkResult::new(dir.path().join("Ambient/old.au"), Outcome::SkippedUnsupportedFormat)),
        );
        entries.push(ScanEntry::Skipped(WorkResult::new(
            dir.path().join("Rock/filtered.flac"),
            Outcome::SkippedFilteredOut,
        )));

        let mut seen = Vec::new();
        let stats = Scheduler::new(&config, &codec)
            .with_progress(Some(&progress))
            .run(entries, |results| seen.extend(results))
            .unwrap();
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.workers, config.worker_limit().min(3));
        assert_eq!(seen.len(), 7);
        assert_eq!(progress.completed(), 7);
        assert_eq!(codec.reads(), 5);
    }

    #[test]
    fn cancelled_run_stops_dispatching() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FileCodec::default();
        let config = RunConfig::new(vec![dir.path().to_path_buf()]);
        let cancel = AtomicBool::new(true);

        let mut seen = Vec::new();
        let stats = Scheduler::new(&config, &codec)
            .with_cancel(Some(&cancel))
            .run(files(dir.path(), 5).into_iter().map(ScanEntry::Candidate), |results| {
                seen.extend(results)
            })
            .unwrap();
        assert!(stats.interrupted);
        assert!(seen.is_empty());
        assert_eq!(codec.writes(), 0);
    }

    #[test]
    fn panicking_codec_yields_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let file = audio_file(dir.path(), "Rock/a.flac", Some("PANIC"));
        let other = audio_file(dir.path(), "Rock/b.flac", None);
        let codec = FileCodec::default();
        let mut config = RunConfig::new(vec![dir.path().to_path_buf()]);
        config.cpu_limit = Some(1);

        let mut seen = Vec::new();
        Scheduler::new(&config, &codec)
            .run(
                vec![ScanEntry::Candidate(file.clone()), ScanEntry::Candidate(other.clone())],
                |results| seen.extend(results),
            )
            .unwrap();
        seen.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].outcome, Outcome::FailedCodec);
        assert_eq!(seen[1].outcome, Outcome::Updated);
    }

    #[test]
    fn unreadable_tag_is_a_codec_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = audio_file(dir.path(), "Rock/a.flac", Some("CORRUPT"));
        let codec = FileCodec::default();
        let config = RunConfig::new(vec![dir.path().to_path_buf()]);

        let result = process_file(&file, &config, &codec);
        assert_eq!(result.outcome, Outcome::FailedCodec);
        assert_eq!(result.new_genre.as_deref(), Some("Rock"));
        assert_eq!(codec.writes(), 0);
    }
}
