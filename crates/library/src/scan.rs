use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use common::{lowercase_extension, Outcome, WorkResult};
use metadata::{ContainerFormat, FormatSupport, FormatTable};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::genre::{matching_root, resolve};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFile {
    pub path: PathBuf,
    // Deepest configured root containing `path`.
    pub root: PathBuf,
    pub format: ContainerFormat,
}

#[derive(Clone, Debug)]
pub enum ScanEntry {
    Candidate(AudioFile),
    Skipped(WorkResult),
}

pub struct Scanner<'a> {
    roots: &'a [PathBuf],
    formats: &'a FormatTable,
    genre_filter: Option<&'a str>,
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, walkdir::IntoIter)>,
    visited: HashSet<PathBuf>,
}

impl<'a> Scanner<'a> {
    pub fn new(roots: &'a [PathBuf], formats: &'a FormatTable, genre_filter: Option<&'a str>) -> Self {
        Self {
            roots,
            formats,
            genre_filter,
            pending: roots.iter().cloned().collect(),
            current: None,
            visited: HashSet::new(),
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            let Some((root, walker)) = self.current.as_mut() else {
                let root = self.pending.pop_front()?;
                if !root.is_dir() {
                    warn!("Directory not found, skipping: {}", root.display());
                    continue;
                }
                info!("Scanning {} ...", root.display());
                let walker = WalkDir::new(&root).follow_links(true).into_iter();
                self.current = Some((root, walker));
                continue;
            };

            let entry = match walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                let key = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
                if !self.visited.insert(key) {
                    debug!("Already visited {}, not re-entering", entry.path().display());
                    walker.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let root = root.clone();
            if let Some(item) = classify(
                self.formats,
                self.roots,
                self.genre_filter,
                &root,
                entry.into_path(),
            ) {
                return Some(item);
            }
        }
    }
}

fn classify(
    formats: &FormatTable,
    roots: &[PathBuf],
    genre_filter: Option<&str>,
    walked_root: &Path,
    path: PathBuf,
) -> Option<ScanEntry> {
    let entry = formats.classify(&path)?;

    if let Some(filter) = genre_filter {
        let label = resolve(&path, roots);
        if !label.as_ref().is_some_and(|label| label.matches_filter(filter)) {
            let result = WorkResult::new(path, Outcome::SkippedFilteredOut)
                .with_genres(None, label.map(|label| label.into_string()));
            return Some(ScanEntry::Skipped(result));
        }
    }

    if entry.support == FormatSupport::ReadOnly {
        let extension = lowercase_extension(&path).unwrap_or_default();
        let result = WorkResult::new(path, Outcome::SkippedUnsupportedFormat)
            .with_detail(format!(".{} format: genre tagging not supported", extension));
        return Some(ScanEntry::Skipped(result));
    }

    let root = matching_root(&path, roots).unwrap_or(walked_root).to_path_buf();
    Some(ScanEntry::Candidate(AudioFile {
        path,
        root,
        format: entry.format,
    }))
}
