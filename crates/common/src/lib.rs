use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub const BACKUP_SUFFIX: &str = ".bak";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Updated,
    SkippedAlreadyCorrect,
    SkippedFilteredOut,
    SkippedUnsupportedFormat,
    FailedPermission,
    FailedIo,
    FailedCodec,
}

impl Outcome {
    pub const ALL: [Outcome; 7] = [
        Outcome::Updated,
        Outcome::SkippedAlreadyCorrect,
        Outcome::SkippedFilteredOut,
        Outcome::SkippedUnsupportedFormat,
        Outcome::FailedPermission,
        Outcome::FailedIo,
        Outcome::FailedCodec,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Updated => "updated",
            Outcome::SkippedAlreadyCorrect => "skipped-already-correct",
            Outcome::SkippedFilteredOut => "skipped-filtered-out",
            Outcome::SkippedUnsupportedFormat => "skipped-unsupported-format",
            Outcome::FailedPermission => "failed-permission",
            Outcome::FailedIo => "failed-io",
            Outcome::FailedCodec => "failed-codec",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::FailedPermission | Outcome::FailedIo | Outcome::FailedCodec
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResult {
    pub path: PathBuf,
    pub outcome: Outcome,
    #[serde(default)]
    pub old_genre: Option<String>,
    #[serde(default)]
    pub new_genre: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub simulated: bool,
}

impl WorkResult {
    pub fn new(path: PathBuf, outcome: Outcome) -> Self {
        Self {
            path,
            outcome,
            old_genre: None,
            new_genre: None,
            detail: None,
            simulated: false,
        }
    }

    pub fn with_genres(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_genre = old;
        self.new_genre = new;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }
}

// A file sitting directly in `root` has no genre folder.
pub fn genre_segment(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = rel.components().filter(|c| matches!(c, Component::Normal(_)));
    let first = parts.next()?;
    parts.next()?;
    Some(first.as_os_str().to_string_lossy().to_string())
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

pub fn lowercase_extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_string_lossy().to_ascii_lowercase())
}
