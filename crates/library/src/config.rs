use std::path::PathBuf;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::genre::normalize_genre;
use crate::EngineError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreMatch {
    #[default]
    Exact,
    Normalized,
}

impl GenreMatch {
    pub fn is_satisfied(self, current: Option<&str>, target: &str) -> bool {
        match (self, current) {
            (_, None) => false,
            (GenreMatch::Exact, Some(current)) => current == target,
            (GenreMatch::Normalized, Some(current)) => normalize_genre(current) == target,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub roots: Vec<PathBuf>,
    pub dry_run: bool,
    pub backup: bool,
    pub genre_filter: Option<String>,
    pub batch_size: usize,
    pub cpu_limit: Option<usize>,
    pub progress: bool,
    pub genre_match: GenreMatch,
}

impl RunConfig {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            dry_run: false,
            backup: false,
            genre_filter: None,
            batch_size: DEFAULT_BATCH_SIZE,
            cpu_limit: None,
            progress: false,
            genre_match: GenreMatch::Exact,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.roots.is_empty() {
            return Err(EngineError::NoRoots);
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidBatchSize);
        }
        Ok(())
    }

    pub fn genre_filter(&self) -> Option<&str> {
        self.genre_filter
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn worker_limit(&self) -> usize {
        let available = available_cores();
        match self.cpu_limit {
            Some(limit) if limit > 0 => limit.min(available),
            _ => available,
        }
    }
}

pub fn available_cores() -> usize {
    thread::available_parallelism()
        .map(|value| value.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_case_sensitive() {
        let mode = GenreMatch::Exact;
        assert!(mode.is_satisfied(Some("Rock - Classic"), "Rock - Classic"));
        assert!(!mode.is_satisfied(Some("rock - classic"), "Rock - Classic"));
        assert!(!mode.is_satisfied(None, "Rock - Classic"));
    }

    #[test]
    fn normalized_match_ignores_spacing_and_case() {
        let mode = GenreMatch::Normalized;
        assert!(mode.is_satisfied(Some("  rock   -  classic "), "Rock - Classic"));
        assert!(!mode.is_satisfied(Some("Rock-Classic"), "Rock - Classic"));
    }

    #[test]
    fn worker_limit_respects_cpu_limit() {
        let mut config = RunConfig::new(vec![PathBuf::from("/music")]);
        assert_eq!(config.worker_limit(), available_cores());
        config.cpu_limit = Some(1);
        assert_eq!(config.worker_limit(), 1);
        config.cpu_limit = Some(0);
        assert_eq!(config.worker_limit(), available_cores());
        config.cpu_limit = Some(usize::MAX);
        assert_eq!(config.worker_limit(), available_cores());
    }

    #[test]
    fn validation_rejects_empty_setups() {
        let config = RunConfig::new(Vec::new());
        assert!(matches!(config.validate(), Err(EngineError::NoRoots)));

        let mut config = RunConfig::new(vec![PathBuf::from("/music")]);
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidBatchSize)));
    }

    #[test]
    fn blank_filter_is_ignored() {
        let mut config = RunConfig::new(vec![PathBuf::from("/music")]);
        config.genre_filter = Some("   ".to_string());
        assert_eq!(config.genre_filter(), None);
        config.genre_filter = Some(" Electronic ".to_string());
        assert_eq!(config.genre_filter(), Some("Electronic"));
    }
}
