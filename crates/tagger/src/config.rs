use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use library::{GenreMatch, RunConfig, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "GENRE_TAGGER_CONFIG";
const CONFIG_FILE_NAME: &str = "genre-tagger.yaml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub music_base: String,
    pub managed: String,
    pub unmanaged: String,
    pub additional: Vec<String>,
    pub cpu_limit: usize,
    pub dry_run: bool,
    pub backup: bool,
    pub genre: String,
    pub batch_size: usize,
    pub verbose: bool,
    pub log_file: String,
    pub progress: bool,
    pub genre_match: GenreMatch,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            music_base: ".".to_string(),
            managed: String::new(),
            unmanaged: String::new(),
            additional: Vec::new(),
            cpu_limit: 0,
            dry_run: false,
            backup: false,
            genre: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            verbose: false,
            log_file: "genre_tagging.log".to_string(),
            progress: true,
            genre_match: GenreMatch::Exact,
        }
    }
}

impl TaggerConfig {
    pub fn roots(&self) -> Vec<PathBuf> {
        let base = PathBuf::from(self.music_base.trim());
        let mut roots = vec![
            or_default(&self.managed, || base.join("Managed")),
            or_default(&self.unmanaged, || base.join("Unmanaged")),
        ];
        roots.extend(
            self.additional
                .iter()
                .map(|dir| dir.trim())
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        );
        roots
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.roots());
        config.dry_run = self.dry_run;
        config.backup = self.backup;
        config.genre_filter = Some(self.genre.clone()).filter(|genre| !genre.trim().is_empty());
        config.batch_size = self.batch_size;
        config.cpu_limit = Some(self.cpu_limit).filter(|limit| *limit > 0);
        config.progress = self.progress;
        config.genre_match = self.genre_match;
        config
    }

    // Relative paths in a config file are taken relative to the file itself.
    fn resolve_paths(&mut self, config_path: &Path) {
        for value in [
            &mut self.music_base,
            &mut self.managed,
            &mut self.unmanaged,
            &mut self.log_file,
        ] {
            if !value.trim().is_empty() {
                *value = resolve_path(config_path, value.trim()).to_string_lossy().to_string();
            }
        }
        for value in &mut self.additional {
            if !value.trim().is_empty() {
                *value = resolve_path(config_path, value.trim()).to_string_lossy().to_string();
            }
        }
    }
}

fn or_default(value: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        PathBuf::from(trimmed)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    match env::var(CONFIG_ENV) {
        Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
        _ => default_config_path().filter(|path| path.exists()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: &Path) -> Result<TaggerConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: TaggerConfig = if contents.trim().is_empty() {
        TaggerConfig::default()
    } else {
        serde_yaml::from_str(&contents)?
    };
    if config.batch_size == 0 {
        config.batch_size = DEFAULT_BATCH_SIZE;
    }
    config.resolve_paths(path);
    Ok(config)
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roots_follow_music_base() {
        let config = TaggerConfig {
            music_base: "/srv/music".to_string(),
            additional: vec!["/mnt/extra".to_string(), "  ".to_string()],
            ..TaggerConfig::default()
        };
        assert_eq!(
            config.roots(),
            vec![
                PathBuf::from("/srv/music/Managed"),
                PathBuf::from("/srv/music/Unmanaged"),
                PathBuf::from("/mnt/extra"),
            ]
        );
    }

    #[test]
    fn loads_partial_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "music_base: library\nmanaged: /abs/Managed\nbackup: true\ngenre_match: normalized\nbatch_size: 0\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.backup);
        assert!(!config.dry_run);
        assert_eq!(config.genre_match, GenreMatch::Normalized);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.managed, "/abs/Managed");
        assert_eq!(PathBuf::from(&config.music_base), dir.path().join("library"));
        assert_eq!(config.roots()[1], dir.path().join("library").join("Unmanaged"));
        assert_eq!(config.log_path(), Some(dir.path().join("genre_tagging.log")));
    }

    #[test]
    fn empty_file_is_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.progress);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "batch_size: [not, a, number]\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Yaml(_))));
        assert!(matches!(
            load_config(&dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn run_config_drops_blank_filter_and_zero_limit() {
        let config = TaggerConfig {
            genre: "  ".to_string(),
            cpu_limit: 0,
            ..TaggerConfig::default()
        };
        let run = config.run_config();
        assert_eq!(run.genre_filter, None);
        assert_eq!(run.cpu_limit, None);

        let config = TaggerConfig {
            genre: "Electronic".to_string(),
            cpu_limit: 2,
            dry_run: true,
            ..TaggerConfig::default()
        };
        let run = config.run_config();
        assert_eq!(run.genre_filter.as_deref(), Some("Electronic"));
        assert_eq!(run.cpu_limit, Some(2));
        assert!(run.dry_run);
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = Path::new("/etc/genre-tagger.yaml");
        assert_eq!(locate_config(Some(path)), Some(path.to_path_buf()));
    }
}
