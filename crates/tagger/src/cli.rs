use std::path::PathBuf;

use clap::Parser;
use library::GenreMatch;

use crate::config::TaggerConfig;

#[derive(Parser, Debug)]
#[command(name = "genre-tagger")]
#[command(about = "Update audio file genre tags based on folder structure")]
#[command(version)]
pub struct Args {
    /// YAML config file; flags given here override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base music directory
    #[arg(long)]
    pub music_base: Option<String>,

    /// Managed music directory (default: <music_base>/Managed)
    #[arg(long)]
    pub managed: Option<String>,

    /// Unmanaged music directory (default: <music_base>/Unmanaged)
    #[arg(long)]
    pub unmanaged: Option<String>,

    /// Additional music directories to process
    #[arg(long)]
    pub additional: Vec<String>,

    /// Limit CPU usage to N cores
    #[arg(long)]
    pub cpu_limit: Option<usize>,

    /// Show changes without modifying files
    #[arg(long)]
    pub dry_run: bool,

    /// Create backups of modified files
    #[arg(long)]
    pub backup: bool,

    /// Only process files in genre folders containing this text
    #[arg(long)]
    pub genre: Option<String>,

    /// Process files in batches of N
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Show more detailed output
    #[arg(long)]
    pub verbose: bool,

    /// Path to log file
    #[arg(long)]
    pub log_file: Option<String>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Treat an existing tag as correct when it normalizes to the folder genre
    #[arg(long)]
    pub normalized_match: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// Layer flags over file values. Switches only ever turn a setting on.
    pub fn apply(&self, config: &mut TaggerConfig) {
        if let Some(value) = &self.music_base {
            config.music_base = value.clone();
        }
        if let Some(value) = &self.managed {
            config.managed = value.clone();
        }
        if let Some(value) = &self.unmanaged {
            config.unmanaged = value.clone();
        }
        config.additional.extend(self.additional.iter().cloned());
        if let Some(value) = self.cpu_limit {
            config.cpu_limit = value;
        }
        if let Some(value) = &self.genre {
            config.genre = value.clone();
        }
        if let Some(value) = self.batch_size {
            config.batch_size = value;
        }
        if let Some(value) = &self.log_file {
            config.log_file = value.clone();
        }
        config.dry_run |= self.dry_run;
        config.backup |= self.backup;
        config.verbose |= self.verbose;
        if self.no_progress {
            config.progress = false;
        }
        if self.normalized_match {
            config.genre_match = GenreMatch::Normalized;
        }
    }
}
