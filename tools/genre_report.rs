use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use library::{label_under, ScanEntry, Scanner};
use metadata::FormatTable;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut roots: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if roots.is_empty() {
        let value = env::var("MUSIC_ROOTS").map_err(|_| "MUSIC_ROOTS not set and no path argument")?;
        roots = env::split_paths(&value).collect();
    }

    let formats = FormatTable::default();
    let mut per_genre: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_format = BTreeMap::new();
    let mut unsupported = 0usize;
    for entry in Scanner::new(&roots, &formats, None) {
        match entry {
            ScanEntry::Candidate(file) => {
                let genre = label_under(&file.root, &file.path)
                    .map(|label| label.into_string())
                    .unwrap_or_else(|| "(none)".to_string());
                *per_genre.entry(genre).or_insert(0) += 1;
                *per_format.entry(file.format).or_insert(0usize) += 1;
            }
            ScanEntry::Skipped(_) => unsupported += 1,
        }
    }

    let total: usize = per_genre.values().sum();
    info!("Found {} taggable files in {} genres", total, per_genre.len());
    for (genre, count) in &per_genre {
        println!("{:>8}  {}", count, genre);
    }
    println!();
    for (format, count) in &per_format {
        println!("{:>8}  {:?}", count, format);
    }
    if unsupported > 0 {
        println!("{:>8}  (unsupported format)", unsupported);
    }

    Ok(())
}
