use std::fmt;
use std::path::{Path, PathBuf};

use common::genre_segment;

const PRESERVED_WORDS: [&str; 13] = [
    "DJ", "MC", "UK", "US", "R&B", "A&R", "EDM", "IDM", "DnB", "D&B", "J-Pop", "K-Pop", "EMD",
];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenreLabel(String);

impl GenreLabel {
    pub fn normalize(raw: &str) -> Self {
        GenreLabel(normalize_genre(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.trim().to_lowercase();
        filter.is_empty() || self.0.to_lowercase().contains(&filter)
    }
}

impl fmt::Display for GenreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GenreLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// A lone `-` passes through, keeping the `Genre - Subgenre` separator.
pub fn normalize_genre(raw: &str) -> String {
    raw.split_whitespace()
        .map(normalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn resolve(path: &Path, roots: &[PathBuf]) -> Option<GenreLabel> {
    label_under(matching_root(path, roots)?, path)
}

pub fn label_under(root: &Path, path: &Path) -> Option<GenreLabel> {
    let label = GenreLabel::normalize(&genre_segment(root, path)?);
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

pub fn matching_root<'a>(path: &Path, roots: &'a [PathBuf]) -> Option<&'a Path> {
    roots
        .iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
        .map(PathBuf::as_path)
}

// Preserved spellings are matched after casing so the check sees the same
// text on every pass.
fn normalize_word(word: &str) -> String {
    let joined = word
        .split('-')
        .map(|part| {
            let cased = title_case(part);
            match preserved_form(&cased) {
                Some(preserved) => preserved.to_string(),
                None => cased,
            }
        })
        .collect::<Vec<_>>()
        .join("-");
    match preserved_form(&joined) {
        Some(preserved) => preserved.to_string(),
        None => joined,
    }
}

fn preserved_form(word: &str) -> Option<&'static str> {
    PRESERVED_WORDS
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(word))
        .copied()
}

// Upper-cases the first alphanumeric char when it is a letter, lower-cases the
// rest. A letter whose upper case spans several chars stays lower case so a
// second pass cannot change it again.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut leading = true;
    for ch in word.chars() {
        if leading && ch.is_alphanumeric() {
            leading = false;
            if ch.is_alphabetic() {
                let mut upper = ch.to_uppercase();
                if let (Some(single), None) = (upper.next(), upper.next()) {
                    out.push(single);
                    continue;
                }
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}
