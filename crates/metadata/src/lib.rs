use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::error::{ErrorKind, LoftyError};
use lofty::prelude::{ItemKey, TagExt, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Tag;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerFormat {
    Mpeg,
    Flac,
    Mp4,
    Aac,
    Vorbis,
    Opus,
    Speex,
    Musepack,
    Ape,
    WavPack,
    Aiff,
    Wav,
    OggFlac,
    TrueAudio,
    Asf,
    OptimFrog,
    Tak,
    Dsf,
    Dsdiff,
    SunAu,
    Acm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatSupport {
    Writable,
    ReadOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatEntry {
    pub format: ContainerFormat,
    pub support: FormatSupport,
}

#[derive(Clone, Debug)]
pub struct FormatTable {
    entries: HashMap<String, FormatEntry>,
}

impl FormatTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ext: &str, format: ContainerFormat, support: FormatSupport) {
        self.entries.insert(
            ext.trim_start_matches('.').to_ascii_lowercase(),
            FormatEntry { format, support },
        );
    }

    pub fn lookup(&self, ext: &str) -> Option<FormatEntry> {
        self.entries
            .get(ext.trim_start_matches('.').to_ascii_lowercase().as_str())
            .copied()
    }

    pub fn classify(&self, path: &Path) -> Option<FormatEntry> {
        let ext = path.extension()?.to_string_lossy();
        self.lookup(&ext)
    }

}

impl Default for FormatTable {
    fn default() -> Self {
        use ContainerFormat::*;
        use FormatSupport::{ReadOnly, Writable};

        let mut table = Self::empty();
        let rows: [(&str, ContainerFormat, FormatSupport); 26] = [
            ("mp3", Mpeg, Writable),
            ("mp2", Mpeg, Writable),
            ("flac", Flac, Writable),
            ("mp4", Mp4, Writable),
            ("m4a", Mp4, Writable),
            ("m4b", Mp4, Writable),
            ("aac", Aac, Writable),
            ("ogg", Vorbis, Writable),
            ("opus", Opus, Writable),
            ("spx", Speex, Writable),
            ("mpc", Musepack, Writable),
            ("ape", Ape, Writable),
            ("wv", WavPack, Writable),
            ("aiff", Aiff, Writable),
            ("aif", Aiff, Writable),
            ("wav", Wav, Writable),
            ("oga", OggFlac, ReadOnly),
            ("tta", TrueAudio, ReadOnly),
            ("wma", Asf, ReadOnly),
            ("ofr", OptimFrog, ReadOnly),
            ("ofs", OptimFrog, ReadOnly),
            ("tak", Tak, ReadOnly),
            ("dsf", Dsf, ReadOnly),
            ("dff", Dsdiff, ReadOnly),
            ("au", SunAu, ReadOnly),
            ("acm", Acm, ReadOnly),
        ];
        for (ext, format, support) in rows {
            table.insert(ext, format, support);
        }
        table
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
    Unsupported(String),
}

impl MetadataError {
    pub fn is_permission_denied(&self) -> bool {
        match self {
            MetadataError::Io(err) => err.kind() == std::io::ErrorKind::PermissionDenied,
            MetadataError::Lofty(err) => matches!(
                err.kind(),
                ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied
            ),
            MetadataError::Unsupported(_) => false,
        }
    }

    pub fn is_io(&self) -> bool {
        match self {
            MetadataError::Io(_) => true,
            MetadataError::Lofty(err) => matches!(err.kind(), ErrorKind::Io(_)),
            MetadataError::Unsupported(_) => false,
        }
    }
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
            MetadataError::Unsupported(value) => write!(f, "unsupported: {}", value),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

pub trait GenreCodec: Send + Sync {
    fn read_genre(&self, path: &Path) -> Result<Option<String>, MetadataError>;

    // Must leave `path` as it was when an error is returned.
    fn write_genre(&self, path: &Path, genre: &str) -> Result<(), MetadataError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyCodec;

impl GenreCodec for LoftyCodec {
    fn read_genre(&self, path: &Path) -> Result<Option<String>, MetadataError> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
        let genre = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .and_then(|tag| tag.get_string(&ItemKey::Genre))
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.to_string());
        Ok(genre)
    }

    fn write_genre(&self, path: &Path, genre: &str) -> Result<(), MetadataError> {
        let snapshot = fs::read(path)?;
        let result = write_genre_in_place(path, genre);
        if result.is_err() {
            restore(path, &snapshot);
        }
        result
    }
}

fn write_genre_in_place(path: &Path, genre: &str) -> Result<(), MetadataError> {
    let mut tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file.tag_mut(tag_type).ok_or_else(|| {
        MetadataError::Unsupported(format!("{:?} tags cannot be created", tag_type))
    })?;
    tag.insert_text(ItemKey::Genre, genre.to_string());
    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

// Puts the pre-write bytes back through the same inode after a failed save.
fn restore(path: &Path, snapshot: &[u8]) {
    match fs::read(path) {
        Ok(current) if current == snapshot => {}
        _ => {
            let _ = fs::write(path, snapshot);
        }
    }
}
