use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use metadata::{ContainerFormat, FormatTable, GenreCodec, MetadataError};

use crate::scan::AudioFile;

pub fn track(root: &Path, rel: &str, genre: Option<&str>) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, genre.unwrap_or("")).unwrap();
    path
}

pub fn audio_file(root: &Path, rel: &str, genre: Option<&str>) -> AudioFile {
    let path = track(root, rel, genre);
    let format = FormatTable::default()
        .classify(&path)
        .map(|entry| entry.format)
        .unwrap_or(ContainerFormat::Flac);
    AudioFile {
        root: root.to_path_buf(),
        path,
        format,
    }
}

#[derive(Default)]
pub struct FileCodec {
    reads: AtomicUsize,
    writes: AtomicUsize,
    denials: AtomicUsize,
    reject: AtomicBool,
}

impl FileCodec {
    pub fn with_denials(count: usize) -> Self {
        let codec = Self::default();
        codec.denials.store(count, Ordering::SeqCst);
        codec
    }

    pub fn rejecting_writes(self) -> Self {
        self.reject.store(true, Ordering::SeqCst);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl GenreCodec for FileCodec {
    fn read_genre(&self, path: &Path) -> Result<Option<String>, MetadataError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let body = fs::read_to_string(path)?;
        match body.as_str() {
            "" => Ok(None),
            "CORRUPT" => Err(MetadataError::Unsupported("unparseable tag".to_string())),
            "PANIC" => panic!("codec blew up on {}", path.display()),
            genre => Ok(Some(genre.to_string())),
        }
    }

    fn write_genre(&self, path: &Path, genre: &str) -> Result<(), MetadataError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let denied = self
            .denials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if denied {
            return Err(MetadataError::Io(io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(MetadataError::Unsupported("tag rejected".to_string()));
        }
        fs::write(path, genre)?;
        Ok(())
    }
}
