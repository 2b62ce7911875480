use std::fs::{self, Permissions};
use std::io;
use std::path::Path;

use common::{backup_path, Outcome, WorkResult};
use metadata::{GenreCodec, MetadataError};
use tracing::debug;

use crate::config::RunConfig;
use crate::genre::GenreLabel;
use crate::scan::AudioFile;

pub fn apply(
    file: &AudioFile,
    current: Option<String>,
    target: &GenreLabel,
    config: &RunConfig,
    codec: &dyn GenreCodec,
) -> WorkResult {
    let result = WorkResult::new(file.path.clone(), Outcome::Updated)
        .with_genres(current, Some(target.to_string()));

    if config.dry_run {
        return result.simulated();
    }

    if config.backup {
        if let Err(err) = write_backup(&file.path) {
            return WorkResult {
                outcome: Outcome::FailedIo,
                ..result
            }
            .with_detail(format!("Failed to create backup: {}", err));
        }
    }

    match codec.write_genre(&file.path, target.as_str()) {
        Ok(()) => result,
        Err(err) if err.is_permission_denied() => {
            match retry_with_owner_write(&file.path, target.as_str(), codec) {
                Ok(()) => result,
                Err(detail) => WorkResult {
                    outcome: Outcome::FailedPermission,
                    ..result
                }
                .with_detail(detail),
            }
        }
        Err(err) => WorkResult {
            outcome: write_failure_outcome(&err),
            ..result
        }
        .with_detail(err.to_string()),
    }
}

fn write_failure_outcome(err: &MetadataError) -> Outcome {
    if err.is_io() {
        Outcome::FailedIo
    } else {
        Outcome::FailedCodec
    }
}

// Overwrites a stale backup; removing it first also clears one left read-only.
fn write_backup(path: &Path) -> io::Result<()> {
    let backup = backup_path(path);
    match fs::remove_file(&backup) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::copy(path, &backup)?;
    Ok(())
}

fn retry_with_owner_write(path: &Path, genre: &str, codec: &dyn GenreCodec) -> Result<(), String> {
    let previous = add_owner_write(path)
        .map_err(|err| format!("could not add owner write permission: {}", err))?;
    debug!("Added owner write permission to {}", path.display());

    match codec.write_genre(path, genre) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::set_permissions(path, previous);
            Err(format!("write failed after permission fix: {}", err))
        }
    }
}

#[cfg(unix)]
fn add_owner_write(path: &Path) -> io::Result<Permissions> {
    use std::os::unix::fs::PermissionsExt;

    let previous = fs::metadata(path)?.permissions();
    let mut updated = previous.clone();
    updated.set_mode(previous.mode() | 0o200);
    fs::set_permissions(path, updated)?;
    Ok(previous)
}

#[cfg(not(unix))]
fn add_owner_write(path: &Path) -> io::Result<Permissions> {
    let previous = fs::metadata(path)?.permissions();
    let mut updated = previous.clone();
    updated.set_readonly(false);
    fs::set_permissions(path, updated)?;
    Ok(previous)
}
