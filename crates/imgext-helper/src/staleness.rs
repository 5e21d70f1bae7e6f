//! Modification-time staleness of generated artifacts.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Whether `artifact` must be regenerated from `source`.
///
/// A missing source is never outdated, since there is nothing to regenerate
/// from. Otherwise the artifact is outdated when it is missing or older than
/// the source.
#[must_use]
pub fn is_outdated(source: &Path, artifact: &Path) -> bool {
    let Ok(source_mtime) = fs::metadata(source).and_then(|m| m.modified()) else {
        return false;
    };
    match fs::metadata(artifact).and_then(|m| m.modified()) {
        Ok(artifact_mtime) => artifact_mtime < source_mtime,
        Err(_) => true,
    }
}

/// Set the access and modification times of `artifact` to the source's
/// modification time rounded up to a whole second.
///
/// Rounding up keeps a coarse-grained filesystem from making the artifact
/// look older than its source on the next build. Returns `Ok(false)` without
/// touching anything unless both files exist. Read-only artifacts are fine as
/// long as the caller owns them.
pub fn sync_mtime(source: &Path, artifact: &Path) -> io::Result<bool> {
    if !source.exists() || !artifact.exists() {
        return Ok(false);
    }
    let stamp = ceil_to_second(fs::metadata(source)?.modified()?);
    let times = FileTimes::new().set_accessed(stamp).set_modified(stamp);
    open_for_times(artifact)?.set_times(times)?;
    Ok(true)
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x100;
    File::options().access_mode(FILE_WRITE_ATTRIBUTES).open(path)
}

/// Run `convert` only when `artifact` is outdated relative to `source`.
///
/// A fresh artifact counts as success. Useful inside
/// [`ImageConverter::convert`](crate::ImageConverter::convert) for converters
/// that are also called outside the pipeline.
pub fn if_outdated<F>(source: &Path, artifact: &Path, convert: F) -> bool
where
    F: FnOnce() -> bool,
{
    if is_outdated(source, artifact) {
        convert()
    } else {
        tracing::debug!("{} is up to date", artifact.display());
        true
    }
}

/// Round `time` up to the next whole second (unchanged if already whole).
#[must_use]
pub fn ceil_to_second(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) if since.subsec_nanos() > 0 => {
            UNIX_EPOCH + Duration::from_secs(since.as_secs() + 1)
        }
        Ok(_) => time,
        // Before the epoch, dropping the fraction moves towards the future.
        Err(e) => UNIX_EPOCH - Duration::from_secs(e.duration().as_secs()),
    }
}
