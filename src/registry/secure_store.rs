//! Secure material archive extraction.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::ConfigResult;

/// `{cc_home}/server/certificates`.
pub fn certificates_dir(cc_home: &str) -> PathBuf {
    Path::new(cc_home).join("server").join("certificates")
}

/// Extract every file entry of a zip archive into `target`.
///
/// Directories are created as needed. Entries whose names would escape `target`
/// are skipped. Returns the number of files written.
pub fn extract_archive(archive: &[u8], target: &Path) -> ConfigResult<usize> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    fs::create_dir_all(target)?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping unsafe archive entry");
            continue;
        };
        let path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        io::copy(&mut entry, &mut file)?;
        tracing::debug!(path = ?path, "Extracted secure material");
        written += 1;
    }

    Ok(written)
}
