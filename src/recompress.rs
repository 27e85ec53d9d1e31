//! Archive recompression
//!
//! Rewrites existing zip archives entry by entry under a different
//! compression method. The rewrite happens in a sibling temporary file
//! that replaces the original only once it is complete, so an
//! interrupted or failed rewrite never damages the original archive.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::{ZipArchive, ZipWriter};

use crate::container::{self, Codec};
use crate::error::{ArchiveError, Error, Result};
use crate::report::{Notice, Reporter};

/// Outcome of one recompression run
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecompressSummary {
    /// Archives rewritten under the new method
    pub archives: usize,
    /// Entries copied across all rewritten archives
    pub entries: usize,
    /// Archives left untouched because their rewrite failed
    pub failed: usize,
}

impl RecompressSummary {
    /// Whether every archive was rewritten
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Rewrite one archive so every entry uses the given codec
///
/// Entry order, names, payloads, modification times and unix permissions
/// are preserved. The original archive is replaced only after the rewrite
/// is complete; on failure it is left untouched and the partial temporary
/// file is removed.
///
/// Returns the number of entries copied.
///
/// # Errors
///
/// Returns [`ArchiveError::Recompress`] when the archive cannot be read
/// or its replacement cannot be completed.
pub fn recompress_archive(path: &Path, codec: Codec, reporter: &dyn Reporter) -> Result<usize> {
    let tmp = temp_path(path);
    let result = rewrite_archive(path, &tmp, codec, reporter);
    match &result {
        Ok(entries) => {
            info!(?path, entries, ?codec, "archive recompressed");
            reporter.notice(Notice::Recompressed {
                archive: path.to_path_buf(),
                entries: *entries,
            });
        }
        Err(e) => {
            // the partial rewrite is useless, the original stays as it was
            let _ = fs::remove_file(&tmp);
            warn!(?path, error = %e, "recompression failed, original kept");
            reporter.notice(Notice::RecompressFailed {
                archive: path.to_path_buf(),
                error: e.to_string(),
            });
        }
    }
    result
}

/// Rewrite every zip archive directly inside a directory
///
/// Entries that are not regular `.zip` files are ignored. Archives are
/// rewritten in isolation, so one damaged archive is reported and counted
/// without stopping the rest of the run.
///
/// # Errors
///
/// Returns an error only when the directory itself cannot be listed.
pub fn recompress_dir(dir: &Path, codec: Codec, reporter: &dyn Reporter) -> Result<RecompressSummary> {
    let archives = list_archives(dir)?;
    info!(?dir, total = archives.len(), ?codec, "recompression run started");

    let mut summary = RecompressSummary::default();
    for path in archives {
        match recompress_archive(&path, codec, reporter) {
            Ok(entries) => {
                summary.archives += 1;
                summary.entries += entries;
            }
            Err(_) => {
                // already reported per archive
                summary.failed += 1;
            }
        }
    }

    info!(
        archives = summary.archives,
        entries = summary.entries,
        failed = summary.failed,
        "recompression run finished"
    );
    Ok(summary)
}

fn rewrite_archive(
    path: &Path,
    tmp: &Path,
    codec: Codec,
    reporter: &dyn Reporter,
) -> Result<usize> {
    let file = File::open(path).map_err(|e| recompress_error(path, e.to_string()))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| recompress_error(path, e.to_string()))?;
    let total = archive.len();

    let name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy());
    reporter.begin(&format!("recompressing {name}"), total);

    let out = File::create(tmp).map_err(|e| recompress_error(path, e.to_string()))?;
    let mut writer = ZipWriter::new(out);

    for index in 0..total {
        reporter.advance();
        let mut entry = archive
            .by_index(index)
            .map_err(|e| recompress_error(path, e.to_string()))?;
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| recompress_error(path, e.to_string()))?;

        let mut options = codec.file_options();
        if let Some(modified) = entry.last_modified() {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }
        debug!(entry = entry.name(), index, "rewriting entry");

        let entry_name = entry.name().to_string();
        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| recompress_error(path, e.to_string()))?;
        writer
            .write_all(&content)
            .map_err(|e| recompress_error(path, e.to_string()))?;
    }

    writer
        .finish()
        .map_err(|e| recompress_error(path, e.to_string()))?;
    // the replacement is atomic, readers see either the old or the new archive
    fs::rename(tmp, path).map_err(|e| recompress_error(path, e.to_string()))?;
    Ok(total)
}

fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| list_error(dir, e.to_string()))?;
    let mut archives = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| list_error(dir, e.to_string()))?;
        let path = entry.path();
        if path.is_file() && container::is_archive_path(&path) {
            archives.push(path);
        }
    }
    Ok(archives)
}

fn temp_path(archive: &Path) -> PathBuf {
    let mut path = archive.as_os_str().to_owned();
    path.push(".tmp");
    PathBuf::from(path)
}

fn recompress_error(archive: &Path, reason: String) -> Error {
    ArchiveError::Recompress {
        archive: archive.to_path_buf(),
        reason,
    }
    .into()
}

fn list_error(dir: &Path, reason: String) -> Error {
    ArchiveError::SourceDir {
        path: dir.to_path_buf(),
        reason,
    }
    .into()
}
