//! The archiving pipeline
//!
//! Sorts message files from a source directory into per-year archives,
//! removing each source file once its entry is safely written. Per-file
//! problems are reported and counted; only run-level problems (unreadable
//! source directory, held lock) abort the run.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{ArchiveOptions, ReadFailurePolicy};
use crate::container::{self, ArchiveWriter};
use crate::error::{ArchiveError, Error, Result};
use crate::message::{self, Year};
use crate::report::{Notice, Reporter};

/// Name of the lock file guarding an archive directory during a run
pub const LOCK_FILE_NAME: &str = ".mail-archiver.lock";

/// Outcome of one archiving run
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Directory entries processed, including entries that are not regular files
    pub steps: usize,
    /// Messages written into an archive
    pub archived: usize,
    /// Messages left in place because no date year was found
    pub skipped: usize,
    /// Messages that failed to read, archive, or remove
    pub failed: usize,
}

impl ArchiveSummary {
    /// Whether the run completed without any per-file failure
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// The archiving pipeline
///
/// Holds the run options and the reporter outcomes go to. One call to
/// [`run`](Archiver::run) processes every entry of the source directory
/// exactly once.
pub struct Archiver<'a> {
    options: ArchiveOptions,
    reporter: &'a dyn Reporter,
}

impl<'a> Archiver<'a> {
    /// Create an archiver for the given options and reporter
    pub fn new(options: ArchiveOptions, reporter: &'a dyn Reporter) -> Self {
        Self { options, reporter }
    }

    /// Archive every message in the source directory into per-year archives
    ///
    /// Entries that are not regular files are skipped silently. Messages
    /// without a parsable date year are left in place and reported as
    /// skipped. A source file is removed only after its entry was written.
    /// Every archive opened during the run is finalized before this
    /// returns, on the error paths included.
    ///
    /// # Errors
    ///
    /// Returns an error when the source directory cannot be listed, when
    /// the archive directory lock is already held, or, under
    /// [`ReadFailurePolicy::Abort`], when a message cannot be read.
    pub fn run(&self) -> Result<ArchiveSummary> {
        let source_dir = &self.options.source_dir;
        let archive_dir = &self.options.archive_dir;

        let entries = list_entries(source_dir)?;

        // dry runs touch nothing, so they also take no lock
        let _lock = if self.options.dry_run {
            None
        } else {
            fs::create_dir_all(archive_dir)?;
            Some(RunLock::acquire(archive_dir)?)
        };

        info!(
            ?source_dir,
            ?archive_dir,
            total = entries.len(),
            dry_run = self.options.dry_run,
            "archiving run started"
        );
        self.reporter.begin("archiving", entries.len());

        let mut summary = ArchiveSummary {
            steps: entries.len(),
            ..ArchiveSummary::default()
        };
        let mut writers = YearWriters::default();
        let mut fatal = None;

        for path in entries {
            self.reporter.advance();
            if !path.is_file() {
                debug!(?path, "skipping non-file entry");
                continue;
            }
            if let Err(e) = self.process_message(&path, &mut writers, &mut summary) {
                fatal = Some(e);
                break;
            }
        }

        // every opened archive is finalized no matter how the loop ended
        let close_result = writers.finish_all();
        if let Some(e) = fatal {
            return Err(e);
        }
        close_result?;

        info!(
            archived = summary.archived,
            skipped = summary.skipped,
            failed = summary.failed,
            "archiving run finished"
        );
        Ok(summary)
    }

    /// Process one regular file from the source directory
    ///
    /// Per-file failures are reported and counted, then swallowed so the
    /// run continues; the returned error is only used for the abort
    /// read-failure policy.
    fn process_message(
        &self,
        path: &Path,
        writers: &mut YearWriters,
        summary: &mut ArchiveSummary,
    ) -> Result<()> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                summary.failed += 1;
                let error = ArchiveError::ReadMessage {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                warn!(?path, error = %error, "failed to read message");
                self.reporter.notice(Notice::ReadFailed {
                    source: path.to_path_buf(),
                    error: error.to_string(),
                });
                return match self.options.read_failure {
                    ReadFailurePolicy::Skip => Ok(()),
                    ReadFailurePolicy::Abort => Err(error.into()),
                };
            }
        };

        let Some(year) = message::year_from_message(&bytes) else {
            summary.skipped += 1;
            debug!(?path, "no date year found, leaving in place");
            self.reporter.notice(Notice::SkippedNoYear {
                source: path.to_path_buf(),
            });
            return Ok(());
        };

        let archive = container::archive_path(&self.options.archive_dir, year);

        if self.options.dry_run {
            summary.archived += 1;
            self.reporter.notice(Notice::WouldArchive {
                source: path.to_path_buf(),
                archive,
            });
            return Ok(());
        }

        let writer = match writers.get_or_open(&self.options.archive_dir, year) {
            Ok(writer) => writer,
            Err(e) => {
                summary.failed += 1;
                warn!(?archive, error = %e, "failed to open archive");
                self.reporter.notice(Notice::WriteFailed {
                    source: path.to_path_buf(),
                    archive,
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        let name = entry_name(path);
        let stored = match writer.append(&name, &bytes, self.options.codec) {
            Ok(stored) => stored,
            Err(e) => {
                summary.failed += 1;
                warn!(?path, ?archive, error = %e, "failed to append entry");
                self.reporter.notice(Notice::WriteFailed {
                    source: path.to_path_buf(),
                    archive,
                    error: e.to_string(),
                });
                return Ok(());
            }
        };
        if stored != name {
            debug!(?path, %stored, "entry name already taken, stored under a numbered name");
        }

        // source removal only happens after the entry is in the archive
        summary.archived += 1;
        if let Err(e) = fs::remove_file(path) {
            summary.failed += 1;
            warn!(?path, error = %e, "entry archived but source removal failed");
            self.reporter.notice(Notice::RemoveFailed {
                source: path.to_path_buf(),
                archive,
                error: e.to_string(),
            });
            return Ok(());
        }

        debug!(?path, ?archive, "archived");
        self.reporter.notice(Notice::Archived {
            source: path.to_path_buf(),
            archive,
        });
        Ok(())
    }
}

/// Open-for-append archive handles for the current run, keyed by year
#[derive(Default)]
struct YearWriters {
    writers: BTreeMap<Year, ArchiveWriter>,
}

impl YearWriters {
    /// Get the writer for `year`, opening or creating its archive on first use
    fn get_or_open(&mut self, archive_dir: &Path, year: Year) -> Result<&mut ArchiveWriter> {
        match self.writers.entry(year) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = container::archive_path(archive_dir, year);
                let writer = ArchiveWriter::create_or_append(&path)?;
                debug!(%year, ?path, "opened archive for append");
                Ok(entry.insert(writer))
            }
        }
    }

    /// Finalize every open archive, reporting the first failure
    fn finish_all(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        for (year, writer) in std::mem::take(&mut self.writers) {
            if let Err(e) = writer.finish() {
                warn!(%year, error = %e, "failed to finalize archive");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Exclusive lock over an archive directory for the duration of a run
///
/// Uses exclusive file creation so a second run over the same archive
/// directory fails fast instead of interleaving writes. Removed on drop.
struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn acquire(archive_dir: &Path) -> Result<Self> {
        let path = archive_dir.join(LOCK_FILE_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ArchiveError::RunLocked { path }.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = ?self.path, error = %e, "failed to remove run lock");
        }
    }
}

/// List the source directory without imposing any order
fn list_entries(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let listing = fs::read_dir(source_dir).map_err(|e| ArchiveError::SourceDir {
        path: source_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut entries = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|e| ArchiveError::SourceDir {
            path: source_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        entries.push(entry.path());
    }
    Ok(entries)
}

/// Entry name a source file is stored under: its basename
fn entry_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}
