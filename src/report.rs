//! Progress and outcome reporting for archiving runs
//!
//! The pipelines never print on their own. They talk to a [`Reporter`], so
//! embedders can route progress wherever they want: the CLI installs a
//! [`ConsoleReporter`], tests record notices, and library users who want
//! silence use [`SilentReporter`].

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-file outcome emitted during an archiving or recompression run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Message was written into its year archive and removed from the source directory
    Archived {
        /// Source message path
        source: PathBuf,
        /// Destination archive path
        archive: PathBuf,
    },

    /// Message would be archived, but the run is a dry run
    WouldArchive {
        /// Source message path
        source: PathBuf,
        /// Destination archive path
        archive: PathBuf,
    },

    /// Message had no parsable date year and was left in place
    SkippedNoYear {
        /// Source message path
        source: PathBuf,
    },

    /// Message could not be read and was left in place
    ReadFailed {
        /// Source message path
        source: PathBuf,
        /// Why the read failed
        error: String,
    },

    /// Message could not be written into its archive and was left in place
    WriteFailed {
        /// Source message path
        source: PathBuf,
        /// Destination archive path
        archive: PathBuf,
        /// Why the write failed
        error: String,
    },

    /// Message was archived but the source file could not be removed
    RemoveFailed {
        /// Source message path
        source: PathBuf,
        /// Destination archive path
        archive: PathBuf,
        /// Why the removal failed
        error: String,
    },

    /// Archive was rewritten under the new compression method
    Recompressed {
        /// Archive path
        archive: PathBuf,
        /// Number of entries copied
        entries: usize,
    },

    /// Archive could not be recompressed and was left untouched
    RecompressFailed {
        /// Archive path
        archive: PathBuf,
        /// Why recompression failed
        error: String,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Archived { source, archive } => {
                write!(
                    f,
                    "source file: {} -> {}",
                    base_name(source),
                    base_name(archive)
                )
            }
            Notice::WouldArchive { source, archive } => {
                write!(
                    f,
                    "source file: {} -> {} (dry run)",
                    base_name(source),
                    base_name(archive)
                )
            }
            Notice::SkippedNoYear { source } => {
                write!(
                    f,
                    "source file: {} skipped (could not find year)",
                    base_name(source)
                )
            }
            Notice::ReadFailed { source, error } => {
                write!(f, "source file: {} failed to read: {error}", base_name(source))
            }
            Notice::WriteFailed {
                source,
                archive,
                error,
            } => {
                write!(
                    f,
                    "source file: {} failed to archive into {}: {error}",
                    base_name(source),
                    base_name(archive)
                )
            }
            Notice::RemoveFailed {
                source,
                archive,
                error,
            } => {
                write!(
                    f,
                    "source file: {} archived into {} but could not be removed: {error}",
                    base_name(source),
                    base_name(archive)
                )
            }
            Notice::Recompressed { archive, entries } => {
                write!(
                    f,
                    "archive {} recompressed ({entries} entries)",
                    base_name(archive)
                )
            }
            Notice::RecompressFailed { archive, error } => {
                write!(
                    f,
                    "archive {} recompression failed: {error}",
                    base_name(archive)
                )
            }
        }
    }
}

/// Progress and outcome sink for archiving runs
///
/// Implementations receive one `begin` per task, one `advance` per processed
/// step, and a `notice` for every per-file outcome worth surfacing. Silent
/// steps (directory entries that are not regular files) advance without a
/// notice.
///
/// # Examples
///
/// ```
/// use mail_archiver::report::{Reporter, SilentReporter};
///
/// let reporter = SilentReporter;
/// reporter.begin("archiving", 3);
/// reporter.advance();
/// ```
pub trait Reporter: Send + Sync {
    /// Start a task with a known number of steps
    fn begin(&self, task: &str, total: usize);

    /// Advance the current task by one step
    fn advance(&self);

    /// Surface a per-file outcome
    fn notice(&self, notice: Notice);
}

/// Reporter that prints one line per outcome to stdout
///
/// Notices are prefixed with the current step position, so a run reads as
/// `[3/120] source file: msg.eml -> 2019.zip`.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    total: AtomicUsize,
    current: AtomicUsize,
}

impl ConsoleReporter {
    /// Create a console reporter
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn begin(&self, task: &str, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.current.store(0, Ordering::Relaxed);
        if total == 0 {
            println!("{task}: nothing to do");
        } else {
            println!("{task}: {total} entries");
        }
    }

    fn advance(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
    }

    fn notice(&self, notice: Notice) {
        let current = self.current.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        println!("{} {notice}", step_prefix(current, total));
    }
}

/// Reporter that ignores everything
///
/// Useful for embedding the pipelines where no progress output is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn begin(&self, _task: &str, _total: usize) {}

    fn advance(&self) {}

    fn notice(&self, _notice: Notice) {}
}

fn step_prefix(current: usize, total: usize) -> String {
    format!("[{current}/{total}]")
}

fn base_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
}
