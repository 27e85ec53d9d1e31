//! Configuration types for mail-archiver

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::container::Codec;

/// Options for one archiving run
///
/// The two directories are the only required settings and are always
/// injected by the caller; everything else has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Directory holding the message files to archive
    pub source_dir: PathBuf,

    /// Directory the per-year archives live in
    pub archive_dir: PathBuf,

    /// Compression method for newly written entries (default: bzip2)
    #[serde(default)]
    pub codec: Codec,

    /// Scan and report without writing archives or deleting sources (default: false)
    #[serde(default)]
    pub dry_run: bool,

    /// What to do when a message file cannot be read (default: skip)
    #[serde(default)]
    pub read_failure: ReadFailurePolicy,
}

impl ArchiveOptions {
    /// Options for archiving `source_dir` into `archive_dir`, defaults elsewhere
    pub fn new(source_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            archive_dir: archive_dir.into(),
            codec: Codec::default(),
            dry_run: false,
            read_failure: ReadFailurePolicy::default(),
        }
    }

    /// Set the compression method for newly written entries
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Enable or disable dry-run mode
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the read-failure policy
    #[must_use]
    pub fn with_read_failure(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure = policy;
        self
    }
}

/// What an archiving run does when a message file cannot be read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Report the failure, keep the file, continue with the next entry
    #[default]
    Skip,
    /// Stop the run with the read error
    Abort,
}
