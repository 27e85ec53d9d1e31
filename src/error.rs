//! Error types for mail-archiver
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types for the archiving and recompression pipelines
//! - Context information (archive path, entry name, source file, etc.)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mail-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mail-archiver
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Archiving or recompression pipeline error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// Errors raised by the archiving and recompression pipelines
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Source directory could not be listed
    #[error("failed to read source directory {path}: {reason}")]
    SourceDir {
        /// The source directory that could not be listed
        path: PathBuf,
        /// The reason the listing failed
        reason: String,
    },

    /// Message file could not be read
    #[error("failed to read message {path}: {reason}")]
    ReadMessage {
        /// The message file that could not be read
        path: PathBuf,
        /// The reason the read failed
        reason: String,
    },

    /// Archive could not be created or opened for append
    #[error("failed to open archive {archive}: {reason}")]
    OpenArchive {
        /// The archive file that could not be opened
        archive: PathBuf,
        /// The reason the open failed
        reason: String,
    },

    /// Entry could not be written into an archive
    #[error("failed to write entry {entry} to {archive}: {reason}")]
    EntryWrite {
        /// The archive the entry was being written to
        archive: PathBuf,
        /// The entry name that failed to write
        entry: String,
        /// The reason the write failed
        reason: String,
    },

    /// Archive could not be finalized
    #[error("failed to finalize archive {archive}: {reason}")]
    FinishArchive {
        /// The archive whose central directory could not be written
        archive: PathBuf,
        /// The reason finalization failed
        reason: String,
    },

    /// Recompression of an archive failed
    #[error("recompression failed for {archive}: {reason}")]
    Recompress {
        /// The archive that failed to recompress
        archive: PathBuf,
        /// The reason recompression failed
        reason: String,
    },

    /// Another archiving run holds the lock for this archive directory
    #[error("another archiving run holds the lock at {path}")]
    RunLocked {
        /// The lock file path that already exists
        path: PathBuf,
    },
}
