//! # mail-archiver
//!
//! Sorts email message files into per-year zip archives and recompresses
//! existing archives.
//!
//! ## Design Philosophy
//!
//! mail-archiver is designed to be:
//! - **Safe by default** - A message is removed only after its archive entry was written
//! - **Resumable** - Later runs append to existing archives, failed files stay in place
//! - **Library-first** - The CLI is a thin wrapper, every operation is callable as a crate
//! - **Pluggable output** - Progress goes through a [`Reporter`], nothing prints on its own
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_archiver::{ArchiveOptions, Archiver, ConsoleReporter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ArchiveOptions::new("/mail/inbox", "/mail/archive");
//!     let reporter = ConsoleReporter::new();
//!     let summary = Archiver::new(options, &reporter).run()?;
//!     println!("{} messages archived", summary.archived);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archiving pipeline
pub mod archiver;
/// Run options
pub mod config;
/// Zip container access
pub mod container;
/// Error types
pub mod error;
/// Message date extraction
pub mod message;
/// Archive recompression
pub mod recompress;
/// Progress and outcome reporting
pub mod report;

// Re-export commonly used types
pub use archiver::{ArchiveSummary, Archiver, LOCK_FILE_NAME};
pub use config::{ArchiveOptions, ReadFailurePolicy};
pub use container::Codec;
pub use error::{ArchiveError, Error, Result};
pub use message::{DATE_HEADER_FORMAT, Year, extract_year};
pub use recompress::{RecompressSummary, recompress_archive, recompress_dir};
pub use report::{ConsoleReporter, Notice, Reporter, SilentReporter};
