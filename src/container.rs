//! Shared zip container I/O
//!
//! Both pipelines sit on this layer: codec selection, `<year>.zip` naming,
//! and creating or appending to archives on disk.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ArchiveError, Error, Result};
use crate::message::Year;

/// Compression method entries are written with
///
/// Covers the methods the zip backend can write. Legacy LZMA and XZ entries
/// remain readable for recompression, but cannot be produced anymore; bzip2
/// is the strong archival choice that stock zip tooling still reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// No compression
    Store,
    /// DEFLATE, the most widely supported method
    Deflate,
    /// bzip2, smaller output at archival speed
    #[default]
    Bzip2,
    /// Zstandard
    Zstd,
}

impl Codec {
    /// The zip compression method this codec writes
    pub fn method(self) -> CompressionMethod {
        match self {
            Codec::Store => CompressionMethod::Stored,
            Codec::Deflate => CompressionMethod::Deflated,
            Codec::Bzip2 => CompressionMethod::Bzip2,
            Codec::Zstd => CompressionMethod::Zstd,
        }
    }

    /// Entry options writing with this codec
    pub fn file_options(self) -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(self.method())
    }
}

/// Path of the archive holding `year`'s messages inside `archive_dir`
pub fn archive_path(archive_dir: &Path, year: Year) -> PathBuf {
    archive_dir.join(year.archive_file_name())
}

/// Whether a path looks like a zip archive (`.zip` suffix, ASCII case-insensitive)
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().to_lowercase() == "zip")
}

/// Entry names currently stored in the archive at `path`
///
/// # Errors
///
/// Returns [`ArchiveError::OpenArchive`] when the file cannot be opened or
/// is not a readable archive.
pub fn entry_names(path: &Path) -> Result<BTreeSet<String>> {
    let file = File::open(path).map_err(|e| open_error(path, e.to_string()))?;
    let archive = ZipArchive::new(file).map_err(|e| open_error(path, e.to_string()))?;
    Ok(archive.file_names().map(ToString::to_string).collect())
}

/// Append-only writer over one archive
///
/// Tracks the entry names the archive already holds. Zip forbids two
/// entries under the same name, so appending a taken name stores the
/// payload under `name (1).eml`, `name (2).eml` and so on, the same
/// numbering used when extracted files collide on disk.
pub struct ArchiveWriter {
    path: PathBuf,
    writer: ZipWriter<File>,
    names: BTreeSet<String>,
}

impl ArchiveWriter {
    /// Open `path` for appending, creating the archive if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::OpenArchive`] when the file cannot be
    /// created, opened, or read as an archive.
    pub fn create_or_append(path: &Path) -> Result<Self> {
        if path.is_file() {
            let names = entry_names(path)?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| open_error(path, e.to_string()))?;
            let writer = ZipWriter::new_append(file).map_err(|e| open_error(path, e.to_string()))?;
            Ok(Self {
                path: path.to_path_buf(),
                writer,
                names,
            })
        } else {
            let file = File::create(path).map_err(|e| open_error(path, e.to_string()))?;
            Ok(Self {
                path: path.to_path_buf(),
                writer: ZipWriter::new(file),
                names: BTreeSet::new(),
            })
        }
    }

    /// Append `bytes` as one entry, renaming on a name collision
    ///
    /// Returns the name the entry was stored under. On a failed payload
    /// write the partial entry is aborted so the writer stays usable for
    /// later files.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryWrite`] when the entry cannot be
    /// started or its bytes cannot be written.
    pub fn append(&mut self, name: &str, bytes: &[u8], codec: Codec) -> Result<String> {
        let unique = unique_entry_name(name, &self.names);
        self.writer
            .start_file(unique.as_str(), codec.file_options())
            .map_err(|e| entry_error(&self.path, &unique, e.to_string()))?;
        if let Err(e) = self.writer.write_all(bytes) {
            let _ = self.writer.abort_file();
            return Err(entry_error(&self.path, &unique, e.to_string()));
        }
        self.names.insert(unique.clone());
        Ok(unique)
    }

    /// Write the central directory and close the archive
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::FinishArchive`] when the directory cannot be
    /// written; entries appended so far may then be unreadable.
    pub fn finish(mut self) -> Result<()> {
        self.writer.finish().map_err(|e| {
            Error::from(ArchiveError::FinishArchive {
                archive: std::mem::take(&mut self.path),
                reason: e.to_string(),
            })
        })?;
        Ok(())
    }
}

/// First name derived from `name` that is absent from `taken`
fn unique_entry_name(name: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|e| e.to_str());
    let mut i = 1u32;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        if !taken.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

fn open_error(archive: &Path, reason: String) -> Error {
    ArchiveError::OpenArchive {
        archive: archive.to_path_buf(),
        reason,
    }
    .into()
}

fn entry_error(archive: &Path, entry: &str, reason: String) -> Error {
    ArchiveError::EntryWrite {
        archive: archive.to_path_buf(),
        entry: entry.to_string(),
        reason,
    }
    .into()
}
