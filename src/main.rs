use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use mail_archiver::{
    ArchiveOptions, Archiver, Codec, ConsoleReporter, ReadFailurePolicy, recompress_archive,
    recompress_dir,
};

#[derive(Parser)]
#[command(name = "mail-archiver")]
#[command(about = "Sorts email message files into per-year zip archives")]
#[command(version)]
struct Cli {
    /// Log at debug level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Move messages from a directory into per-year archives
    Archive {
        /// Directory holding the message files
        #[arg(long)]
        source: PathBuf,

        /// Directory the per-year archives live in
        #[arg(long)]
        archive_dir: PathBuf,

        /// Compression method for new entries
        #[arg(long, value_enum, default_value = "bzip2")]
        codec: Codec,

        /// Report what would happen without writing or deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Stop at the first unreadable message instead of skipping it
        #[arg(long)]
        abort_on_read_error: bool,
    },

    /// Rewrite existing archives under a different compression method
    Recompress {
        /// A single archive, or a directory of archives
        path: PathBuf,

        /// Compression method for the rewritten entries
        #[arg(long, value_enum, default_value = "deflate")]
        codec: Codec,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();

    let reporter = ConsoleReporter::new();
    let result = match cli.cmd {
        Cmd::Archive {
            source,
            archive_dir,
            codec,
            dry_run,
            abort_on_read_error,
        } => run_archive(
            source,
            archive_dir,
            codec,
            dry_run,
            abort_on_read_error,
            &reporter,
        ),
        Cmd::Recompress { path, codec } => run_recompress(&path, codec, &reporter),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run finished without per-file failures
fn run_archive(
    source: PathBuf,
    archive_dir: PathBuf,
    codec: Codec,
    dry_run: bool,
    abort_on_read_error: bool,
    reporter: &ConsoleReporter,
) -> mail_archiver::Result<bool> {
    let read_failure = if abort_on_read_error {
        ReadFailurePolicy::Abort
    } else {
        ReadFailurePolicy::Skip
    };
    let options = ArchiveOptions::new(source, archive_dir)
        .with_codec(codec)
        .with_dry_run(dry_run)
        .with_read_failure(read_failure);

    let summary = Archiver::new(options, reporter).run()?;
    println!(
        "{} archived, {} skipped, {} failed ({} entries processed)",
        summary.archived, summary.skipped, summary.failed, summary.steps
    );
    Ok(summary.is_clean())
}

fn run_recompress(
    path: &Path,
    codec: Codec,
    reporter: &ConsoleReporter,
) -> mail_archiver::Result<bool> {
    if path.is_dir() {
        let summary = recompress_dir(path, codec, reporter)?;
        println!(
            "{} archives recompressed ({} entries), {} failed",
            summary.archives, summary.entries, summary.failed
        );
        Ok(summary.is_clean())
    } else {
        let entries = recompress_archive(path, codec, reporter)?;
        println!("1 archive recompressed ({entries} entries)");
        Ok(true)
    }
}
