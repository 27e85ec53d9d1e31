use super::*;
use crate::config::ReadFailurePolicy;
use crate::container::Codec;
use crate::report::SilentReporter;
use std::fs::File;
use std::io::Read;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DATE_2019: &str = "Wed, 12 Jun 2019 10:00:00 +0000";
const DATE_2019_LATE: &str = "Mon, 23 Dec 2019 18:45:00 +0100";
const DATE_2020: &str = "Sat, 01 Feb 2020 08:30:00 +0100";

/// Reporter that records everything it is told, for assertions
#[derive(Default)]
struct RecordingReporter {
    begun: Mutex<Vec<(String, usize)>>,
    advances: AtomicUsize,
    notices: Mutex<Vec<Notice>>,
}

impl Reporter for RecordingReporter {
    fn begin(&self, task: &str, total: usize) {
        self.begun.lock().unwrap().push((task.to_string(), total));
    }

    fn advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    fn notice(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

impl RecordingReporter {
    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

fn dated_message(date: &str) -> Vec<u8> {
    format!("From: sender@example.com\r\nDate: {date}\r\nSubject: test\r\n\r\nbody\r\n")
        .into_bytes()
}

fn undated_message() -> Vec<u8> {
    b"From: sender@example.com\r\nSubject: no date here\r\n\r\nbody\r\n".to_vec()
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Options over a fresh `source/` and a not-yet-existing `archive/`
fn setup(tmp: &TempDir) -> ArchiveOptions {
    let source = tmp.path().join("source");
    fs::create_dir(&source).unwrap();
    ArchiveOptions::new(source, tmp.path().join("archive"))
}

fn entries_of(archive: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((entry.name().to_string(), content));
    }
    entries
}

// --- Routing and deletion ---

#[test]
fn messages_are_routed_to_their_year_archives() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let june = write_file(&options.source_dir, "june.eml", &dated_message(DATE_2019));
    let december = write_file(
        &options.source_dir,
        "december.eml",
        &dated_message(DATE_2019_LATE),
    );
    let newer = write_file(&options.source_dir, "newer.eml", &dated_message(DATE_2020));

    let summary = Archiver::new(options.clone(), &SilentReporter).run().unwrap();

    assert_eq!(
        summary,
        ArchiveSummary {
            steps: 3,
            archived: 3,
            skipped: 0,
            failed: 0,
        }
    );

    let mut names_2019: Vec<(String, Vec<u8>)> =
        entries_of(&options.archive_dir.join("2019.zip"));
    names_2019.sort();
    assert_eq!(
        names_2019,
        vec![
            ("december.eml".to_string(), dated_message(DATE_2019_LATE)),
            ("june.eml".to_string(), dated_message(DATE_2019)),
        ],
        "2019 messages must land in 2019.zip under their basenames with intact bytes"
    );
    assert_eq!(
        entries_of(&options.archive_dir.join("2020.zip")),
        vec![("newer.eml".to_string(), dated_message(DATE_2020))]
    );

    assert!(!june.exists(), "archived sources must be removed");
    assert!(!december.exists());
    assert!(!newer.exists());
}

#[test]
fn message_without_year_is_kept_and_skipped() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let dated = write_file(&options.source_dir, "dated.eml", &dated_message(DATE_2019));
    let undated = write_file(&options.source_dir, "undated.eml", &undated_message());

    let reporter = RecordingReporter::default();
    let summary = Archiver::new(options.clone(), &reporter).run().unwrap();

    assert_eq!(summary.archived, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert!(!dated.exists());
    assert!(
        undated.exists(),
        "messages without a year must never be deleted"
    );
    assert!(
        reporter.notices().contains(&Notice::SkippedNoYear { source: undated.clone() }),
        "the skip must be surfaced with its source file"
    );
}

#[test]
fn non_file_entries_advance_without_notice() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let subdir = options.source_dir.join("attachments");
    fs::create_dir(&subdir).unwrap();
    write_file(&subdir, "inner.bin", b"payload");
    write_file(&options.source_dir, "dated.eml", &dated_message(DATE_2019));

    let reporter = RecordingReporter::default();
    let summary = Archiver::new(options.clone(), &reporter).run().unwrap();

    assert_eq!(summary.steps, 2, "the subdirectory still counts as a step");
    assert_eq!(summary.archived, 1);
    assert_eq!(
        summary.skipped, 0,
        "a subdirectory is not a missing-year skip"
    );
    assert_eq!(reporter.advances.load(Ordering::Relaxed), 2);
    assert_eq!(
        reporter.notices().len(),
        1,
        "only the archived file produces a notice"
    );
    assert!(subdir.join("inner.bin").exists(), "subdirectories are untouched");
}

#[test]
fn empty_source_directory_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let reporter = RecordingReporter::default();

    for _ in 0..2 {
        let summary = Archiver::new(options.clone(), &reporter).run().unwrap();
        assert_eq!(summary, ArchiveSummary::default());
    }

    assert_eq!(
        *reporter.begun.lock().unwrap(),
        vec![("archiving".to_string(), 0), ("archiving".to_string(), 0)],
        "both runs must report zero total steps"
    );
    assert_eq!(reporter.advances.load(Ordering::Relaxed), 0);
    let leftover: Vec<_> = fs::read_dir(&options.archive_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(
        leftover.is_empty(),
        "no archives and no stale lock may remain, found {leftover:?}"
    );
}

// --- Appending across runs ---

#[test]
fn second_run_appends_to_existing_archive() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    write_file(&options.source_dir, "first.eml", &dated_message(DATE_2019));
    Archiver::new(options.clone(), &SilentReporter).run().unwrap();

    write_file(
        &options.source_dir,
        "second.eml",
        &dated_message(DATE_2019_LATE),
    );
    Archiver::new(options.clone(), &SilentReporter).run().unwrap();

    let mut entries = entries_of(&options.archive_dir.join("2019.zip"));
    entries.sort();
    assert_eq!(
        entries,
        vec![
            ("first.eml".to_string(), dated_message(DATE_2019)),
            ("second.eml".to_string(), dated_message(DATE_2019_LATE)),
        ],
        "entries from the first run must survive the second"
    );
}

#[test]
fn same_basename_across_runs_is_stored_under_a_numbered_name() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    write_file(&options.source_dir, "msg.eml", &dated_message(DATE_2019));
    Archiver::new(options.clone(), &SilentReporter).run().unwrap();

    // a new message reusing the name, still from 2019
    write_file(&options.source_dir, "msg.eml", &dated_message(DATE_2019_LATE));
    let summary = Archiver::new(options.clone(), &SilentReporter).run().unwrap();

    assert_eq!(summary.archived, 1, "the colliding message still archives");
    assert_eq!(
        entries_of(&options.archive_dir.join("2019.zip")),
        vec![
            ("msg.eml".to_string(), dated_message(DATE_2019)),
            ("msg (1).eml".to_string(), dated_message(DATE_2019_LATE)),
        ],
        "both payloads must persist, the later one under a numbered name"
    );
}

// --- Dry run ---

#[test]
fn dry_run_writes_and_deletes_nothing() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp).with_dry_run(true);
    let dated = write_file(&options.source_dir, "dated.eml", &dated_message(DATE_2019));
    let undated = write_file(&options.source_dir, "undated.eml", &undated_message());

    let reporter = RecordingReporter::default();
    let summary = Archiver::new(options.clone(), &reporter).run().unwrap();

    assert_eq!(summary.steps, 2);
    assert_eq!(summary.archived, 1, "the dry run still counts would-be archives");
    assert_eq!(summary.skipped, 1);
    assert!(dated.exists(), "dry runs must not delete sources");
    assert!(undated.exists());
    assert!(
        !options.archive_dir.exists(),
        "dry runs must not create the archive directory, its lock, or any archive"
    );
    assert!(reporter.notices().iter().any(|n| matches!(
        n,
        Notice::WouldArchive { .. }
    )));
}

// --- Failure handling ---

#[test]
fn failed_archive_open_keeps_source_and_counts_failure() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let dated = write_file(&options.source_dir, "dated.eml", &dated_message(DATE_2019));

    // occupy the archive path with a directory so opening it must fail
    fs::create_dir_all(options.archive_dir.join("2019.zip")).unwrap();

    let reporter = RecordingReporter::default();
    let summary = Archiver::new(options.clone(), &reporter).run().unwrap();

    assert_eq!(summary.archived, 0);
    assert_eq!(summary.failed, 1);
    assert!(
        dated.exists(),
        "a source file must never be removed when its entry was not written"
    );
    assert!(reporter.notices().iter().any(|n| matches!(
        n,
        Notice::WriteFailed { .. }
    )));
}

#[test]
fn vanished_file_is_reported_and_skipped_by_default() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let reporter = RecordingReporter::default();
    let archiver = Archiver::new(options.clone(), &reporter);
    let mut writers = YearWriters::default();
    let mut summary = ArchiveSummary::default();
    let ghost = options.source_dir.join("ghost.eml");

    archiver
        .process_message(&ghost, &mut writers, &mut summary)
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert!(matches!(
        reporter.notices().as_slice(),
        [Notice::ReadFailed { .. }]
    ));
}

#[test]
fn abort_read_failure_policy_returns_the_read_error() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp).with_read_failure(ReadFailurePolicy::Abort);
    let reporter = RecordingReporter::default();
    let archiver = Archiver::new(options.clone(), &reporter);
    let mut writers = YearWriters::default();
    let mut summary = ArchiveSummary::default();
    let ghost = options.source_dir.join("ghost.eml");

    let err = archiver
        .process_message(&ghost, &mut writers, &mut summary)
        .unwrap_err();

    assert!(
        matches!(err, Error::Archive(ArchiveError::ReadMessage { .. })),
        "got: {err}"
    );
    assert_eq!(summary.failed, 1, "the failure is counted before aborting");
}

// --- Run lock ---

#[test]
fn held_lock_aborts_the_run_before_any_write() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    let dated = write_file(&options.source_dir, "dated.eml", &dated_message(DATE_2019));
    fs::create_dir_all(&options.archive_dir).unwrap();
    let lock_path = options.archive_dir.join(LOCK_FILE_NAME);
    fs::write(&lock_path, b"").unwrap();

    let err = Archiver::new(options.clone(), &SilentReporter)
        .run()
        .unwrap_err();

    assert!(
        matches!(err, Error::Archive(ArchiveError::RunLocked { .. })),
        "got: {err}"
    );
    assert!(dated.exists(), "a locked-out run must not touch any source");
    assert!(
        !options.archive_dir.join("2019.zip").exists(),
        "a locked-out run must not create archives"
    );
    assert!(
        lock_path.exists(),
        "the foreign lock must be left for its owner to remove"
    );

    // after the holder releases it, the run goes through
    fs::remove_file(&lock_path).unwrap();
    let summary = Archiver::new(options.clone(), &SilentReporter).run().unwrap();
    assert_eq!(summary.archived, 1);
    assert!(!lock_path.exists(), "the lock is released at run end");
}

#[test]
fn run_lock_is_released_on_drop() {
    let tmp = TempDir::new().unwrap();
    let lock = RunLock::acquire(tmp.path()).unwrap();
    let path = tmp.path().join(LOCK_FILE_NAME);
    assert!(path.exists());

    let second = RunLock::acquire(tmp.path());
    assert!(second.is_err(), "the lock is exclusive while held");

    drop(lock);
    assert!(!path.exists(), "dropping the guard removes the lock file");
    let reacquired = RunLock::acquire(tmp.path());
    assert!(reacquired.is_ok());
}

// --- Reporter interaction ---

#[test]
fn reporter_sees_total_then_one_advance_per_entry() {
    let tmp = TempDir::new().unwrap();
    let options = setup(&tmp);
    write_file(&options.source_dir, "a.eml", &dated_message(DATE_2019));
    write_file(&options.source_dir, "b.eml", &undated_message());
    fs::create_dir(options.source_dir.join("subdir")).unwrap();

    let reporter = RecordingReporter::default();
    let summary = Archiver::new(options, &reporter).run().unwrap();

    assert_eq!(*reporter.begun.lock().unwrap(), vec![("archiving".to_string(), 3)]);
    assert_eq!(
        reporter.advances.load(Ordering::Relaxed),
        summary.steps,
        "every listed entry advances the task exactly once"
    );
}

// --- Internals ---

#[test]
fn year_writers_reuse_the_open_handle_per_year() {
    let tmp = TempDir::new().unwrap();
    let mut writers = YearWriters::default();
    let year = Year::new(2019);

    let writer = writers.get_or_open(tmp.path(), year).unwrap();
    writer.append("a.eml", b"a", Codec::Store).unwrap();
    let writer = writers.get_or_open(tmp.path(), year).unwrap();
    writer.append("b.eml", b"b", Codec::Store).unwrap();

    assert_eq!(writers.writers.len(), 1, "one open handle per year");
    writers.finish_all().unwrap();
    assert_eq!(entries_of(&tmp.path().join("2019.zip")).len(), 2);
}

#[test]
fn summary_is_clean_only_without_failures() {
    let mut summary = ArchiveSummary::default();
    assert!(summary.is_clean());
    summary.failed = 1;
    assert!(!summary.is_clean());
}

#[test]
fn entry_name_is_the_basename() {
    assert_eq!(entry_name(Path::new("/mail/inbox/msg.eml")), "msg.eml");
    assert_eq!(entry_name(Path::new("msg.eml")), "msg.eml");
}
