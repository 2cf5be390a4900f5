//! Purpose: Copy a file or a directory tree to a new location, best-effort.
//! Exports: `PasteReport`, `PasteEntry`, `PasteOutcome`.
//! Role: Backs `FileHandle::paste`; the source handle is never mutated.
//! Invariants: Directory walks continue past per-file failures and record them.
//! Invariants: Destination directories are created lazily, one segment at a time.
//! Invariants: A destination nested inside the source tree is never walked.
//! Invariants: No file is ever copied onto itself; symlinked entries are followed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::core::handle::Entry;
use crate::core::path::normalize_slashes;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PasteOutcome {
    Copied { bytes: u64 },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PasteEntry {
    /// Path relative to the source root, `/`-separated.
    pub relative_path: String,
    pub outcome: PasteOutcome,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PasteReport {
    pub source: String,
    pub destination: String,
    pub entries: Vec<PasteEntry>,
}

impl PasteReport {
    fn new(source: &str, destination: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn copied(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, PasteOutcome::Copied { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.copied()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PasteEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, PasteOutcome::Failed { .. }))
    }

    fn record(&mut self, relative_path: String, result: Result<u64, Error>) {
        let outcome = match result {
            Ok(bytes) => PasteOutcome::Copied { bytes },
            Err(err) => {
                warn!(path = %relative_path, error = %err, "paste skipped file");
                PasteOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };
        self.entries.push(PasteEntry {
            relative_path,
            outcome,
        });
    }
}

/// Reads the whole source and writes it over `destination`. Any failure is
/// returned to the caller; a partially written destination is left as is.
pub(crate) fn paste_file(source: &Entry, destination: &str) -> Result<PasteReport, Error> {
    let bytes = fs::read(&source.path).map_err(|err| Error::from_io(err, &source.path))?;
    fs::write(destination, &bytes).map_err(|err| Error::from_io(err, destination))?;
    debug!(from = %source.path, to = %destination, bytes = bytes.len(), "pasted file");

    let mut report = PasteReport::new(&source.path, destination);
    report.record(source.name.clone(), Ok(bytes.len() as u64));
    Ok(report)
}

pub(crate) fn paste_tree(source: &Entry, destination: &str) -> Result<PasteReport, Error> {
    prepare_destination(destination)?;
    let root = Path::new(&source.path);
    if same_file(root, Path::new(destination)) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("destination is the source")
            .with_path(destination)
            .with_hint("Pick a destination outside the directory being copied."));
    }
    debug!(from = %source.path, to = %destination, "paste started");

    let skip = nested_destination(root, Path::new(destination));
    let mut report = PasteReport::new(&source.path, destination);

    let walk = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|item| skip.as_deref() != Some(item.path()));
    for item in walk {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                let relative = err
                    .path()
                    .map(|path| relative_display(root, path))
                    .unwrap_or_default();
                let kind = err.io_error().map(io_error_kind).unwrap_or(ErrorKind::Io);
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                report.record(
                    relative,
                    Err(Error::new(kind).with_path(path).with_source(err)),
                );
                continue;
            }
        };
        if item.file_type().is_dir() {
            continue;
        }
        let relative = match item.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };
        let target = Path::new(destination).join(&relative);
        let result = copy_one(item.path(), &target);
        report.record(normalize_slashes(&relative.to_string_lossy()), result);
    }

    debug!(
        copied = report.copied(),
        failed = report.failed(),
        "paste finished"
    );
    Ok(report)
}

fn prepare_destination(destination: &str) -> Result<(), Error> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::new(ErrorKind::DestinationNotDirectory)
            .with_message("destination exists and is not a directory")
            .with_path(destination)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(destination).map_err(|err| Error::from_io(err, destination))
        }
        Err(err) => Err(Error::from_io(err, destination)),
    }
}

// Entry path under `root` that corresponds to `destination` when the
// destination lives inside the source tree.
fn nested_destination(root: &Path, destination: &Path) -> Option<PathBuf> {
    let root_canon = fs::canonicalize(root).ok()?;
    let dest_canon = fs::canonicalize(destination).ok()?;
    let inner = dest_canon.strip_prefix(&root_canon).ok()?;
    if inner.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(inner))
}

fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normalize_slashes(&relative.to_string_lossy())
}

// Both paths resolve to the same inode (or the same canonical path off unix).
fn same_file(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (fs::metadata(a), fs::metadata(b)) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn copy_one(source: &Path, target: &Path) -> Result<u64, Error> {
    // an aliased target would be truncated before it is read
    if same_file(source, target) {
        return Err(Error::new(ErrorKind::AlreadyExists)
            .with_message(format!("target is the same file as {}", source.display()))
            .with_path(target));
    }
    ensure_parent_dirs(target)?;
    fs::copy(source, target).map_err(|err| {
        Error::from_io(err, target).with_message(format!("copy from {} failed", source.display()))
    })
}

fn ensure_parent_dirs(target: &Path) -> Result<(), Error> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    let mut current = PathBuf::new();
    for component in parent.components() {
        current.push(component);
        if current.is_dir() {
            continue;
        }
        match fs::create_dir(&current) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && current.is_dir() => {}
            Err(err) => return Err(Error::from_io(err, &current)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{PasteOutcome, ensure_parent_dirs, nested_destination};
    use crate::core::error::ErrorKind;
    use crate::core::handle::FileHandle;
    use std::fs;
    use std::path::Path;

    fn path_str(path: &Path) -> String {
        path.to_str().expect("utf8 path").to_string()
    }

    #[test]
    fn parent_dirs_are_created_once_and_tolerate_existing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a").join("b").join("c.txt");
        ensure_parent_dirs(&target).expect("first");
        ensure_parent_dirs(&target).expect("second");
        assert!(dir.path().join("a").join("b").is_dir());
        assert!(!target.exists());
    }

    #[test]
    fn parent_segment_that_is_a_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a"), b"file").expect("write");
        let err = ensure_parent_dirs(&dir.path().join("a").join("c.txt")).expect_err("blocked");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn file_paste_overwrites_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"fresh").expect("write src");
        fs::write(&dst, b"stale contents").expect("write dst");

        let handle = FileHandle::open(path_str(&src)).expect("open");
        let report = handle.paste(&path_str(&dst)).expect("paste");
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].relative_path, "src.txt");
        assert_eq!(report.entries[0].outcome, PasteOutcome::Copied { bytes: 5 });
        assert_eq!(fs::read(&dst).expect("read"), b"fresh");
    }

    #[test]
    fn file_paste_into_missing_parent_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.txt");
        fs::write(&src, b"x").expect("write");
        let handle = FileHandle::open(path_str(&src)).expect("open");
        let err = handle
            .paste(&path_str(&dir.path().join("nope").join("dst.txt")))
            .expect_err("missing parent");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn nested_destination_is_detected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inner = dir.path().join("backup");
        fs::create_dir(&inner).expect("mkdir");
        assert_eq!(nested_destination(dir.path(), &inner), Some(inner.clone()));
        assert_eq!(nested_destination(dir.path(), dir.path()), None);

        let other = tempfile::tempdir().expect("other");
        assert_eq!(nested_destination(dir.path(), other.path()), None);
    }

    #[test]
    fn tree_paste_into_own_subdirectory_terminates() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let handle = FileHandle::open(path_str(dir.path())).expect("open");

        let dest = dir.path().join("copy");
        let report = handle.paste(&path_str(&dest)).expect("paste");
        assert!(report.is_complete());
        assert_eq!(report.copied(), 1);
        assert_eq!(fs::read(dest.join("a.txt")).expect("read"), b"a");
        assert!(!dest.join("copy").exists());
    }

    #[test]
    fn tree_paste_onto_itself_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir(&src).expect("mkdir");
        fs::write(src.join("a.txt"), b"precious data").expect("write");
        let handle = FileHandle::open(path_str(&src)).expect("open");

        let err = handle.paste(&path_str(&src)).expect_err("self paste");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(fs::read(src.join("a.txt")).expect("read"), b"precious data");

        let alias = format!("{}/./", path_str(&src));
        let err = handle.paste(&alias).expect_err("aliased self paste");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(fs::read(src.join("a.txt")).expect("read"), b"precious data");
    }

    #[cfg(unix)]
    #[test]
    fn hard_linked_target_is_left_intact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::create_dir(&src).expect("mkdir src");
        fs::create_dir(&dest).expect("mkdir dest");
        fs::write(src.join("a.txt"), b"shared").expect("write");
        fs::write(src.join("b.txt"), b"plain").expect("write");
        fs::hard_link(src.join("a.txt"), dest.join("a.txt")).expect("link");

        let handle = FileHandle::open(path_str(&src)).expect("open");
        let report = handle.paste(&path_str(&dest)).expect("paste");

        assert_eq!(report.copied(), 1);
        let failure = report.failures().next().expect("failure");
        assert_eq!(failure.relative_path, "a.txt");
        assert!(matches!(
            failure.outcome,
            PasteOutcome::Failed {
                kind: ErrorKind::AlreadyExists,
                ..
            }
        ));
        assert_eq!(fs::read(src.join("a.txt")).expect("read"), b"shared");
        assert_eq!(fs::read(dest.join("b.txt")).expect("read"), b"plain");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_copied_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("real")).expect("mkdir");
        fs::write(src.join("real").join("x.txt"), b"xyz").expect("write");
        std::os::unix::fs::symlink(src.join("real"), src.join("link")).expect("symlink");

        let handle = FileHandle::open(path_str(&src)).expect("open");
        let dest = dir.path().join("dest");
        let report = handle.paste(&path_str(&dest)).expect("paste");

        assert!(report.is_complete());
        assert_eq!(report.copied(), 2);
        assert_eq!(fs::read(dest.join("link").join("x.txt")).expect("read"), b"xyz");
        assert!(!fs::symlink_metadata(dest.join("link")).expect("meta").file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_reported_and_walk_continues() {
        use std::os::unix::fs::PermissionsExt;

        if unsafe { libc::geteuid() } == 0 {
            // root ignores mode bits
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir(&src).expect("mkdir");
        fs::write(src.join("locked.txt"), b"secret").expect("write");
        fs::write(src.join("open.txt"), b"public").expect("write");
        fs::set_permissions(src.join("locked.txt"), fs::Permissions::from_mode(0o000))
            .expect("chmod");

        let handle = FileHandle::open(path_str(&src)).expect("open");
        let dest = dir.path().join("dest");
        let report = handle.paste(&path_str(&dest)).expect("paste");

        assert_eq!(report.copied(), 1);
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().expect("failure");
        assert_eq!(failure.relative_path, "locked.txt");
        assert!(matches!(
            failure.outcome,
            PasteOutcome::Failed {
                kind: ErrorKind::Permission,
                ..
            }
        ));
        assert_eq!(fs::read(dest.join("open.txt")).expect("read"), b"public");
    }
}
