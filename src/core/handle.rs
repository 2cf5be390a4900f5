// File handle with cached metadata, in-place relocation, and explicit invalidation.
use std::fs::{self, Metadata};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::paste::{self, PasteReport};
use crate::core::path::{join, leaf_name, normalize_slashes, sibling, split_name, validate_leaf};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn of(meta: &Metadata) -> Self {
        if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Metadata captured when the handle was resolved. Never patched in place;
/// a relocation builds a fresh one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Entry {
    pub(crate) path: String,
    pub(crate) kind: EntryKind,
    pub(crate) size: u64,
    pub(crate) name: String,
}

impl Entry {
    fn from_metadata(path: String, name: String, meta: &Metadata) -> Self {
        let kind = EntryKind::of(meta);
        let size = match kind {
            EntryKind::File => meta.len(),
            EntryKind::Directory => 0,
        };
        Self {
            path,
            kind,
            size,
            name,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum HandleState {
    Live(Entry),
    Dead,
}

/// Serializable snapshot of a live handle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct HandleInfo {
    pub path: String,
    pub name: String,
    pub prefix: String,
    pub suffix: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// One filesystem path plus the metadata observed when it was last resolved.
///
/// Accessors are total: on a dead handle they return empty strings, `0` and
/// `false`. Every operation that touches the filesystem fails with
/// [`ErrorKind::Invalidated`] once the handle is dead.
///
/// Handles are not synchronized. Mutating methods take `&mut self`, so the
/// owner observes rename/move/remove in place; share a handle across threads
/// only behind a lock of your own.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileHandle {
    state: HandleState,
}

impl FileHandle {
    /// Resolves `path` against the filesystem. Fails if it does not exist.
    pub fn open(path: impl AsRef<str>) -> Result<Self, Error> {
        let path = normalize_slashes(path.as_ref());
        let meta = fs::metadata(&path).map_err(|err| Error::from_io(err, &path))?;
        let name = leaf_name(&path).to_string();
        debug!(path = %path, "opened handle");
        Ok(Self::live(Entry::from_metadata(path, name, &meta)))
    }

    fn live(entry: Entry) -> Self {
        Self {
            state: HandleState::Live(entry),
        }
    }

    fn entry(&self) -> Result<&Entry, Error> {
        match &self.state {
            HandleState::Live(entry) => Ok(entry),
            HandleState::Dead => Err(Error::new(ErrorKind::Invalidated)
                .with_message("handle was invalidated and cannot be used")),
        }
    }

    fn dir_entry(&self) -> Result<&Entry, Error> {
        let entry = self.entry()?;
        if entry.kind != EntryKind::Directory {
            return Err(Error::new(ErrorKind::NotADirectory)
                .with_message("path is not a directory")
                .with_path(&entry.path));
        }
        Ok(entry)
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.state, HandleState::Live(_))
    }

    pub fn kind(&self) -> Option<EntryKind> {
        match &self.state {
            HandleState::Live(entry) => Some(entry.kind),
            HandleState::Dead => None,
        }
    }

    pub fn path(&self) -> &str {
        match &self.state {
            HandleState::Live(entry) => &entry.path,
            HandleState::Dead => "",
        }
    }

    pub fn name(&self) -> &str {
        match &self.state {
            HandleState::Live(entry) => &entry.name,
            HandleState::Dead => "",
        }
    }

    /// `test.abc` gives `test`; dot-files give their whole name.
    pub fn prefix(&self) -> &str {
        split_name(self.name()).0
    }

    /// `test.abc` gives `.abc`; empty when there is no extension.
    pub fn suffix(&self) -> &str {
        split_name(self.name()).1
    }

    /// Byte length for files; directories report 0.
    pub fn size(&self) -> u64 {
        match &self.state {
            HandleState::Live(entry) => entry.size,
            HandleState::Dead => 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Some(EntryKind::Directory)
    }

    pub fn info(&self) -> Option<HandleInfo> {
        let HandleState::Live(entry) = &self.state else {
            return None;
        };
        let (prefix, suffix) = split_name(&entry.name);
        Some(HandleInfo {
            path: entry.path.clone(),
            name: entry.name.clone(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            kind: entry.kind,
            size: entry.size,
        })
    }

    /// Whole-file contents.
    pub fn read(&self) -> Result<Vec<u8>, Error> {
        let entry = self.entry()?;
        if entry.kind != EntryKind::File {
            return Err(Error::new(ErrorKind::NotAFile)
                .with_message("cannot read a directory")
                .with_path(&entry.path));
        }
        fs::read(&entry.path).map_err(|err| Error::from_io(err, &entry.path))
    }

    /// Lowercase hex SHA-256 of the file contents.
    pub fn digest(&self) -> Result<String, Error> {
        let bytes = self.read()?;
        let digest = Sha256::digest(&bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }

    /// Creates `name` (possibly nested) below this directory and returns a
    /// handle to it. Existing directories are not an error. `self` is unchanged.
    pub fn mkdir_all(&self, name: &str) -> Result<FileHandle, Error> {
        let entry = self.dir_entry()?;
        let target = join(&entry.path, &normalize_slashes(name));
        fs::create_dir_all(&target).map_err(|err| Error::from_io(err, &target))?;
        debug!(path = %target, "created directory");
        FileHandle::open(target)
    }

    /// Deletes the file or the whole directory tree, then invalidates the
    /// handle. On failure the handle stays live.
    pub fn remove(&mut self) -> Result<(), Error> {
        let entry = self.entry()?;
        let result = match entry.kind {
            EntryKind::Directory => fs::remove_dir_all(&entry.path),
            EntryKind::File => fs::remove_file(&entry.path),
        };
        result.map_err(|err| Error::from_io(err, &entry.path))?;
        debug!(path = %entry.path, "removed");
        self.invalidate();
        Ok(())
    }

    /// Renames within the parent directory. `new_name` must be a leaf name.
    pub fn rename(&mut self, new_name: &str) -> Result<(), Error> {
        let entry = self.entry()?;
        validate_leaf(new_name)?;
        let target = sibling(&entry.path, new_name);
        self.relocate(target)
    }

    /// Moves to an arbitrary destination. Cross-device moves are not emulated
    /// and fail with [`ErrorKind::CrossDevice`].
    pub fn move_to(&mut self, destination: &str) -> Result<(), Error> {
        self.entry()?;
        self.relocate(normalize_slashes(destination))
    }

    // If the OS rename succeeded but the new location cannot be resolved, the
    // handle no longer designates anything it can describe: it is invalidated
    // and StaleAfterMove is returned.
    fn relocate(&mut self, target: String) -> Result<(), Error> {
        let source = self.entry()?.path.clone();
        fs::rename(&source, &target).map_err(|err| {
            Error::from_io(err, &target).with_message(format!("cannot move {source} here"))
        })?;
        debug!(from = %source, to = %target, "relocated");
        let resolved = FileHandle::open(&target);
        self.adopt_relocated(target, resolved)
    }

    fn adopt_relocated(
        &mut self,
        target: String,
        resolved: Result<FileHandle, Error>,
    ) -> Result<(), Error> {
        match resolved {
            Ok(resolved) => {
                self.replace(resolved);
                Ok(())
            }
            Err(err) => {
                self.invalidate();
                Err(Error::new(ErrorKind::StaleAfterMove)
                    .with_message("moved, but the new location could not be resolved")
                    .with_path(target)
                    .with_source(err))
            }
        }
    }

    /// Copies this file or directory tree to `destination`. The handle itself
    /// is never changed.
    ///
    /// For a directory, per-file failures are recorded in the report and do
    /// not stop the walk; only setup failures are returned as `Err`.
    pub fn paste(&self, destination: &str) -> Result<PasteReport, Error> {
        let entry = self.entry()?;
        let destination = normalize_slashes(destination);
        match entry.kind {
            EntryKind::File => paste::paste_file(entry, &destination),
            EntryKind::Directory => paste::paste_tree(entry, &destination),
        }
    }

    /// Immediate children in unspecified order; sort if you need determinism.
    /// Entries whose names are not valid UTF-8 are skipped with a warning.
    pub fn children(&self) -> Result<Vec<FileHandle>, Error> {
        let entry = self.dir_entry()?;
        let listing = fs::read_dir(&entry.path).map_err(|err| Error::from_io(err, &entry.path))?;
        let mut children = Vec::new();
        for item in listing {
            let item = item.map_err(|err| Error::from_io(err, &entry.path))?;
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(dir = %entry.path, name = ?raw, "skipping child with non-UTF-8 name");
                    continue;
                }
            };
            let path = join(&entry.path, &name);
            let meta = item.metadata().map_err(|err| Error::from_io(err, &path))?;
            children.push(FileHandle::live(Entry::from_metadata(path, name, &meta)));
        }
        Ok(children)
    }

    /// Drops all cached state. Idempotent.
    pub fn invalidate(&mut self) {
        self.state = HandleState::Dead;
    }

    /// Takes over `other`'s full state, including a dead one.
    pub fn replace(&mut self, other: FileHandle) {
        self.state = other.state;
    }
}
