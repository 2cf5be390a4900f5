// Error model shared by every handle operation, plus OS error classification.
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    AlreadyExists,
    Permission,
    Invalidated,
    NotAFile,
    NotADirectory,
    DestinationNotDirectory,
    CrossDevice,
    StaleAfterMove,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    path: Option<PathBuf>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            path: None,
            hint: None,
            source: None,
        }
    }

    /// Wraps an OS error, classifying it with [`io_error_kind`].
    pub fn from_io(err: io::Error, path: impl AsRef<Path>) -> Self {
        Self::new(io_error_kind(&err))
            .with_path(path.as_ref())
            .with_source(err)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyExists => 4,
        ErrorKind::Permission => 5,
        ErrorKind::Invalidated => 6,
        ErrorKind::NotAFile => 7,
        ErrorKind::NotADirectory => 8,
        ErrorKind::DestinationNotDirectory => 9,
        ErrorKind::CrossDevice => 10,
        ErrorKind::StaleAfterMove => 11,
        ErrorKind::Io => 12,
    }
}

pub(crate) fn io_error_kind(err: &io::Error) -> ErrorKind {
    #[cfg(unix)]
    {
        let errno = err.raw_os_error().unwrap_or_default();
        if errno == libc::EXDEV {
            return ErrorKind::CrossDevice;
        }
        if errno == libc::EACCES || errno == libc::EPERM {
            return ErrorKind::Permission;
        }
        if errno == libc::ENOTEMPTY || errno == libc::EEXIST {
            return ErrorKind::AlreadyExists;
        }
    }
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        _ => ErrorKind::Io,
    }
}
