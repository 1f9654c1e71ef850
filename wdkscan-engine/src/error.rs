//! Error taxonomy for container access and scanning
//!
//! Failures are split by when they happen: `OpenError` covers everything that
//! can go wrong before the first record is produced, `ContainerError` covers
//! faults while the cursor walks pages. Library-level details (page types,
//! offsets, I/O kinds) are folded into these at the storage boundary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to open a container for reading
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("{}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{}: permission denied", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("{}: file is locked by another process", path.display())]
    Locked { path: PathBuf },

    #[error("{}: not a btree container: {reason}", path.display())]
    NotBTree { path: PathBuf, reason: String },

    #[error("{}: unsupported container: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    #[error("{}: no database named {name:?}", path.display())]
    NoSuchDatabase { path: PathBuf, name: String },

    #[error("{}: damaged database directory: {source}", path.display())]
    Damaged {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OpenError {
    /// Map an I/O error raised while opening `path`
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => OpenError::NotFound { path },
            io::ErrorKind::PermissionDenied => OpenError::PermissionDenied { path },
            _ => OpenError::Io { path, source: err },
        }
    }

    /// Path of the file that failed to open
    pub fn path(&self) -> &PathBuf {
        match self {
            OpenError::NotFound { path }
            | OpenError::PermissionDenied { path }
            | OpenError::Locked { path }
            | OpenError::NotBTree { path, .. }
            | OpenError::Unsupported { path, .. }
            | OpenError::NoSuchDatabase { path, .. }
            | OpenError::Damaged { path, .. }
            | OpenError::Io { path, .. } => path,
        }
    }
}

/// Fault while advancing the cursor through an open container
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("page {page}: {message}")]
    Corrupt { page: u32, message: String },

    #[error("I/O error reading page {page}: {source}")]
    Io {
        page: u32,
        #[source]
        source: io::Error,
    },
}

impl ContainerError {
    pub fn corrupt(page: u32, message: impl Into<String>) -> Self {
        ContainerError::Corrupt {
            page,
            message: message.into(),
        }
    }

    /// Page number the fault was detected on
    pub fn page(&self) -> u32 {
        match self {
            ContainerError::Corrupt { page, .. } | ContainerError::Io { page, .. } => *page,
        }
    }
}

/// Top-level error for a scan operation
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl Error {
    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Open(_) => 2,
            Error::Container(_) => 3,
        }
    }
}

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_mapping() {
        let err = OpenError::from_io("a.dat", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, OpenError::NotFound { .. }));

        let err = OpenError::from_io("a.dat", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, OpenError::PermissionDenied { .. }));

        let err = OpenError::from_io("a.dat", io::Error::from(io::ErrorKind::Interrupted));
        assert!(matches!(err, OpenError::Io { .. }));
        assert_eq!(err.path(), &PathBuf::from("a.dat"));
    }

    #[test]
    fn test_exit_codes() {
        let open: Error = OpenError::NotFound { path: "x".into() }.into();
        assert_eq!(open.exit_code(), 2);

        let fault: Error = ContainerError::corrupt(7, "bad item").into();
        assert_eq!(fault.exit_code(), 3);
        assert_eq!(fault.to_string(), "page 7: bad item");
    }
}
