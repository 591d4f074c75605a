use libc::{EIO, ENOENT, EROFS};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Read-only filesystem")]
    ReadOnly,

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Downloader not installed: {0}")]
    DownloaderMissing(String),

    #[error("Track download failed: {0}")]
    TrackFailed(String),

    #[error("Post-processing failed: {0}")]
    PostProcessFailed(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errno for the FUSE boundary. Translation happens exactly once, there.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NotFound(_) => ENOENT,
            Error::ReadOnly => EROFS,
            _ => EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::NotFound("/x".into()).errno(), ENOENT);
        assert_eq!(Error::ReadOnly.errno(), EROFS);
        assert_eq!(Error::Catalog("timeout".into()).errno(), EIO);
        assert_eq!(Error::Internal("?".into()).errno(), EIO);
    }
}
