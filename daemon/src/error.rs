//! Error types shared across the daemon

use std::io;
use thiserror::Error;

/// Why a single process-table entry could not be read.
///
/// These are per-candidate failures: the locator skips the entry and keeps
/// scanning, so none of them ever reach an HTTP client.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("process {0} vanished")]
    Vanished(u32),
    #[error("access denied reading process {0}")]
    AccessDenied(u32),
    #[error("process {0} is a zombie")]
    Zombie(u32),
    #[error("malformed {what} for process {pid}")]
    Malformed { pid: u32, what: &'static str },
    #[error("i/o error reading process {pid}: {source}")]
    Io {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl ReadError {
    pub(crate) fn from_io(pid: u32, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ReadError::Vanished(pid),
            io::ErrorKind::PermissionDenied => ReadError::AccessDenied(pid),
            _ => ReadError::Io { pid, source: err },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_candidate_failures() {
        let vanished = ReadError::from_io(7, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(vanished, ReadError::Vanished(7)));

        let denied = ReadError::from_io(7, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, ReadError::AccessDenied(7)));

        let other = ReadError::from_io(7, io::Error::from(io::ErrorKind::InvalidData));
        assert!(matches!(other, ReadError::Io { pid: 7, .. }));
    }
}
