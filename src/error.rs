use crate::index::KeyType;
use thiserror::Error;

pub type IndexResult<T, E = IndexError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index file: {0}")]
    Corrupt(String),

    #[error("Key type mismatch: expected {expected}, found {found}")]
    KeyTypeMismatch { expected: KeyType, found: KeyType },

    #[error("Key of {len} bytes does not fit the {width} byte key slot")]
    KeyTooLong { len: usize, width: usize },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("B-tree is empty")]
    EmptyTree,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Maps a short read onto a format error so a truncated record is never
    /// mistaken for a transient I/O failure.
    pub(crate) fn from_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            IndexError::Corrupt(format!("truncated {}", what))
        } else {
            IndexError::Io(err)
        }
    }
}
