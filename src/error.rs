use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("store is closed")]
    AlreadyClosed,

    #[error("invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("out of space: page index space exhausted")]
    OutOfSpace,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FolioError>;
