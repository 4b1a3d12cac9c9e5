use std::io;
use thiserror::Error;

/// Errors that can occur when working with a pskv file
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors when reading/writing to disk
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file header is not a pskv header this build understands
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A page body could not be parsed; the page stays unusable until repaired
    #[error("corrupt page: {0}")]
    CorruptPage(String),

    /// Key or value length does not fit the 2 byte length fields
    #[error("key ({key_len} bytes) or value ({value_len} bytes) exceeds 65535 bytes")]
    KeyOrValueTooLarge { key_len: usize, value_len: usize },

    /// Fewer bytes were available than a record header declared
    #[error("truncated record: needed {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    /// Serialized page contents exceed the page size
    #[error("page overflow: {needed} bytes needed, page size is {page_size}")]
    PageOverflow { needed: usize, page_size: usize },

    /// The target page cannot take the record. Absorbed by a resize.
    #[error("page full")]
    PageFull,

    /// The record cannot fit even in an empty page
    #[error("record of {record_len} bytes cannot fit in a page of {page_size} bytes")]
    RecordTooLargeForPage { record_len: usize, page_size: usize },

    /// Building the grown file failed; the original file is untouched
    #[error("resize failed: {0}")]
    ResizeFailed(#[source] Box<Error>),

    /// Page count would not fit in the header's 2 byte field
    #[error("page count {0} exceeds the format limit of 65535")]
    PageCountOverflow(u32),

    /// Invalid configuration values
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps any error raised while building a grown image.
    pub(crate) fn resize_failed(err: Error) -> Self {
        match err {
            Error::ResizeFailed(_) => err,
            other => Error::ResizeFailed(Box::new(other)),
        }
    }
}
