//! A single-file key/value store backed by a memory-mapped, paged hash table.
//!
//! File layout: a 32 byte header inside slot 0, followed by `page_count`
//! fixed-size pages. A key lives on the page picked by [`bucket::page_number`];
//! collisions are packed into that page. When a page cannot take another
//! record the whole file is rebuilt with more pages.
//!
//! The raw mapping is not part of the public API; page windows alias the
//! mapped file and are only handed out by the table itself.
//!
//! ```compile_fail
//! use pskv::byte_store::MMapFile;
//! ```
pub mod bucket;
mod byte_store;
pub mod error;
pub mod hash_file;
pub mod header;
pub mod options;
pub mod page_layout;
pub mod page_store;
pub mod record;
pub mod resize;
pub mod store;

pub use error::{Error, Result};
pub use hash_file::HashTableFile;
pub use options::Options;
pub use page_store::{DeleteOutcome, PutOutcome};
pub use record::Record;
pub use store::SimpleKv;
