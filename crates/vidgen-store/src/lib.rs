//! JSON-document persistence for vidgen.
//!
//! A small document store over a directory tree: one JSON file per record,
//! written atomically (temp file + rename) so API readers never observe a
//! half-written document. Repositories wrap the store per entity, mirroring
//! the collection/document layout of a hosted document database.

pub mod client;
pub mod error;
pub mod locks;
pub mod videos;

pub use client::JsonStore;
pub use error::{StoreError, StoreResult};
pub use locks::LockRepository;
pub use videos::VideoRepository;
