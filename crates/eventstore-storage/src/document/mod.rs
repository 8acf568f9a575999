//! Embedded document store on top of redb
//!
//! The store is organised like a document database server:
//! - a client bound to a data directory,
//! - databases, one `.redb` file each,
//! - collections inside a database, each a documents table plus a time index.
//!
//! Documents are JSON objects keyed by a monotonically increasing id.

mod client;
mod collection;

pub use client::{DocumentClient, DocumentDatabase, DEFAULT_DATA_DIR};
pub use collection::{CodecOptions, Collection, BATCH_SIZE};
