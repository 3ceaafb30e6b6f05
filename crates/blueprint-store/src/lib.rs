//! Persistent store collaborator for the Blueprint pipeline.
//!
//! A generic key/value store addressed by collection name. The supervisor uses
//! it for jobs, plans, per-task reports and verification reports; the
//! deterministic cache uses it for generated text.
//!
//! # Main types
//!
//! - [`DocumentStore`]: Trait for collection-scoped get/put/delete/list.
//! - [`InMemoryStore`]: Process-local store for tests and ephemeral runs.
//! - [`FileStore`]: JSON files on disk, one directory per collection.

/// Collection names used across the pipeline.
pub mod collections;
/// `DocumentStore` trait and implementations.
pub mod store;

pub use store::{get_json, put_json, DocumentStore, FileStore, InMemoryStore};
