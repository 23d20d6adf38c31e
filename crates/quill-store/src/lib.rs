//! Post document storage for the Quill blog.
//!
//! A post is a single document: title, content, optional image reference,
//! like counter, and comment thread. Stores keep whole documents and expose
//! per-document atomic mutations so concurrent likes and comments never
//! lose updates.
//!
//! # Storage Backends
//!
//! All backends implement the [`PostStore`] trait:
//!
//! - [`InMemoryPostStore`] -- `RwLock`-guarded index for tests and embedding
//! - [`JsonFilePostStore`] -- the same index persisted to one JSON document
//!   file, rewritten atomically after every mutation
//!
//! # Design Rules
//!
//! 1. `list()` returns posts in insertion order.
//! 2. Like, comment, and update are read-modify-write under a single write
//!    lock; the caller never sees a torn document.
//! 3. A mutation that fails to persist leaves the in-memory state unchanged.
//! 4. Delete is a hard delete; a deleted id is never reused.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::JsonFilePostStore;
pub use memory::InMemoryPostStore;
pub use traits::PostStore;
