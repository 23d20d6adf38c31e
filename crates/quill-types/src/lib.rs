//! Foundation types for the Quill blog.
//!
//! Every other Quill crate depends on `quill-types`. The types here carry
//! the data model only; storage and transport live elsewhere.
//!
//! # Key Types
//!
//! - [`PostId`] — UUID v7 post identifier, assigned at creation
//! - [`Post`] — a blog entry with likes and an append-only comment list
//! - [`Comment`] — an ordered annotation contributed by any caller
//! - [`NewPost`] — validated input for post creation
//! - [`PostPatch`] — partial edit of a post's title and/or content

pub mod error;
pub mod id;
pub mod post;

pub use error::{TypeError, ValidationError};
pub use id::PostId;
pub use post::{Comment, NewPost, Post, PostPatch, ANONYMOUS_AUTHOR};
