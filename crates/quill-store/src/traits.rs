use quill_types::{Comment, Post, PostId, PostPatch};

use crate::error::StoreResult;

/// Persistent collection of post documents.
///
/// All implementations must satisfy these invariants:
/// - An id identifies at most one post for the lifetime of the store.
/// - `list()` yields posts in insertion order.
/// - `like`, `comment`, and `update` are atomic per document: N concurrent
///   likes on one post raise its count by exactly N.
/// - Operations on an unknown id return `Ok(None)` / `Ok(false)`; `Err` is
///   reserved for backend failures.
pub trait PostStore: Send + Sync {
    /// Store a new post. Fails with `DuplicateId` if the id is taken.
    fn insert(&self, post: &Post) -> StoreResult<()>;

    /// Read a post by id.
    fn get(&self, id: &PostId) -> StoreResult<Option<Post>>;

    /// All posts, oldest first.
    fn list(&self) -> StoreResult<Vec<Post>>;

    /// Increment the like counter and return the updated post.
    fn like(&self, id: &PostId) -> StoreResult<Option<Post>>;

    /// Append a comment and return the updated post.
    fn comment(&self, id: &PostId, comment: Comment) -> StoreResult<Option<Post>>;

    /// Apply a (validated) patch and return the updated post.
    fn update(&self, id: &PostId, patch: &PostPatch) -> StoreResult<Option<Post>>;

    /// Remove a post permanently. Returns `true` if it existed.
    fn delete(&self, id: &PostId) -> StoreResult<bool>;

    /// Number of stored posts.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.list()?.len())
    }

    /// Returns `true` if no posts are stored.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
