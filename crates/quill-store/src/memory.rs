use std::collections::HashMap;
use std::sync::RwLock;

use quill_types::{Comment, Post, PostId, PostPatch};

use crate::error::{StoreError, StoreResult};
use crate::traits::PostStore;

/// Insertion-ordered post index shared by the in-memory and file backends.
#[derive(Clone, Debug, Default)]
pub(crate) struct PostIndex {
    order: Vec<PostId>,
    posts: HashMap<PostId, Post>,
}

impl PostIndex {
    pub(crate) fn from_posts(posts: Vec<Post>) -> Result<Self, PostId> {
        let mut index = Self::default();
        for post in posts {
            index.insert(post)?;
        }
        Ok(index)
    }

    pub(crate) fn insert(&mut self, post: Post) -> Result<(), PostId> {
        if self.posts.contains_key(&post.id) {
            return Err(post.id);
        }
        self.order.push(post.id);
        self.posts.insert(post.id, post);
        Ok(())
    }

    pub(crate) fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id)
    }

    pub(crate) fn list(&self) -> Vec<Post> {
        self.order
            .iter()
            .filter_map(|id| self.posts.get(id))
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.posts.len()
    }

    /// Run `f` against one document and return its new state.
    pub(crate) fn modify(&mut self, id: &PostId, f: impl FnOnce(&mut Post)) -> Option<Post> {
        let post = self.posts.get_mut(id)?;
        f(post);
        Some(post.clone())
    }

    /// Overwrite a stored post with an earlier version of itself.
    pub(crate) fn replace(&mut self, post: Post) {
        if let Some(slot) = self.posts.get_mut(&post.id) {
            *slot = post;
        }
    }

    pub(crate) fn remove(&mut self, id: &PostId) -> bool {
        self.take(id).is_some()
    }

    /// Remove a post, returning it with its position in insertion order.
    pub(crate) fn take(&mut self, id: &PostId) -> Option<(usize, Post)> {
        let post = self.posts.remove(id)?;
        let position = self.order.iter().position(|existing| existing == id)?;
        self.order.remove(position);
        Some((position, post))
    }

    /// Put back a post removed by [`take`](Self::take).
    pub(crate) fn restore(&mut self, position: usize, post: Post) {
        self.order.insert(position.min(self.order.len()), post.id);
        self.posts.insert(post.id, post);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().filter_map(|id| self.posts.get(id))
    }
}

/// In-memory post store.
///
/// Intended for tests, demos, and `--memory` deployments. Data is lost when
/// the store is dropped.
#[derive(Default)]
pub struct InMemoryPostStore {
    index: RwLock<PostIndex>,
}

impl InMemoryPostStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every post.
    pub fn clear(&self) -> StoreResult<()> {
        *self.index.write().map_err(|_| StoreError::Poisoned)? = PostIndex::default();
        Ok(())
    }

    fn read_index(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, PostIndex>> {
        self.index.read().map_err(|_| StoreError::Poisoned)
    }

    fn write_index(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, PostIndex>> {
        self.index.write().map_err(|_| StoreError::Poisoned)
    }
}

impl PostStore for InMemoryPostStore {
    fn insert(&self, post: &Post) -> StoreResult<()> {
        self.write_index()?
            .insert(post.clone())
            .map_err(StoreError::DuplicateId)
    }

    fn get(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.read_index()?.get(id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Post>> {
        Ok(self.read_index()?.list())
    }

    fn like(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.write_index()?.modify(id, Post::like))
    }

    fn comment(&self, id: &PostId, comment: Comment) -> StoreResult<Option<Post>> {
        Ok(self.write_index()?.modify(id, |post| post.add_comment(comment)))
    }

    fn update(&self, id: &PostId, patch: &PostPatch) -> StoreResult<Option<Post>> {
        Ok(self.write_index()?.modify(id, |post| post.apply(patch)))
    }

    fn delete(&self, id: &PostId) -> StoreResult<bool> {
        Ok(self.write_index()?.remove(id))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read_index()?.len())
    }
}

impl std::fmt::Debug for InMemoryPostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.index.read().map(|i| i.len()).unwrap_or_default();
        f.debug_struct("InMemoryPostStore")
            .field("post_count", &count)
            .finish()
    }
}
