use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use quill_types::{Comment, Post, PostId, PostPatch};
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::memory::PostIndex;
use crate::traits::PostStore;

/// File name of the document collection inside the data directory.
pub const POSTS_FILE: &str = "posts.json";

/// Post store persisted to a single JSON document file.
///
/// The whole collection is held in memory and rewritten after every
/// mutation: serialize to a temp file in the same directory, fsync, then
/// rename over the old file. Readers of the file therefore see either the
/// previous or the next collection, never a partial one.
pub struct JsonFilePostStore {
    path: PathBuf,
    index: RwLock<PostIndex>,
}

impl JsonFilePostStore {
    /// Open (or create) the collection at `<data_dir>/posts.json`.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Self::open_file(data_dir.join(POSTS_FILE))
    }

    /// Open the collection stored at an explicit file path.
    ///
    /// A missing file is an empty collection. A file that exists but does
    /// not decode is an error rather than being silently replaced.
    pub fn open_file(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let index = match fs::read(&path) {
            Ok(bytes) => decode(&path, &bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => PostIndex::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), posts = index.len(), "opened post collection");
        Ok(Self {
            path,
            index: RwLock::new(index),
        })
    }

    /// Path of the backing document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_index(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, PostIndex>> {
        self.index.read().map_err(|_| StoreError::Poisoned)
    }

    fn write_index(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, PostIndex>> {
        self.index.write().map_err(|_| StoreError::Poisoned)
    }

    /// Write the already-changed `index` to disk. If that fails, `undo`
    /// reverts the in-memory change so memory and file agree.
    ///
    /// Callers hold the write lock across the disk write, so concurrent
    /// mutations are serialized and none is lost.
    fn commit(&self, index: &mut PostIndex, undo: impl FnOnce(&mut PostIndex)) -> StoreResult<()> {
        if let Err(err) = self.persist(index) {
            undo(index);
            return Err(err);
        }
        Ok(())
    }

    /// Change one post in place and persist, restoring its previous version
    /// if the write fails.
    fn modify(&self, id: &PostId, f: impl FnOnce(&mut Post)) -> StoreResult<Option<Post>> {
        let mut index = self.write_index()?;
        let Some(previous) = index.get(id).cloned() else {
            return Ok(None);
        };
        let updated = index.modify(id, f);
        self.commit(&mut index, |index| index.replace(previous))?;
        Ok(updated)
    }

    fn persist(&self, index: &PostIndex) -> StoreResult<()> {
        let posts: Vec<&Post> = index.iter().collect();
        let bytes = serde_json::to_vec_pretty(&posts)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

fn decode(path: &Path, bytes: &[u8]) -> StoreResult<PostIndex> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(PostIndex::default());
    }
    let posts: Vec<Post> = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    PostIndex::from_posts(posts).map_err(|id| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("duplicate post id {id}"),
    })
}

impl PostStore for JsonFilePostStore {
    fn insert(&self, post: &Post) -> StoreResult<()> {
        let mut index = self.write_index()?;
        index.insert(post.clone()).map_err(StoreError::DuplicateId)?;
        self.commit(&mut index, |index| {
            index.remove(&post.id);
        })
    }

    fn get(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.read_index()?.get(id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Post>> {
        Ok(self.read_index()?.list())
    }

    fn like(&self, id: &PostId) -> StoreResult<Option<Post>> {
        self.modify(id, Post::like)
    }

    fn comment(&self, id: &PostId, comment: Comment) -> StoreResult<Option<Post>> {
        self.modify(id, |post| post.add_comment(comment))
    }

    fn update(&self, id: &PostId, patch: &PostPatch) -> StoreResult<Option<Post>> {
        self.modify(id, |post| post.apply(patch))
    }

    fn delete(&self, id: &PostId) -> StoreResult<bool> {
        let mut index = self.write_index()?;
        let Some((position, post)) = index.take(id) else {
            return Ok(false);
        };
        self.commit(&mut index, |index| index.restore(position, post))?;
        Ok(true)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read_index()?.len())
    }
}

impl std::fmt::Debug for JsonFilePostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.index.read().map(|i| i.len()).unwrap_or_default();
        f.debug_struct("JsonFilePostStore")
            .field("path", &self.path)
            .field("post_count", &count)
            .finish()
    }
}
