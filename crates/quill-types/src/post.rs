use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::PostId;

/// Author label used when a commenter leaves the name blank.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A single blog entry.
///
/// `likes` only ever grows and `comments` is append-only. The `image`
/// reference is set at creation and never changed by an edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Build a fresh post from validated input: new id, zero likes, no comments.
    pub fn create(input: NewPost) -> Self {
        let now = Utc::now();
        Self {
            id: PostId::new(),
            title: input.title,
            content: input.content,
            image: input.image,
            likes: 0,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Increment the like counter by exactly one.
    pub fn like(&mut self) {
        self.likes = self.likes.saturating_add(1);
        self.touch();
    }

    /// Append a comment at the end of the thread.
    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
        self.touch();
    }

    /// Overwrite only the fields present in `patch`.
    pub fn apply(&mut self, patch: &PostPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if !patch.is_empty() {
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An annotation on a post. Comments keep insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(alias = "username")]
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a comment, falling back to [`ANONYMOUS_AUTHOR`] for a blank author.
    ///
    /// The text is stored as given; comments carry no content validation.
    pub fn new(author: Option<String>, text: impl Into<String>) -> Self {
        let author = author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
        Self {
            author,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Validated input for creating a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

impl NewPost {
    /// Trim and validate; title and content must be non-blank.
    pub fn new(
        title: impl AsRef<str>,
        content: impl AsRef<str>,
        image: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", title.as_ref())?,
            content: required("content", content.as_ref())?,
            image,
        })
    }
}

/// Partial edit of a post. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }

    /// Trim present fields and reject any that are blank.
    ///
    /// An edit may leave a field alone, but it cannot empty it.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self.title.map(|t| required("title", &t)).transpose()?,
            content: self.content.map(|c| required("content", &c)).transpose()?,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(value.to_string())
}
