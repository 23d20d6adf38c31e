//! Post resource handlers.

use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use quill_types::{Comment, NewPost, Post, PostId, PostPatch};

use crate::auth::Authorized;
use crate::error::{ApiError, ApiResult};
use crate::handler::JsonBody;
use crate::policy::op;
use crate::state::AppState;

/// Image attached to a create request.
#[derive(Debug)]
pub enum ImageInput {
    /// File part of a multipart form.
    Upload { file_name: Option<String>, data: Bytes },
    /// Already-hosted image given by reference in a JSON body.
    Reference(String),
}

/// Unvalidated create request, from a multipart form or a JSON body.
#[derive(Debug, Default)]
pub struct CreatePostForm {
    pub title: String,
    pub content: String,
    pub image: Option<ImageInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreatePostJson {
    title: String,
    content: String,
    image: Option<String>,
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for CreatePostForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let JsonBody(body) = JsonBody::<CreatePostJson>::from_request(req, state).await?;
            return Ok(Self {
                title: body.title,
                content: body.content,
                image: body
                    .image
                    .filter(|r| !r.trim().is_empty())
                    .map(ImageInput::Reference),
            });
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = field.text().await?,
                "content" => form.content = field.text().await?,
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if !data.is_empty() {
                        form.image = Some(ImageInput::Upload { file_name, data });
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default, alias = "username")]
    pub author: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// An id that does not parse cannot name a stored post.
fn parse_id(raw: &str) -> ApiResult<PostId> {
    raw.parse().map_err(|_| ApiError::NotFound(raw.to_string()))
}

fn found<T>(id: &PostId, value: Option<T>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::NotFound(id.to_string()))
}

/// `GET /posts`
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.store(|posts| posts.list()).await?))
}

/// `GET /posts/:id`
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;
    let post = state.store(move |posts| posts.get(&id)).await?;
    Ok(Json(found(&id, post)?))
}

/// `POST /posts`
///
/// The image, if any, is written before the document. If the document save
/// then fails the file stays on disk; it is logged, not removed.
pub async fn create_post(
    State(state): State<AppState>,
    _auth: Authorized<op::Create>,
    form: CreatePostForm,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let mut input = NewPost::new(&form.title, &form.content, None)?;

    input.image = match form.image {
        Some(ImageInput::Upload { file_name, data }) => Some(
            state
                .uploads
                .save(file_name.as_deref(), &data)
                .await
                .map_err(|e| ApiError::Internal(format!("saving upload: {e}")))?,
        ),
        Some(ImageInput::Reference(reference)) => Some(reference),
        None => None,
    };

    let post = Post::create(input);
    let stored = post.clone();
    if let Err(err) = state.store(move |posts| posts.insert(&stored)).await {
        if let Some(image) = &post.image {
            tracing::warn!(image = %image, "upload left behind by failed post save");
        }
        return Err(err);
    }
    tracing::info!(id = %post.id, title = %post.title, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// `PUT /posts/:id`
pub async fn update_post(
    State(state): State<AppState>,
    _auth: Authorized<op::Edit>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<PostPatch>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;
    let patch = patch.validate()?;
    let post = state.store(move |posts| posts.update(&id, &patch)).await?;
    Ok(Json(found(&id, post)?))
}

/// `DELETE /posts/:id`
pub async fn delete_post(
    State(state): State<AppState>,
    _auth: Authorized<op::Delete>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !state.store(move |posts| posts.delete(&id)).await? {
        return Err(ApiError::NotFound(id.to_string()));
    }
    tracing::info!(id = %id, "post deleted");
    Ok(Json(json!({ "message": "Post deleted" })))
}

/// `POST /posts/:id/like`
pub async fn like_post(
    State(state): State<AppState>,
    _auth: Authorized<op::Like>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;
    let post = state.store(move |posts| posts.like(&id)).await?;
    Ok(Json(found(&id, post)?))
}

/// `POST /posts/:id/comment`
pub async fn comment_post(
    State(state): State<AppState>,
    _auth: Authorized<op::Comment>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;
    let comment = Comment::new(req.author, req.text);
    let post = state.store(move |posts| posts.comment(&id, comment)).await?;
    Ok(Json(found(&id, post)?))
}
