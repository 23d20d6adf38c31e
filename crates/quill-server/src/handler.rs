use async_trait::async_trait;
use axum::extract::{FromRequest, Request, State};
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::PresentedToken;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let posts = state.store(|posts| posts.len()).await?;
    Ok(Json(json!({
        "name": "quill-server",
        "version": env!("CARGO_PKG_VERSION"),
        "posts": posts,
        "auth_required": state.config.policy.gated(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /login`: exchange the admin credentials for a session token.
pub async fn login_handler(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<Value>> {
    if !state.credentials.verify(&req.username, &req.password).await? {
        tracing::warn!(username = %req.username, "rejected login");
        return Err(ApiError::Auth("invalid username or password".into()));
    }
    let token = state.sessions.create().await?;
    tracing::info!(username = %req.username, "login succeeded");
    Ok(Json(json!({ "token": token })))
}

/// `POST /logout`: end the presented session. Succeeds even without one.
pub async fn logout_handler(
    State(state): State<AppState>,
    PresentedToken(token): PresentedToken,
) -> ApiResult<Json<Value>> {
    if let Some(token) = token {
        if state.sessions.revoke(&token).await? {
            tracing::info!("session ended");
        }
    }
    Ok(Json(json!({ "message": "Logged out" })))
}
