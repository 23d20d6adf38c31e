use std::convert::Infallible;
use std::marker::PhantomData;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::config::AdminCredentials;
use crate::error::{ApiError, ServerResult};
use crate::policy::GatedOperation;
use crate::session::SessionToken;
use crate::state::AppState;

/// Header the browser front-ends send the session token in.
pub const SESSION_HEADER: &str = "session-token";

/// Checks a username/password pair.
///
/// Handlers only see this trait, so hashed or external credential stores
/// can replace [`StaticCredentials`] without touching the API.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> ServerResult<bool>;
}

/// One configured credential pair, compared in clear text.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl From<&AdminCredentials> for StaticCredentials {
    fn from(admin: &AdminCredentials) -> Self {
        Self::new(admin.username.clone(), admin.password.clone())
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> ServerResult<bool> {
        // An unset password never matches, even an empty submission.
        if self.password.is_empty() {
            return Ok(false);
        }
        Ok(username == self.username && password == self.password)
    }
}

/// Session token presented with a request, from `Session-Token` or
/// `Authorization: Bearer`.
pub fn presented_token(headers: &HeaderMap) -> Option<SessionToken> {
    let from_session_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    let from_bearer = || {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    };
    from_session_header
        .filter(|t| !t.is_empty())
        .or_else(|| from_bearer().filter(|t| !t.is_empty()))
        .map(SessionToken::new)
}

/// The raw token on a request, validated or not. Used by logout.
#[derive(Clone, Debug)]
pub struct PresentedToken(pub Option<SessionToken>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PresentedToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(presented_token(&parts.headers)))
    }
}

/// Who is making a request.
#[derive(Clone, Debug)]
pub enum Caller {
    /// Holds a live session.
    Admin(SessionToken),
    /// No token, or one the session store does not recognise.
    Anonymous,
}

impl Caller {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Admin(_))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = presented_token(&parts.headers) else {
            return Ok(Self::Anonymous);
        };
        if state.sessions.validate(&token).await? {
            Ok(Self::Admin(token))
        } else {
            Ok(Self::Anonymous)
        }
    }
}

/// A caller allowed to perform `O` under the configured policy.
///
/// Rejects with [`ApiError::Auth`] from the request head, so a gated route
/// never reads or parses the body of an unauthorized request.
#[derive(Debug)]
pub struct Authorized<O> {
    pub caller: Caller,
    _op: PhantomData<O>,
}

#[async_trait]
impl<O: GatedOperation> FromRequestParts<AppState> for Authorized<O> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        state.authorize(O::OPERATION, &caller)?;
        Ok(Self {
            caller,
            _op: PhantomData,
        })
    }
}
