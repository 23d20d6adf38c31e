use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::upload::UPLOADS_PREFIX;
use crate::{handler, posts};

/// Build the axum router with all Quill endpoints.
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads.dir());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let cors_allow_any = state.config.cors_allow_any;

    let router = Router::new()
        .route("/health", get(handler::health_handler))
        .route("/info", get(handler::info_handler))
        .route("/login", post(handler::login_handler))
        .route("/logout", post(handler::logout_handler))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/:id/like", post(posts::like_post))
        .route("/posts/:id/comment", post(posts::comment_post))
        .nest_service(&format!("/{UPLOADS_PREFIX}"), uploads)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
