//! HTTP server for the Quill blog.
//!
//! Serves the post API (list, create, edit, delete, like, comment), a
//! single-admin login that issues session tokens, and uploaded images.
//! Which writes need a session is decided by [`AccessPolicy`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod policy;
pub mod posts;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod upload;

pub use auth::{Authorized, Caller, CredentialVerifier, StaticCredentials, SESSION_HEADER};
pub use config::{AdminCredentials, ServerConfig, StorageBackend};
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use policy::{AccessPolicy, GatedOperation, Operation};
pub use server::QuillServer;
pub use session::{InMemorySessionStore, SessionStore, SessionToken};
pub use state::AppState;
pub use upload::UploadStore;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use quill_store::{InMemoryPostStore, PostStore, StoreError, StoreResult};
    use quill_types::{Comment, Post, PostId, PostPatch};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "quill-test-boundary";

    struct TestApp {
        router: Router,
        _dir: tempfile::TempDir,
    }

    fn test_config(dir: &tempfile::TempDir, policy: AccessPolicy) -> ServerConfig {
        ServerConfig {
            storage: StorageBackend::Memory,
            upload_dir: dir.path().join("uploads"),
            max_upload_bytes: 64 * 1024,
            admin: AdminCredentials {
                username: "admin".into(),
                password: "hunter2".into(),
            },
            policy,
            ..ServerConfig::default()
        }
    }

    fn test_app(policy: AccessPolicy) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let server = QuillServer::new(test_config(&dir, policy)).unwrap();
        TestApp {
            router: server.router(),
            _dir: dir,
        }
    }

    /// Memory store whose inserts fail as if the disk were full.
    #[derive(Default)]
    struct FailingInsertStore(InMemoryPostStore);

    impl PostStore for FailingInsertStore {
        fn insert(&self, _post: &Post) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("no space left on device")))
        }
        fn get(&self, id: &PostId) -> StoreResult<Option<Post>> {
            self.0.get(id)
        }
        fn list(&self) -> StoreResult<Vec<Post>> {
            self.0.list()
        }
        fn like(&self, id: &PostId) -> StoreResult<Option<Post>> {
            self.0.like(id)
        }
        fn comment(&self, id: &PostId, comment: Comment) -> StoreResult<Option<Post>> {
            self.0.comment(id, comment)
        }
        fn update(&self, id: &PostId, patch: &PostPatch) -> StoreResult<Option<Post>> {
            self.0.update(id, patch)
        }
        fn delete(&self, id: &PostId) -> StoreResult<bool> {
            self.0.delete(id)
        }
    }

    impl TestApp {
        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Value,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(token) = token {
                req = req.header(SESSION_HEADER, token);
            }
            self.send(req.body(Body::from(body.to_string())).unwrap()).await
        }

        async fn empty(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(SESSION_HEADER, token);
            }
            self.send(req.body(Body::empty()).unwrap()).await
        }

        async fn login(&self) -> String {
            let (status, body) = self
                .json(
                    Method::POST,
                    "/login",
                    None,
                    json!({ "username": "admin", "password": "hunter2" }),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }

        async fn create(&self, token: &str, title: &str, content: &str) -> Value {
            let (status, body) = self
                .json(
                    Method::POST,
                    "/posts",
                    Some(token),
                    json!({ "title": title, "content": content }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body
        }

        async fn list(&self) -> Vec<Value> {
            let (status, body) = self.empty(Method::GET, "/posts", None).await;
            assert_eq!(status, StatusCode::OK);
            body.as_array().unwrap().clone()
        }
    }

    fn multipart_body(title: &str, content: &str, image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in [("title", title), ("content", content)] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(token: &str, body: Vec<u8>) -> Request<Body> {
        multipart_request_as(Some(token), body)
    }

    fn multipart_request_as(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut req = Request::builder().method(Method::POST).uri("/posts");
        if let Some(token) = token {
            req = req.header(SESSION_HEADER, token);
        }
        req.header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Service endpoints
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_app(AccessPolicy::default());
        let (status, body) = app.empty(Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let app = test_app(AccessPolicy::default());
        let (status, body) = app.empty(Method::GET, "/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["posts"], 0);
        assert_eq!(body["auth_required"], json!(["create", "edit", "delete"]));
    }

    // -----------------------------------------------------------------------
    // Login / logout
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn login_with_valid_pair_returns_token() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        assert_eq!(token.len(), 64);
    }

    #[tokio::test]
    async fn login_with_wrong_pair_is_unauthorized() {
        let app = test_app(AccessPolicy::default());
        for (user, pass) in [("admin", "nope"), ("root", "hunter2"), ("", "")] {
            let (status, body) = app
                .json(Method::POST, "/login", None, json!({ "username": user, "password": pass }))
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["message"], "invalid username or password");
        }
    }

    #[tokio::test]
    async fn malformed_login_body_is_bad_request() {
        let app = test_app(AccessPolicy::default());
        let (status, body) = app
            .json(Method::POST, "/login", None, json!({ "username": "admin" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn logout_revokes_session() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let (status, _) = app.empty(Method::POST, "/logout", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .json(Method::POST, "/posts", Some(&token), json!({ "title": "a", "content": "b" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_token_is_accepted() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/posts")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(json!({ "title": "a", "content": "b" }).to_string()))
            .unwrap();
        let (status, _) = app.send(req).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // -----------------------------------------------------------------------
    // Create / list
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_without_session_is_unauthorized() {
        let app = test_app(AccessPolicy::default());
        let (status, body) = app
            .json(Method::POST, "/posts", None, json!({ "title": "a", "content": "b" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].as_str().unwrap().contains("login required"));

        let (status, _) = app
            .json(Method::POST, "/posts", Some("forged"), json!({ "title": "a", "content": "b" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.list().await.is_empty());
    }

    #[tokio::test]
    async fn anonymous_writes_are_rejected_before_the_body_is_read() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        // No content type and no body.
        let (status, body) = app.empty(Method::POST, "/posts", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].as_str().unwrap().contains("login required"));

        // Body that would not deserialize into a patch.
        let (status, _) = app
            .json(Method::PUT, &format!("/posts/{id}"), None, json!({ "title": 5 }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Upload larger than the body limit.
        let big = vec![b'x'; 128 * 1024];
        let body = multipart_body("Big", "Too big", Some(("big.bin", &big)));
        let (status, _) = app.send(multipart_request_as(None, body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Malformed id on a gated route.
        let (status, _) = app.empty(Method::DELETE, "/posts/p1", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(app.list().await.len(), 1);
    }

    #[tokio::test]
    async fn create_then_list_includes_new_post() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let created = app.create(&token, "Hello", "World").await;
        assert_eq!(created["likes"], 0);
        assert_eq!(created["comments"], json!([]));

        let posts = app.list().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["_id"], created["_id"]);
        assert_eq!(posts[0]["title"], "Hello");
    }

    #[tokio::test]
    async fn create_with_blank_field_is_bad_request() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let (status, body) = app
            .json(Method::POST, "/posts", Some(&token), json!({ "title": " ", "content": "b" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "title is required");

        let (status, _) = app
            .json(Method::POST, "/posts", Some(&token), json!({ "title": "a" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_keeps_creation_order() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        for title in ["one", "two", "three"] {
            app.create(&token, title, "body").await;
        }
        let titles: Vec<Value> = app.list().await.into_iter().map(|p| p["title"].clone()).collect();
        assert_eq!(titles, [json!("one"), json!("two"), json!("three")]);
    }

    #[tokio::test]
    async fn get_single_post() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let created = app.create(&token, "Hello", "World").await;
        let id = created["_id"].as_str().unwrap();

        let (status, body) = app.empty(Method::GET, &format!("/posts/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, created);
    }

    // -----------------------------------------------------------------------
    // Uploads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn multipart_create_stores_and_serves_image() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let body = multipart_body("Pic", "With image", Some(("cat.PNG", b"png-bytes")));
        let (status, post) = app.send(multipart_request(&token, body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["title"], "Pic");

        let image = post["image"].as_str().unwrap();
        assert!(image.starts_with("uploads/"));
        assert!(image.ends_with(".png"));

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(format!("/{image}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");
    }

    #[tokio::test]
    async fn multipart_create_without_file_has_no_image() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let body = multipart_body("Plain", "No image", Some(("", b"")));
        let (status, post) = app.send(multipart_request(&token, body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(post.get("image").is_none());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let big = vec![b'x'; 128 * 1024];
        let body = multipart_body("Big", "Too big", Some(("big.bin", &big)));
        let (status, _) = app.send(multipart_request(&token, body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.list().await.is_empty());
    }

    #[tokio::test]
    async fn failed_post_save_keeps_uploaded_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, AccessPolicy::only(&[]));
        let upload_dir = config.upload_dir.clone();
        let state = AppState::with_store(config, Arc::new(FailingInsertStore::default()));
        let app = TestApp {
            router: QuillServer::with_state(state).router(),
            _dir: dir,
        };

        let body = multipart_body("Pic", "With image", Some(("cat.png", b"png-bytes")));
        let (status, body) = app.send(multipart_request_as(None, body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");

        let files: Vec<_> = std::fs::read_dir(&upload_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"png-bytes");
        assert!(app.list().await.is_empty());
    }

    // -----------------------------------------------------------------------
    // Like / comment / edit / delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn like_increments_by_one_without_login() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let (status, body) = app.empty(Method::POST, &format!("/posts/{id}/like"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["likes"], 1);
        assert_eq!(app.list().await[0]["likes"], 1);
    }

    #[tokio::test]
    async fn like_can_be_gated_by_policy() {
        let app = test_app(AccessPolicy::locked());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let (status, _) = app.empty(Method::POST, &format!("/posts/{id}/like"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app
            .empty(Method::POST, &format!("/posts/{id}/like"), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn concurrent_likes_converge() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let router = app.router.clone();
                let uri = format!("/posts/{id}/like");
                tokio::spawn(async move {
                    let req = Request::builder()
                        .method(Method::POST)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap();
                    router.oneshot(req).await.unwrap().status()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }
        assert_eq!(app.list().await[0]["likes"], 50);
    }

    #[tokio::test]
    async fn comments_append_in_order() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();
        let uri = format!("/posts/{id}/comment");

        app.json(Method::POST, &uri, None, json!({ "author": "a", "text": "first" })).await;
        let (status, body) = app
            .json(Method::POST, &uri, None, json!({ "username": "b", "text": "second" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let comments = body["comments"].as_array().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0]["author"], "a");
        assert_eq!(comments[0]["text"], "first");
        assert_eq!(comments[1]["author"], "b");
        assert_eq!(comments[1]["text"], "second");
    }

    #[tokio::test]
    async fn comment_without_text_is_stored_as_given() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let (status, body) = app
            .json(Method::POST, &format!("/posts/{id}/comment"), None, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comments"][0]["author"], "Anonymous");
        assert_eq!(body["comments"][0]["text"], "");
    }

    #[tokio::test]
    async fn edit_requires_session_and_patches_fields() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();
        let uri = format!("/posts/{id}");

        let (status, _) = app.json(Method::PUT, &uri, None, json!({ "title": "x" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .json(Method::PUT, &uri, Some(&token), json!({ "title": "Edited" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Edited");
        assert_eq!(body["content"], "World");

        let (status, _) = app
            .json(Method::PUT, &uri, Some(&token), json!({ "content": "" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_requires_session() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let (status, _) = app.empty(Method::DELETE, &format!("/posts/{id}"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.list().await.len(), 1);
    }

    #[tokio::test]
    async fn deleted_post_is_gone_everywhere() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let id = app.create(&token, "Hello", "World").await["_id"].as_str().unwrap().to_string();

        let (status, body) = app
            .empty(Method::DELETE, &format!("/posts/{id}"), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Post deleted");
        assert!(app.list().await.is_empty());

        let (status, _) = app.empty(Method::POST, &format!("/posts/{id}/like"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .json(Method::POST, &format!("/posts/{id}/comment"), None, json!({ "text": "hi" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .json(Method::PUT, &format!("/posts/{id}"), Some(&token), json!({ "title": "x" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .empty(Method::DELETE, &format!("/posts/{id}"), Some(&token))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let app = test_app(AccessPolicy::default());
        let (status, body) = app.empty(Method::POST, "/posts/p1/like", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "post not found: p1");
    }

    #[tokio::test]
    async fn hello_world_scenario() {
        let app = test_app(AccessPolicy::default());
        let token = app.login().await;
        let created = app.create(&token, "Hello", "World").await;
        let id = created["_id"].as_str().unwrap().to_string();
        assert_eq!(created["likes"], 0);

        let (_, liked) = app.empty(Method::POST, &format!("/posts/{id}/like"), None).await;
        assert_eq!(liked["likes"], 1);

        let (_, commented) = app
            .json(
                Method::POST,
                &format!("/posts/{id}/comment"),
                None,
                json!({ "author": "Guest", "text": "Nice!" }),
            )
            .await;
        assert_eq!(commented["comments"][0]["author"], "Guest");
        assert_eq!(commented["comments"][0]["text"], "Nice!");

        app.empty(Method::DELETE, &format!("/posts/{id}"), Some(&token)).await;
        let (status, _) = app.empty(Method::POST, &format!("/posts/{id}/like"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
