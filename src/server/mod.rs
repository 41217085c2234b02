//! HTTP service: the generation proxy and storage endpoints.

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::prompts::{PromptStore, SupabasePromptStore};
use crate::repository::DieselDbContext;
use crate::storage::{FileHost, FtpFileHost, ObjectStore, SupabaseStorage};
use crate::upstream::UpstreamClient;

/// Shared state for the web server.
///
/// Storage back ends are `None` when their credentials are absent; handlers
/// that need them answer with a configuration error.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub http: UpstreamClient,
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub file_host: Option<Arc<dyn FileHost>>,
    pub prompt_store: Option<Arc<dyn PromptStore>>,
    pub db: DieselDbContext,
}

impl AppState {
    pub fn new(settings: Settings, db: DieselDbContext) -> anyhow::Result<Self> {
        let http = UpstreamClient::new(&settings)?;

        let supabase = settings.supabase.credentials().ok();
        let object_store = supabase.as_ref().map(|c| {
            Arc::new(SupabaseStorage::new(http.inner().clone(), c)) as Arc<dyn ObjectStore>
        });
        let prompt_store = supabase.as_ref().map(|c| {
            Arc::new(SupabasePromptStore::new(http.inner().clone(), c)) as Arc<dyn PromptStore>
        });
        let file_host = settings
            .ftp
            .credentials()
            .ok()
            .map(|c| Arc::new(FtpFileHost::new(c)) as Arc<dyn FileHost>);

        Ok(Self {
            settings: Arc::new(settings),
            http,
            object_store,
            file_host,
            prompt_store,
            db,
        })
    }
}

/// Start the web server.
pub async fn serve(settings: Settings, bind: &str) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let db = DieselDbContext::new(&settings.database_url());
    db.init_schema().await?;

    let state = AppState::new(settings, db)?;
    for (name, present) in state.settings.presence() {
        if !present {
            info!("{} not set; routes that need it will report a configuration error", name);
        }
    }
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::prompts::store::prompt;
    use crate::prompts::MemoryPromptStore;
    use crate::storage::relocation::fakes::{MemoryFileHost, MemoryObjectStore};
    use crate::storage::ObjectPath;

    struct TestApp {
        state: AppState,
        _dir: tempfile::TempDir,
    }

    async fn setup(settings: Settings) -> TestApp {
        let dir = tempdir().unwrap();
        let db = DieselDbContext::from_path(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();
        let mut state = AppState::new(settings, db).unwrap();
        // Tests never reach real Supabase or FTP.
        state.object_store = None;
        state.file_host = None;
        state.prompt_store = None;
        TestApp { state, _dir: dir }
    }

    fn bare_settings() -> Settings {
        let mut settings = Settings::default();
        settings.kie.api_key = None;
        settings.seedream.api_key = None;
        settings.kling.access_key = None;
        settings.kling.secret_key = None;
        settings
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_options_answered_on_any_path() {
        let app = setup(bare_settings()).await;
        for uri in ["/api/kie/generate", "/api/ftp/transfer", "/no/such/path"] {
            let request = Request::builder()
                .method(Method::OPTIONS)
                .uri(uri)
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap();
            let response = create_router(app.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
                "*"
            );
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let app = setup(bare_settings()).await;
        for (method, uri) in [
            (Method::GET, "/api/kie/generate"),
            (Method::GET, "/api/ftp/upload"),
            (Method::POST, "/api/kie/status"),
            (Method::DELETE, "/api/kling/credits"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send_json(create_router(app.state.clone()), request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
            assert_eq!(body, json!({"error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let app = setup(bare_settings()).await;
        let (status, body) = send_json(create_router(app.state.clone()), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send_json(create_router(app.state.clone()), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_responses_carry_cors_header() {
        let app = setup(bare_settings()).await;
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        let response = create_router(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_status_requires_task_id() {
        let app = setup(bare_settings()).await;
        let (status, body) =
            send_json(create_router(app.state.clone()), get("/api/kie/status")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "taskId is required"}));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let app = setup(bare_settings()).await;
        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json("/api/kie/generate", json!({"prompt": "a cat"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "KIE.AI API key not configured");
        assert_eq!(body["details"], "Serverless function error");

        let (status, _) =
            send_json(create_router(app.state.clone()), get("/api/kling/credits")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn kie_settings(server: &MockServer) -> Settings {
        let mut settings = bare_settings();
        settings.kie.api_key = Some("kie-key".into());
        settings.kie.api_url = server.uri();
        settings
    }

    #[tokio::test]
    async fn test_kie_generate_routes_by_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/veo/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 200, "data": {"taskId": "veo_1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = setup(kie_settings(&server)).await;
        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json("/api/kie/generate", json!({"type": "video", "prompt": "waves"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["taskId"], "veo_1");
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs/createTask"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(json!({"code": 402, "msg": "no credits"})),
            )
            .mount(&server)
            .await;

        let app = setup(kie_settings(&server)).await;
        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json("/api/kie/image", json!({"model": "flux"})),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body, json!({"code": 402, "msg": "no credits"}));
    }

    #[tokio::test]
    async fn test_kie_status_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs/recordInfo"))
            .and(query_param("taskId", "img-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {
                    "state": "success",
                    "resultJson": "{\"resultUrls\":[\"https://cdn/x.png\"]}"
                }
            })))
            .mount(&server)
            .await;

        let app = setup(kie_settings(&server)).await;
        let (status, body) = send_json(
            create_router(app.state.clone()),
            get("/api/kie/status/img-9"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["state"], "success");
        assert_eq!(body["resultUrls"], json!(["https://cdn/x.png"]));
    }

    #[tokio::test]
    async fn test_ftp_upload_not_configured_reports_presence() {
        let mut settings = bare_settings();
        settings.ftp.host = Some("ftp.example.com".into());
        settings.ftp.user = None;
        let app = setup(settings).await;

        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json(
                "/api/ftp/upload",
                json!({"imageData": "aGVsbG8=", "username": "alice", "filename": "a.png"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "Serverless function error");
        assert_eq!(body["debug"]["FTP_HOST"], true);
        assert_eq!(body["debug"]["FTP_USER"], false);
        // Values are never echoed.
        assert!(!body.to_string().contains("ftp.example.com"));
    }

    #[tokio::test]
    async fn test_ftp_upload_with_fake_host() {
        let mut app = setup(bare_settings()).await;
        let host = Arc::new(MemoryFileHost::default());
        app.state.file_host = Some(host.clone());

        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json(
                "/api/ftp/upload",
                json!({
                    "imageData": "data:image/png;base64,aGVsbG8=",
                    "username": "alice",
                    "filename": "a.png"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["size"], 5);
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://img.test/user_pics/generated/alice/"));
        assert!(url.ends_with("/a.png"));
        assert_eq!(host.files.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ftp_upload_validation() {
        let mut app = setup(bare_settings()).await;
        app.state.file_host = Some(Arc::new(MemoryFileHost::default()));

        for body in [
            json!({"username": "alice", "filename": "a.png"}),
            json!({"imageData": "!!!", "username": "alice", "filename": "a.png"}),
            json!({"imageData": "aGVsbG8=", "username": "../x", "filename": "a.png"}),
        ] {
            let (status, resp) = send_json(
                create_router(app.state.clone()),
                post_json("/api/ftp/upload", body),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["success"], false);
        }
    }

    #[tokio::test]
    async fn test_ftp_transfer_moves_object() {
        let mut app = setup(bare_settings()).await;
        let source_path = ObjectPath::new("generated-images", "tmp/pic.png");
        let source = Arc::new(MemoryObjectStore::with_object(&source_path, b"PNG"));
        let host = Arc::new(MemoryFileHost::default());
        app.state.object_store = Some(source.clone());
        app.state.file_host = Some(host.clone());

        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json(
                "/api/ftp/transfer",
                json!({"path": "tmp/pic.png", "username": "bob"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["sourceDeleted"], true);
        assert!(body["url"].as_str().unwrap().ends_with("/pic.png"));
        assert!(!source.contains(&source_path));

        let intents = app.state.db.relocations().list(None, 10).await.unwrap();
        assert_eq!(intents.len(), 1);
    }

    #[tokio::test]
    async fn test_ftp_transfer_missing_source_is_404() {
        let mut app = setup(bare_settings()).await;
        app.state.object_store = Some(Arc::new(MemoryObjectStore::default()));
        app.state.file_host = Some(Arc::new(MemoryFileHost::default()));

        let (status, _) = send_json(
            create_router(app.state.clone()),
            post_json(
                "/api/ftp/transfer",
                json!({"path": "tmp/missing.png", "username": "bob"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_upload_generates_path() {
        let mut app = setup(bare_settings()).await;
        let store = Arc::new(MemoryObjectStore::default());
        app.state.object_store = Some(store.clone());

        let png = [0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);

        let (status, body) = send_json(
            create_router(app.state.clone()),
            post_json("/api/storage/upload", json!({"imageData": encoded})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let key = body["path"].as_str().unwrap();
        assert!(key.starts_with("uploads/") && key.ends_with(".png"));
        assert!(store.contains(&ObjectPath::new("generated-images", key)));
    }

    #[tokio::test]
    async fn test_list_prompts() {
        let mut app = setup(bare_settings()).await;
        let mut popular = prompt(1, "Popular", "a woman");
        popular.likes = 10;
        popular.category = Some("portrait".into());
        let mut other = prompt(2, "Other", "a tree");
        other.category = Some("nature".into());
        app.state.prompt_store = Some(Arc::new(MemoryPromptStore::new(vec![popular, other])));

        let (status, body) = send_json(
            create_router(app.state.clone()),
            get("/api/prompts?category=portrait&limit=500"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["prompts"][0]["title"], "Popular");
    }

    #[tokio::test]
    async fn test_bad_query_string_is_json_400() {
        let mut app = setup(bare_settings()).await;
        app.state.prompt_store = Some(Arc::new(MemoryPromptStore::new(vec![])));

        let response = create_router(app.state.clone())
            .oneshot(get("/api/prompts?limit=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid query string"));
    }
}
