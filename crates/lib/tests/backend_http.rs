//! Integration test: run a stub DocBot backend on a free port and drive the
//! auth, chat, upload, and index clients against it end to end. No real
//! backend required; the stub mirrors the API's response shapes.

use axum::extract::Multipart;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use lib::auth::{AuthClient, AuthError, TokenStore};
use lib::backend::{
    BackendClient, ChatError, ChatResponder, IndexError, SourceMetadata, SourceRef, DEFAULT_INDEX,
};
use lib::controller::{ConversationController, Severity};
use lib::simulate::FallbackResponder;
use lib::transcript::Role;
use serde_json::{json, Value};

const USER_INDEX: &str = "user-docs-7";

fn make_token(exp: i64) -> String {
    let encode =
        |v: &Value| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(v.to_string());
    let header = encode(&json!({ "alg": "HS256", "typ": "JWT" }));
    let payload = encode(&json!({ "sub": "demo", "exp": exp }));
    format!("{}.{}.sig", header, payload)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Could not validate credentials" })),
    )
}

async fn signup(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Email already registered" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": 2,
            "username": body["username"],
            "email": body["email"],
            "is_active": true,
        })),
    )
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "demo@example.com" && body["password"] == "secret" {
        let exp = chrono_now() + 3600;
        (
            StatusCode::OK,
            Json(json!({ "access_token": make_token(exp), "token_type": "bearer" })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid email or password" })),
        )
    }
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_secs() as i64
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": 1,
            "username": "demo",
            "email": "demo@example.com",
            "is_active": true,
        })),
    )
}

async fn chat(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["query"] == "explode" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Error processing query: boom" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "result": "X",
            "source_documents": [
                "Y",
                { "page_content": "excerpt...", "metadata": { "source": "report.pdf", "page": 3 } }
            ],
        })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut filename = None;
    let mut size = 0usize;
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        filename = field.file_name().map(|s| s.to_string());
        size = field.bytes().await.expect("field bytes").len();
    }
    let Some(filename) = filename else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "No file provided" })),
        );
    };
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Document processed successfully",
            "details": {
                "filename": filename,
                "text_chunks": size / 4 + 1,
                "index_name": USER_INDEX,
            },
        })),
    )
}

async fn indexes(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "indexes": [DEFAULT_INDEX, USER_INDEX] })),
    )
}

async fn switch_index(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let name = body["index_name"].as_str().unwrap_or_default();
    if name == DEFAULT_INDEX || name == USER_INDEX {
        (StatusCode::OK, Json(json!({ "success": true })))
    } else {
        (
            StatusCode::OK,
            Json(json!({ "success": false, "error": "Index not found" })),
        )
    }
}

/// Bind the stub backend on a free port and return its base URL.
async fn serve_stub() -> String {
    let app = Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/indexes", get(indexes))
        .route("/api/switch-index", post(switch_index));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    format!("http://{}", addr)
}

fn temp_store() -> TokenStore {
    let dir = std::env::temp_dir().join(format!("docbot-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    TokenStore::new(dir.join("token"))
}

#[tokio::test]
async fn login_me_logout_roundtrip() {
    let base = serve_stub().await;
    let auth = AuthClient::new(&base, temp_store());

    let session = auth
        .login("demo@example.com", "secret")
        .await
        .expect("login succeeds");
    assert!(session.authenticated());
    assert_eq!(session.username(), Some("demo"));
    assert!(auth.is_authenticated());

    // A fresh startup check restores the same session from the stored token.
    let restored = auth.restore_session().await;
    assert!(restored.authenticated());
    assert_eq!(restored.username(), Some("demo"));

    auth.logout();
    assert!(!auth.is_authenticated());
    let after = auth.restore_session().await;
    assert!(!after.authenticated());
}

#[tokio::test]
async fn login_failure_carries_backend_detail() {
    let base = serve_stub().await;
    let auth = AuthClient::new(&base, temp_store());

    let err = auth
        .login("demo@example.com", "wrong")
        .await
        .expect_err("login must fail");
    match err {
        AuthError::Credentials(msg) => assert_eq!(msg, "Invalid email or password"),
        other => panic!("expected credentials error, got {:?}", other),
    }
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn signup_conflict_carries_backend_detail() {
    let base = serve_stub().await;
    let auth = AuthClient::new(&base, temp_store());

    let user = auth
        .signup("newbie", "new@example.com", "pw")
        .await
        .expect("signup succeeds");
    assert_eq!(user.username, "newbie");
    // Signup does not establish a session.
    assert!(!auth.is_authenticated());

    let err = auth
        .signup("again", "taken@example.com", "pw")
        .await
        .expect_err("conflict must fail");
    match err {
        AuthError::Credentials(msg) => assert_eq!(msg, "Email already registered"),
        other => panic!("expected credentials error, got {:?}", other),
    }
}

#[tokio::test]
async fn chat_turn_through_controller() {
    let base = serve_stub().await;
    let backend = BackendClient::new(&base);
    let mut controller =
        ConversationController::new(backend.clone(), FallbackResponder::new(backend));

    assert!(controller.send_message("what is it?").await);
    let messages = controller.transcript().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "X");
    assert_eq!(
        messages[2].sources,
        vec![
            SourceRef::Plain("Y".to_string()),
            SourceRef::Attributed {
                excerpt: "excerpt...".to_string(),
                metadata: SourceMetadata {
                    source: Some("report.pdf".to_string()),
                    page: Some(3),
                },
            },
        ]
    );
}

#[tokio::test]
async fn http_error_is_not_masked_by_fallback() {
    let base = serve_stub().await;
    let responder = FallbackResponder::new(BackendClient::new(&base));

    let err = responder
        .send_chat_message("explode")
        .await
        .expect_err("HTTP error must pass through");
    match err {
        ChatError::Api(msg) => assert_eq!(msg, "Error processing query: boom"),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn health_check_is_true_for_healthy_backend() {
    let base = serve_stub().await;
    let backend = BackendClient::new(&base);
    assert!(backend.check_health().await);

    let dead = BackendClient::new("http://127.0.0.1:1");
    assert!(!dead.check_health().await);
}

#[tokio::test]
async fn upload_switches_active_index_and_notifies() {
    let base = serve_stub().await;
    let backend = BackendClient::new(&base);
    let mut controller =
        ConversationController::new(backend.clone(), FallbackResponder::new(backend));
    assert_eq!(controller.active_index(), DEFAULT_INDEX);

    let result = controller
        .upload_document("report.pdf", vec![0u8; 4096])
        .await
        .expect("upload succeeds");
    assert_eq!(result.filename, "report.pdf");
    assert_eq!(result.index_name, USER_INDEX);
    assert_eq!(controller.active_index(), USER_INDEX);

    let n = controller.notification().expect("success notification");
    assert_eq!(n.severity, Severity::Success);
    assert!(n.message.contains("report.pdf"));
    assert!(n.message.contains("text chunks"));
}

#[tokio::test]
async fn index_listing_and_acknowledged_switch() {
    let base = serve_stub().await;
    let backend = BackendClient::new(&base);
    let auth = AuthClient::new(&base, temp_store());
    auth.login("demo@example.com", "secret")
        .await
        .expect("login succeeds");
    let credential = auth.credential().expect("credential stored");

    let indexes = backend
        .list_indexes(Some(&credential))
        .await
        .expect("indexes listed");
    assert_eq!(indexes, vec![DEFAULT_INDEX.to_string(), USER_INDEX.to_string()]);

    let mut controller =
        ConversationController::new(backend.clone(), FallbackResponder::new(backend));
    controller
        .switch_active_index(Some(&credential), USER_INDEX)
        .await
        .expect("switch acknowledged");
    assert_eq!(controller.active_index(), USER_INDEX);

    // A rejected switch leaves the active index where it was.
    let err = controller
        .switch_active_index(Some(&credential), "no-such-index")
        .await
        .expect_err("unknown index must fail");
    match err {
        IndexError::Api(msg) => assert_eq!(msg, "Index not found"),
        other => panic!("expected api error, got {:?}", other),
    }
    assert_eq!(controller.active_index(), USER_INDEX);
}
