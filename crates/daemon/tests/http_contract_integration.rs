// Integration test: REST contract of the router, driven with `oneshot`.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use quire_daemon::documents::Documents;
use quire_daemon::http::{build_router, AppState};
use quire_daemon::hub::NotificationHub;
use quire_daemon::store::lock_path_for;
use quire_daemon::workspace::Workspace;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn single_file_router(dir: &TempDir, content: &str) -> Router {
    let path = dir.path().join("draft.md");
    std::fs::write(&path, content).expect("draft should be written");
    let documents = Documents::single(&path).expect("document should open");
    build_router(AppState::new(documents, Arc::new(NotificationHub::new())))
}

fn folder_router(root: &Path) -> Router {
    let workspace = Workspace::open(root).expect("workspace should open");
    build_router(AppState::new(Documents::folder(workspace), Arc::new(NotificationHub::new())))
}

/// `a.md`, `sub/b.md` and a sibling `outside.md` next to the workspace root.
fn folder_fixture() -> (TempDir, std::path::PathBuf) {
    let parent = TempDir::new().expect("tempdir should be created");
    let root = parent.path().join("notes");
    std::fs::create_dir_all(root.join("sub")).expect("workspace dirs should be created");
    std::fs::write(root.join("a.md"), "# a").expect("a.md written");
    std::fs::write(root.join("sub/b.md"), "# b").expect("b.md written");
    std::fs::write(root.join("skip.txt"), "not markdown").expect("skip.txt written");
    std::fs::write(parent.path().join("outside.md"), "# outside").expect("outside.md written");
    (parent, root)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request should build"))
        .await
        .expect("request should return a response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be valid json")
    };
    (status, value)
}

// ── Single-file mode ───────────────────────────────────────────────

#[tokio::test]
async fn saved_draft_reads_back() {
    let dir = TempDir::new().expect("tempdir should be created");
    let router = single_file_router(&dir, "# v0");

    let (status, body) = send(&router, Method::GET, "/api/mode", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "mode": "file" }));

    let (status, body) =
        send(&router, Method::POST, "/api/save", Some(json!({ "content": "# v1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "saved");
    assert_eq!(body["metadata"]["size_bytes"], 4);
    assert!(body["metadata"].get("relative_path").is_none());

    let (status, body) = send(&router, Method::GET, "/api/content", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "# v1");
    assert!(body["metadata"]["path"].as_str().expect("path is a string").ends_with("draft.md"));
    assert_eq!(std::fs::read_to_string(dir.path().join("draft.md")).expect("on disk"), "# v1");
    assert!(lock_path_for(&dir.path().join("draft.md")).exists());
}

#[tokio::test]
async fn single_file_mode_has_no_tree() {
    let dir = TempDir::new().expect("tempdir should be created");
    let router = single_file_router(&dir, "# v0");

    let (status, body) = send(&router, Method::GET, "/api/file-tree", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn malformed_save_body_is_a_validation_error() {
    let dir = TempDir::new().expect("tempdir should be created");
    let router = single_file_router(&dir, "# v0");

    let (status, body) =
        send(&router, Method::POST, "/api/save", Some(json!({ "text": "wrong field" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(std::fs::read_to_string(dir.path().join("draft.md")).expect("on disk"), "# v0");
}

// ── Folder mode ────────────────────────────────────────────────────

#[tokio::test]
async fn folder_lists_markdown_and_rejects_escape() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);

    let (status, tree) = send(&router, Method::GET, "/api/file-tree", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["type"], "folder");
    assert_eq!(tree["name"], "notes");
    assert_eq!(tree["children"][0]["type"], "folder");
    assert_eq!(tree["children"][0]["children"][0]["path"], "sub/b.md");
    assert_eq!(tree["children"][1]["path"], "a.md");
    assert_eq!(tree["children"].as_array().expect("children array").len(), 2);

    let (status, body) = send(&router, Method::GET, "/api/content?file=sub/b.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "# b");
    assert_eq!(body["metadata"]["relative_path"], "sub/b.md");

    let (status, body) =
        send(&router, Method::GET, "/api/content?file=../outside.md", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/save",
        Some(json!({ "content": "pwned", "file": "../outside.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        std::fs::read_to_string(root.parent().expect("parent").join("outside.md"))
            .expect("outside untouched"),
        "# outside"
    );
}

#[tokio::test]
async fn folder_mode_requires_file_and_existing_target() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);

    let (status, body) = send(&router, Method::GET, "/api/content", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, body) = send(&router, Method::GET, "/api/content?file=missing.md", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/save",
        Some(json!({ "content": "x", "file": "missing.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!root.join("missing.md").exists());

    let (status, _) = send(&router, Method::GET, "/api/content?file=skip.txt", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rename_and_delete_files() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);

    let (status, body) =
        send(&router, Method::POST, "/api/files", Some(json!({ "file": "drafts/new.md" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["path"], "drafts/new.md");
    assert_eq!(std::fs::read_to_string(root.join("drafts/new.md")).expect("created"), "");

    let (status, body) =
        send(&router, Method::POST, "/api/files", Some(json!({ "file": "a.md" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/save",
        Some(json!({ "content": "# draft", "file": "drafts/new.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(lock_path_for(&root.join("drafts/new.md")).exists());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/files/rename",
        Some(json!({ "file": "drafts", "new_name": "published" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "published");
    assert!(!lock_path_for(&root.join("published/new.md")).exists());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/files/rename",
        Some(json!({ "file": "a.md", "new_name": "sub" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "renamed file must keep a markdown name: {body}");

    let (status, body) =
        send(&router, Method::GET, "/api/content?file=published/new.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "# draft");

    let (status, _) = send(&router, Method::DELETE, "/api/files?file=sub", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(root.join("sub/b.md").exists());

    let (status, _) = send(&router, Method::DELETE, "/api/files?file=published/new.md", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!root.join("published/new.md").exists());
    assert!(!lock_path_for(&root.join("published/new.md")).exists());

    let (status, _) = send(&router, Method::DELETE, "/api/files?file=published/new.md", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Images ─────────────────────────────────────────────────────────

const BOUNDARY: &str = "quire-upload-boundary";

fn image_upload(file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("upload request should build")
}

async fn send_raw(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response =
        router.clone().oneshot(request).await.expect("request should return a response");
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable");
    (status, content_type, bytes.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

#[tokio::test]
async fn uploaded_image_is_served_back() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);

    let (status, _, body) = send_raw(&router, image_upload("Diagram 1.png", b"\x89PNG\r\n")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).expect("upload response should be json");
    let filename = body["filename"].as_str().expect("filename should be a string").to_string();
    assert!(filename.starts_with("Diagram-1-") && filename.ends_with(".png"), "{filename}");
    assert_eq!(body["path"], format!("images/{filename}"));
    assert!(root.join("images").join(&filename).is_file());

    let (status, content_type, bytes) = send_raw(&router, get(&format!("/images/{filename}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(bytes, b"\x89PNG\r\n");
}

#[tokio::test]
async fn single_file_mode_stores_images_beside_the_file() {
    let dir = TempDir::new().expect("tempdir should be created");
    let router = single_file_router(&dir, "# v0");

    let (status, _, _) = send_raw(&router, image_upload("cat.jpg", b"jpeg")).await;
    assert_eq!(status, StatusCode::OK);
    let stored: Vec<_> = std::fs::read_dir(dir.path().join("images"))
        .expect("images dir should exist")
        .collect();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn image_upload_rejects_unsupported_and_empty_files() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);

    let (status, _, body) = send_raw(&router, image_upload("notes.md", b"# not an image")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).expect("error should be json");
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, _, _) = send_raw(&router, image_upload("empty.png", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!root.join("images").exists());

    let (status, _) = send(&router, Method::POST, "/api/images", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn image_serving_stays_inside_images_dir() {
    let (_parent, root) = folder_fixture();
    let router = folder_router(&root);
    std::fs::create_dir(root.join("images")).expect("images dir should be created");

    for uri in ["/images/../a.md", "/images/%2e%2e/a.md", "/images/sub/..%2F..%2Fa.md"] {
        let (status, _, _) = send_raw(&router, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }

    let (status, _, _) = send_raw(&router, get("/images/missing.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
