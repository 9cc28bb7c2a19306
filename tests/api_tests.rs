//! HTTP-level tests for the REST API.
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`,
//! so no socket is bound.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use kanban_tracker::api::{ApiServer, build_router};
use kanban_tracker::db::Database;
use kanban_tracker::position::MAX_POSITION;
use kanban_tracker::store::MemoryStore;
use kanban_tracker::store::demo::{DEMO_PROJECT_ID, demo_user};
use kanban_tracker::uploads::UploadDir;

fn sqlite_app(uploads: &std::path::Path) -> Router {
    let db = Database::open_in_memory()
        .expect("Failed to create in-memory database")
        .with_uploads(UploadDir::new(uploads));
    build_router(ApiServer::new(Arc::new(db)))
}

fn demo_app() -> Router {
    build_router(ApiServer::new(Arc::new(MemoryStore::demo())).with_fallback_user(demo_user()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register and log in; returns the bearer token.
async fn sign_in(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": email, "password": "pw", "name": "Tester"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, session) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session["token"].as_str().unwrap().to_string()
}

/// Create a project and return `(project_id, first_column_id)`.
async fn create_project(app: &Router, token: &str) -> (String, String) {
    let (status, board) = send(
        app,
        Method::POST,
        "/api/projects",
        Some(token),
        Some(json!({"name": "API Board", "type": "client"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        board["id"].as_str().unwrap().to_string(),
        board["columns"][0]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_task(app: &Router, token: Option<&str>, column_id: &str, title: &str) -> String {
    let (status, card) = send(
        app,
        Method::POST,
        "/api/tasks",
        token,
        Some(json!({"title": title, "columnId": column_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    card["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_version() {
    let app = demo_app();
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());

        let (status, body) = send(&app, Method::GET, "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = send(&app, Method::GET, "/api/projects", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_me_logout() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let token = sign_in(&app, "ann@example.com").await;

        let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ann@example.com");
        assert_eq!(me["role"], "member");
        assert!(me.get("passwordHash").is_none());

        let (status, body) =
            send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_credentials_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        sign_in(&app, "ben@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ben@example.com", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ben@example.com", "password": "pw", "name": "Ben"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User already exists");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod board_tests {
    use super::*;

    #[tokio::test]
    async fn reorder_through_the_api() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let token = sign_in(&app, "cat@example.com").await;
        let (project_id, column_id) = create_project(&app, &token).await;

        let t1 = create_task(&app, Some(&token), &column_id, "t1").await;
        let t2 = create_task(&app, Some(&token), &column_id, "t2").await;
        let t3 = create_task(&app, Some(&token), &column_id, "t3").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/tasks",
            Some(&token),
            Some(json!({"tasks": [
                {"id": t3, "columnId": column_id, "position": 0},
                {"id": t1, "columnId": column_id, "position": 1},
                {"id": t2, "columnId": column_id, "position": 2},
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let (status, board) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{}", project_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["type"], "client");
        let titles: Vec<&str> = board["columns"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["t3", "t1", "t2"]);
    }

    #[tokio::test]
    async fn reorder_without_tasks_array() {
        let app = demo_app();
        for body in [json!({}), json!({"tasks": []})] {
            let (status, err) = send(&app, Method::PUT, "/api/tasks", None, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(err["error"], "Tasks array is required");
            assert_eq!(err["code"], "MISSING_REQUIRED_FIELD");
        }
    }

    #[tokio::test]
    async fn reorder_with_unknown_task_is_not_found() {
        let app = demo_app();
        let (status, err) = send(
            &app,
            Method::PUT,
            "/api/tasks",
            None,
            Some(json!({"tasks": [
                {"id": "task-1", "columnId": "col-1", "position": 0},
                {"id": "ghost", "columnId": "col-1", "position": 1},
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "TASK_NOT_FOUND");

        let (_, task) = send(&app, Method::GET, "/api/tasks/task-1", None, None).await;
        assert_eq!(task["columnId"], "col-2");
    }

    /// Positions past the accepted range are rejected and leave the store serving.
    async fn extreme_positions_keep_serving(
        app: &Router,
        token: Option<&str>,
        task_id: &str,
        column_id: &str,
        other_column_id: &str,
    ) {
        for position in [json!(i64::MAX), json!(u64::MAX), json!(MAX_POSITION + 1)] {
            let (status, err) = send(
                app,
                Method::PUT,
                "/api/tasks",
                token,
                Some(json!({"tasks": [{"id": task_id, "columnId": column_id, "position": position}]})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(err["code"], "INVALID_FIELD_VALUE");
        }

        let (status, _) = send(
            app,
            Method::PUT,
            "/api/tasks",
            token,
            Some(json!({"tasks": [{"id": task_id, "columnId": column_id, "position": MAX_POSITION}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The column has no room left after the maximum.
        let (status, err) = send(
            app,
            Method::POST,
            "/api/tasks",
            token,
            Some(json!({"title": "one too many", "columnId": column_id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_FIELD_VALUE");

        create_task(app, token, other_column_id, "still works").await;
        let (status, task) = send(app, Method::GET, &format!("/api/tasks/{}", task_id), token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["position"], MAX_POSITION);
    }

    #[tokio::test]
    async fn extreme_positions_in_demo_mode() {
        let app = demo_app();
        extreme_positions_keep_serving(&app, None, "task-1", "col-2", "col-1").await;
    }

    #[tokio::test]
    async fn extreme_positions_in_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let token = sign_in(&app, "max@example.com").await;
        let (project_id, column_id) = create_project(&app, &token).await;
        let task_id = create_task(&app, Some(&token), &column_id, "edge").await;

        let (_, board) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{}", project_id),
            Some(&token),
            None,
        )
        .await;
        let other_column_id = board["columns"][1]["id"].as_str().unwrap().to_string();

        extreme_positions_keep_serving(&app, Some(&token), &task_id, &column_id, &other_column_id)
            .await;
    }

    #[tokio::test]
    async fn missing_resources_are_404() {
        let app = demo_app();
        let (status, body) = send(&app, Method::GET, "/api/projects/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Project not found");

        let (status, body) = send(&app, Method::DELETE, "/api/tasks/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn create_task_requires_title_and_column() {
        let app = demo_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/tasks",
            None,
            Some(json!({"title": "no column"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title and column are required");
    }

    #[tokio::test]
    async fn demo_mode_serves_without_login() {
        let app = demo_app();
        let (status, projects) = send(&app, Method::GET, "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(projects[0]["id"], DEMO_PROJECT_ID);

        let (status, me) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], "demo-user-1");
    }

    #[tokio::test]
    async fn delete_task_leaves_gap_visible_on_board() {
        let app = demo_app();
        create_task(&app, None, "col-1", "a").await;
        let b = create_task(&app, None, "col-1", "b").await;
        create_task(&app, None, "col-1", "c").await;

        let (status, body) =
            send(&app, Method::DELETE, &format!("/api/tasks/{}", b), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, board) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{}", DEMO_PROJECT_ID),
            None,
            None,
        )
        .await;
        let positions: Vec<i64> = board["columns"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["position"].as_i64().unwrap())
            .collect();
        assert_eq!(positions, [0, 2]);
    }
}

mod ownership_tests {
    use super::*;

    #[tokio::test]
    async fn comment_edits_are_author_only() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let alice = sign_in(&app, "alice@example.com").await;
        let bob = sign_in(&app, "bob@example.com").await;
        let (_, column_id) = create_project(&app, &alice).await;
        let task_id = create_task(&app, Some(&alice), &column_id, "discuss").await;

        let (status, comment) = send(
            &app,
            Method::POST,
            "/api/comments",
            Some(&alice),
            Some(json!({"taskId": task_id, "content": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["author"]["email"], "alice@example.com");
        let uri = format!("/api/comments/{}", comment["id"].as_str().unwrap());

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&bob),
            Some(json!({"content": "mine now"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, edited) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({"content": "hello again"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["content"], "hello again");
    }

    #[tokio::test]
    async fn time_entries_need_task_id_and_owner() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let alice = sign_in(&app, "alice@example.com").await;
        let bob = sign_in(&app, "bob@example.com").await;
        let (_, column_id) = create_project(&app, &alice).await;
        let task_id = create_task(&app, Some(&alice), &column_id, "track").await;

        let (status, body) =
            send(&app, Method::GET, "/api/time-entries", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "taskId");

        let (status, entry) = send(
            &app,
            Method::POST,
            "/api/time-entries",
            Some(&alice),
            Some(json!({"taskId": task_id, "hours": 2.5})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/time-entries/{}", entry["id"].as_str().unwrap());
        let (status, body) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "You can only delete your own time entries");

        let (status, entries) = send(
            &app,
            Method::GET,
            &format!("/api/time-entries?taskId={}", task_id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["hours"], 2.5);
    }
}

mod attachment_tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use kanban_tracker::api::ATTACHMENT_META_HEADER;

    const BOUNDARY: &str = "kanban-test-boundary";

    fn multipart_body(task_id: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(task_id) = task_id {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"taskId\"\r\n\r\n{}\r\n",
                    BOUNDARY, task_id
                )
                .as_bytes(),
            );
        }
        if let Some((name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/attachments")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let token = sign_in(&app, "dee@example.com").await;
        let (_, column_id) = create_project(&app, &token).await;
        let task_id = create_task(&app, Some(&token), &column_id, "with file").await;

        let request = upload_request(
            &token,
            multipart_body(Some(&task_id), Some(("notes.txt", b"file body"))),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let attachment: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(attachment["filename"], "notes.txt");
        assert_eq!(attachment["mimetype"], "text/plain");
        assert_eq!(attachment["size"], 9);
        let uri = format!("/api/attachments/{}", attachment["id"].as_str().unwrap());

        let request = Request::builder()
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.txt\""
        );
        let meta = STANDARD
            .decode(response.headers()[ATTACHMENT_META_HEADER].as_bytes())
            .unwrap();
        let meta: Value = serde_json::from_slice(&meta).unwrap();
        assert_eq!(meta["id"], attachment["id"]);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"file body");

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_requires_file_and_task() {
        let dir = tempfile::tempdir().unwrap();
        let app = sqlite_app(dir.path());
        let token = sign_in(&app, "eve@example.com").await;

        let request = upload_request(&token, multipart_body(Some("task"), None));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "File and taskId are required");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory()
            .unwrap()
            .with_uploads(UploadDir::new(dir.path()));
        let app = build_router(ApiServer::new(Arc::new(db)).with_max_upload_bytes(4));
        let token = sign_in(&app, "fin@example.com").await;

        let request = upload_request(
            &token,
            multipart_body(Some("any"), Some(("big.txt", b"too large"))),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
