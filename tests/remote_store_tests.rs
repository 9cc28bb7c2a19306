//! The HTTP client store against a live server on an ephemeral port.

use std::sync::Arc;

use kanban_tracker::api::{ApiServer, ServerHandle, start_server};
use kanban_tracker::cli::commands::move_task;
use kanban_tracker::db::Database;
use kanban_tracker::error::ErrorCode;
use kanban_tracker::position::Placement;
use kanban_tracker::store::demo::{DEMO_PROJECT_ID, demo_user};
use kanban_tracker::store::{BoardStore, MemoryStore, RemoteStore};
use kanban_tracker::types::{
    AttachmentUpload, Credentials, NewComment, NewProject, NewTask, NewUser, TaskUpdate,
};
use kanban_tracker::uploads::UploadDir;

async fn demo_server() -> ServerHandle {
    let state =
        ApiServer::new(Arc::new(MemoryStore::demo())).with_fallback_user(demo_user());
    start_server(state, "127.0.0.1", 0)
        .await
        .expect("Failed to start server")
}

fn column_ids(board: &kanban_tracker::types::ProjectBoard, column_id: &str) -> Vec<String> {
    board
        .column(column_id)
        .expect("column")
        .tasks
        .iter()
        .map(|t| t.task.id.clone())
        .collect()
}

#[tokio::test]
async fn reads_the_demo_board() {
    let server = demo_server().await;
    let remote = RemoteStore::new(format!("{}/", server.url()));

    let projects = remote.list_projects().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].project.id, DEMO_PROJECT_ID);

    let board = remote.get_project(DEMO_PROJECT_ID).await.unwrap();
    assert_eq!(board.columns.len(), 5);
    assert_eq!(column_ids(&board, "col-2"), ["task-1"]);

    server.shutdown().await;
}

#[tokio::test]
async fn errors_keep_their_codes() {
    let server = demo_server().await;
    let remote = RemoteStore::new(server.url());

    let err = remote.get_project("missing").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProjectNotFound);

    let err = remote.reorder_tasks(Vec::new()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingRequiredField);
    assert_eq!(err.message, "Tasks array is required");

    let err = remote
        .reorder_tasks(vec![
            Placement::new("task-1", "col-1", 0),
            Placement::new("ghost", "col-1", 1),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TaskNotFound);

    server.shutdown().await;
}

#[tokio::test]
async fn ids_stay_inside_their_path_segment() {
    let server = demo_server().await;
    let remote = RemoteStore::new(server.url());

    for id in ["task-1#x", "task-1?id=task-2", "task-1/comments", "../tasks/task-1"] {
        let err = remote.get_task(id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound, "id {id:?}");
        let err = remote.delete_task(id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound, "id {id:?}");
    }

    let task = remote.get_task("task-1").await.unwrap();
    assert_eq!(task.card.task.id, "task-1");

    server.shutdown().await;
}

#[tokio::test]
async fn move_task_over_http() {
    let server = demo_server().await;
    let remote = RemoteStore::new(server.url());

    let batch = move_task(&remote, "task-3", "col-3", 1).await.unwrap();
    assert_eq!(
        batch,
        vec![
            Placement::new("task-2", "col-3", 0),
            Placement::new("task-3", "col-3", 1),
        ]
    );

    let board = remote.get_project(DEMO_PROJECT_ID).await.unwrap();
    assert_eq!(column_ids(&board, "col-3"), ["task-2", "task-3"]);
    assert!(column_ids(&board, "col-5").is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn task_lifecycle_and_comments() {
    let server = demo_server().await;
    let remote = RemoteStore::new(server.url());

    let card = remote
        .create_task(NewTask::new("col-1", "Remote task"))
        .await
        .unwrap();
    assert_eq!(card.task.position, 0);

    let updated = remote
        .update_task(
            &card.task.id,
            TaskUpdate {
                description: Some(Some("from afar".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.task.description.as_deref(), Some("from afar"));

    // The server acts as the demo user; the caller id is not sent.
    let comment = remote
        .create_comment(
            "ignored",
            NewComment {
                task_id: card.task.id.clone(),
                content: "remote note".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(comment.author_id, demo_user().id);
    let edited = remote
        .update_comment("ignored", &comment.id, "edited".to_string())
        .await
        .unwrap();
    assert_eq!(edited.content, "edited");

    remote.delete_task(&card.task.id).await.unwrap();
    let err = remote.get_task(&card.task.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TaskNotFound);

    server.shutdown().await;
}

#[tokio::test]
async fn attachments_round_trip_with_metadata() {
    let server = demo_server().await;
    let remote = RemoteStore::new(server.url());

    let attachment = remote
        .upload_attachment(AttachmentUpload {
            task_id: "task-1".to_string(),
            filename: "design notes.txt".to_string(),
            mimetype: "text/plain".to_string(),
            data: b"contents".to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(attachment.size, 8);

    let (meta, data) = remote.attachment_content(&attachment.id).await.unwrap();
    assert_eq!(meta, attachment);
    assert_eq!(data, b"contents");

    remote.delete_attachment(&attachment.id).await.unwrap();
    let err = remote.attachment_content(&attachment.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AttachmentNotFound);

    server.shutdown().await;
}

#[tokio::test]
async fn sessions_against_a_database_server() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory()
        .unwrap()
        .with_uploads(UploadDir::new(dir.path()));
    let server = start_server(ApiServer::new(Arc::new(db)), "127.0.0.1", 0)
        .await
        .unwrap();
    let anonymous = RemoteStore::new(server.url());

    let user = anonymous
        .register_user(NewUser {
            email: "remote@example.com".to_string(),
            password: "pw".to_string(),
            name: "Remote".to_string(),
        })
        .await
        .unwrap();

    let err = anonymous.list_projects().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthenticated);

    let session = anonymous
        .login(Credentials {
            email: "remote@example.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        anonymous
            .user_for_token(&session.token)
            .await
            .unwrap()
            .map(|u| u.id),
        Some(user.id.clone())
    );
    assert!(anonymous.user_for_token("bogus").await.unwrap().is_none());

    let authed = RemoteStore::new(server.url()).with_token(&session.token);
    let board = authed
        .create_project(
            "ignored",
            NewProject {
                name: "Remote Board".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(board.project.owner_id, user.id);

    anonymous.logout(&session.token).await.unwrap();
    let err = authed.list_projects().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthenticated);

    server.shutdown().await;
}
