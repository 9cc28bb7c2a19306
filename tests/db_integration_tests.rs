//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite database.
//! Tests are organized by module and functionality.

use kanban_tracker::db::Database;
use kanban_tracker::error::{ApiError, ErrorCode};
use kanban_tracker::types::{
    ChecklistItemUpdate, Credentials, NewChecklist, NewChecklistItem, NewComment, NewLabel,
    NewProject, NewTask, NewTimeEntry, NewUser, Priority, ProjectType, ProjectUpdate, Role,
    TaskUpdate, TimeEntryUpdate, User,
};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn code(err: anyhow::Error) -> ErrorCode {
    ApiError::from(err).code
}

fn register(db: &Database, email: &str) -> User {
    db.register_user(&NewUser {
        email: email.to_string(),
        password: "hunter2".to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
    })
    .expect("Failed to register user")
}

/// A user and a project; returns `(user, project_id, first_column_id)`.
fn setup_board(db: &Database) -> (User, String, String) {
    let user = register(db, "owner@example.com");
    let board = db
        .create_project(
            &user.id,
            &NewProject {
                name: "Website".to_string(),
                ..Default::default()
            },
        )
        .expect("Failed to create project");
    let column_id = board.columns[0].column.id.clone();
    (user, board.project.id, column_id)
}

mod user_tests {
    use super::*;

    #[test]
    fn register_normalizes_email_and_defaults_to_member() {
        let db = setup_db();
        let user = register(&db, "  Alice@Example.COM ");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::Member);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = setup_db();
        register(&db, "bob@example.com");
        let err = db
            .register_user(&NewUser {
                email: "BOB@example.com".to_string(),
                password: "x".to_string(),
                name: "Bob".to_string(),
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::AlreadyExists);
    }

    #[test]
    fn register_requires_all_fields() {
        let db = setup_db();
        let err = db
            .register_user(&NewUser {
                email: "carol@example.com".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);
    }

    #[test]
    fn login_opens_session_and_logout_ends_it() {
        let db = setup_db();
        let user = register(&db, "dana@example.com");

        let session = db
            .login(&Credentials {
                email: "Dana@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
        assert_eq!(session.user.id, user.id);
        assert!(session.expires_at > chrono::Utc::now());

        let resolved = db.user_for_token(&session.token).unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(db.logout(&session.token).unwrap());
        assert!(db.user_for_token(&session.token).unwrap().is_none());
        assert!(!db.logout(&session.token).unwrap());
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let db = setup_db();
        register(&db, "erin@example.com");
        let err = db
            .login(&Credentials {
                email: "erin@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidCredentials);

        let err = db
            .login(&Credentials {
                email: "nobody@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidCredentials);
    }

    #[test]
    fn zero_ttl_sessions_expire_immediately() {
        let db = setup_db().with_session_ttl_hours(0);
        register(&db, "fay@example.com");
        let session = db
            .login(&Credentials {
                email: "fay@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
        assert!(db.user_for_token(&session.token).unwrap().is_none());
    }

    #[test]
    fn admin_created_by_seed_path() {
        let db = setup_db();
        let admin = db
            .create_user(
                &NewUser {
                    email: "root@example.com".to_string(),
                    password: "pw".to_string(),
                    name: "Root".to_string(),
                },
                Role::Admin,
            )
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(
            db.get_user_by_email("ROOT@example.com").unwrap().unwrap().id,
            admin.id
        );
    }
}

mod project_tests {
    use super::*;

    #[test]
    fn create_project_adds_default_columns_and_labels() {
        let db = setup_db();
        let user = register(&db, "owner@example.com");
        let board = db
            .create_project(
                &user.id,
                &NewProject {
                    name: "  Mobile App ".to_string(),
                    description: Some("iOS and Android".to_string()),
                    project_type: ProjectType::Client,
                    labels: vec![NewLabel {
                        name: "Bug".to_string(),
                        color: "#ef4444".to_string(),
                    }],
                },
            )
            .unwrap();

        assert_eq!(board.project.name, "Mobile App");
        assert_eq!(board.project.project_type, ProjectType::Client);
        assert_eq!(board.owner.id, user.id);
        let names: Vec<&str> = board
            .columns
            .iter()
            .map(|c| c.column.name.as_str())
            .collect();
        assert_eq!(names, ["Backlog", "To Do", "In Progress", "Review", "Done"]);
        let positions: Vec<i64> = board.columns.iter().map(|c| c.column.position).collect();
        assert_eq!(positions, [0, 1, 2, 3, 4]);
        assert_eq!(board.labels.len(), 1);
    }

    #[test]
    fn create_project_requires_name_and_owner() {
        let db = setup_db();
        let user = register(&db, "owner@example.com");

        let err = db
            .create_project(&user.id, &NewProject::default())
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);

        let err = db
            .create_project(
                "ghost",
                &NewProject {
                    name: "Orphan".to_string(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::UserNotFound);
    }

    #[test]
    fn archived_projects_are_hidden_from_list() {
        let db = setup_db();
        let (_, project_id, column_id) = setup_board(&db);
        db.create_task(&NewTask::new(&column_id, "counted")).unwrap();

        let listed = db.list_projects().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].columns[0].task_count, 1);

        let updated = db
            .update_project(
                &project_id,
                &ProjectUpdate {
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.archived);
        assert!(db.list_projects().unwrap().is_empty());
        // Still reachable directly.
        assert!(db.get_project(&project_id).unwrap().project.archived);
    }

    #[test]
    fn update_can_clear_description() {
        let db = setup_db();
        let user = register(&db, "owner@example.com");
        let board = db
            .create_project(
                &user.id,
                &NewProject {
                    name: "Docs".to_string(),
                    description: Some("old".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = db
            .update_project(
                &board.project.id,
                &ProjectUpdate {
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.description.is_none());
        assert_eq!(updated.name, "Docs");
    }

    #[test]
    fn delete_project_cascades_to_tasks() {
        let db = setup_db();
        let (_, project_id, column_id) = setup_board(&db);
        let task = db.create_task(&NewTask::new(&column_id, "doomed")).unwrap();

        db.delete_project(&project_id).unwrap();

        assert_eq!(
            code(db.get_project(&project_id).unwrap_err()),
            ErrorCode::ProjectNotFound
        );
        assert_eq!(
            code(db.get_task(&task.task.id).unwrap_err()),
            ErrorCode::TaskNotFound
        );
        assert_eq!(
            code(db.delete_project(&project_id).unwrap_err()),
            ErrorCode::ProjectNotFound
        );
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn unknown_stored_priority_is_an_error() {
        let db = setup_db();
        let (_, project_id, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "Corrupt")).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET priority = 'urgent' WHERE id = ?1",
                [&card.task.id],
            )?;
            Ok(())
        })
        .unwrap();

        let err = db.get_task(&card.task.id).unwrap_err();
        assert_eq!(code(err), ErrorCode::DatabaseError);
        let err = db.get_project(&project_id).unwrap_err();
        assert_eq!(code(err), ErrorCode::DatabaseError);
    }

    #[test]
    fn unknown_stored_role_is_an_error() {
        let db = setup_db();
        let user = register(&db, "role@example.com");
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET role = 'owner' WHERE id = ?1", [&user.id])?;
            Ok(())
        })
        .unwrap();

        let err = db.list_users().unwrap_err();
        assert_eq!(code(err), ErrorCode::DatabaseError);
    }

    #[test]
    fn create_task_with_labels_and_assignee() {
        let db = setup_db();
        let user = register(&db, "owner@example.com");
        let board = db
            .create_project(
                &user.id,
                &NewProject {
                    name: "Labels".to_string(),
                    labels: vec![NewLabel {
                        name: "Feature".to_string(),
                        color: "#3b82f6".to_string(),
                    }],
                    ..Default::default()
                },
            )
            .unwrap();
        let label_id = board.labels[0].id.clone();

        let card = db
            .create_task(&NewTask {
                title: "Add dark mode".to_string(),
                column_id: board.columns[1].column.id.clone(),
                priority: Priority::High,
                assignee_id: Some(user.id.clone()),
                estimated_hours: Some(4.5),
                label_ids: vec![label_id.clone()],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(card.task.position, 0);
        assert_eq!(card.task.priority, Priority::High);
        assert_eq!(card.assignee.as_ref().map(|a| a.id.as_str()), Some(user.id.as_str()));
        assert_eq!(card.labels.len(), 1);
        assert_eq!(card.labels[0].id, label_id);
    }

    #[test]
    fn create_task_validates_input() {
        let db = setup_db();
        let (_, _, column_id) = setup_board(&db);

        let err = db.create_task(&NewTask::new(&column_id, "  ")).unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);

        let err = db.create_task(&NewTask::new("nope", "title")).unwrap_err();
        assert_eq!(code(err), ErrorCode::ColumnNotFound);

        let err = db
            .create_task(&NewTask {
                assignee_id: Some("ghost".to_string()),
                ..NewTask::new(&column_id, "title")
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::UserNotFound);

        let err = db
            .create_task(&NewTask {
                estimated_hours: Some(-1.0),
                ..NewTask::new(&column_id, "title")
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn update_task_keeps_position_and_clears_fields() {
        let db = setup_db();
        let (user, _, column_id) = setup_board(&db);
        db.create_task(&NewTask::new(&column_id, "first")).unwrap();
        let card = db
            .create_task(&NewTask {
                assignee_id: Some(user.id.clone()),
                ..NewTask::new(&column_id, "second")
            })
            .unwrap();

        let updated = db
            .update_task(
                &card.task.id,
                &TaskUpdate {
                    title: Some("renamed".to_string()),
                    assignee_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.task.title, "renamed");
        assert!(updated.task.assignee_id.is_none());
        assert!(updated.assignee.is_none());
        assert_eq!(updated.task.position, 1);
        assert_eq!(updated.task.column_id, column_id);
    }

    #[test]
    fn task_detail_includes_children() {
        let db = setup_db();
        let (user, project_id, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "detailed")).unwrap();
        let task_id = card.task.id.clone();

        db.create_comment(
            &user.id,
            &NewComment {
                task_id: task_id.clone(),
                content: "looks good".to_string(),
            },
        )
        .unwrap();
        db.create_time_entry(
            &user.id,
            &NewTimeEntry {
                task_id: task_id.clone(),
                hours: Some(1.5),
                ..Default::default()
            },
        )
        .unwrap();

        let detail = db.get_task(&task_id).unwrap();
        assert_eq!(detail.project_id, project_id);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].author.id, user.id);
        assert_eq!(detail.time_entries.len(), 1);
        assert_eq!(detail.card.counts.comments, 1);
        assert!((detail.card.logged_hours - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn column_order_reports_positions() {
        let db = setup_db();
        let (_, _, column_id) = setup_board(&db);
        let a = db.create_task(&NewTask::new(&column_id, "a")).unwrap();
        let b = db.create_task(&NewTask::new(&column_id, "b")).unwrap();

        assert_eq!(
            db.column_order(&column_id).unwrap(),
            vec![(a.task.id, 0), (b.task.id, 1)]
        );
    }
}

mod checklist_tests {
    use super::*;

    #[test]
    fn checklists_and_items_append_in_order() {
        let db = setup_db();
        let (_, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "with lists")).unwrap();

        let first = db
            .create_checklist(&NewChecklist {
                task_id: card.task.id.clone(),
                title: "Design".to_string(),
            })
            .unwrap();
        let second = db
            .create_checklist(&NewChecklist {
                task_id: card.task.id.clone(),
                title: "Build".to_string(),
            })
            .unwrap();
        assert_eq!((first.position, second.position), (0, 1));

        for content in ["one", "two", "three"] {
            db.create_checklist_item(&NewChecklistItem {
                checklist_id: first.id.clone(),
                content: content.to_string(),
            })
            .unwrap();
        }

        let detail = db.get_task(&card.task.id).unwrap();
        let titles: Vec<&str> = detail
            .card
            .checklists
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, ["Design", "Build"]);
        let items: Vec<(&str, i64)> = detail.card.checklists[0]
            .items
            .iter()
            .map(|i| (i.content.as_str(), i.position))
            .collect();
        assert_eq!(items, [("one", 0), ("two", 1), ("three", 2)]);
    }

    #[test]
    fn item_delete_leaves_gap_and_toggle_persists() {
        let db = setup_db();
        let (_, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let list = db
            .create_checklist(&NewChecklist {
                task_id: card.task.id.clone(),
                title: "Steps".to_string(),
            })
            .unwrap();
        let ids: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|content| {
                db.create_checklist_item(&NewChecklistItem {
                    checklist_id: list.id.clone(),
                    content: content.to_string(),
                })
                .unwrap()
                .id
            })
            .collect();

        db.delete_checklist_item(&ids[1]).unwrap();
        let toggled = db
            .update_checklist_item(
                &ids[2],
                &ChecklistItemUpdate {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(toggled.completed);

        let added = db
            .create_checklist_item(&NewChecklistItem {
                checklist_id: list.id.clone(),
                content: "d".to_string(),
            })
            .unwrap();
        assert_eq!(added.position, 3);

        let detail = db.get_task(&card.task.id).unwrap();
        let items: Vec<(i64, bool)> = detail.card.checklists[0]
            .items
            .iter()
            .map(|i| (i.position, i.completed))
            .collect();
        assert_eq!(items, [(0, false), (2, true), (3, false)]);
    }

    #[test]
    fn rename_and_missing_checklists() {
        let db = setup_db();
        let (_, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let list = db
            .create_checklist(&NewChecklist {
                task_id: card.task.id.clone(),
                title: "Old".to_string(),
            })
            .unwrap();

        assert_eq!(db.rename_checklist(&list.id, " New ").unwrap().title, "New");
        assert_eq!(
            code(db.rename_checklist(&list.id, "").unwrap_err()),
            ErrorCode::MissingRequiredField
        );
        assert_eq!(
            code(db.rename_checklist("nope", "x").unwrap_err()),
            ErrorCode::ChecklistNotFound
        );
        db.delete_checklist(&list.id).unwrap();
        assert_eq!(
            code(db.delete_checklist(&list.id).unwrap_err()),
            ErrorCode::ChecklistNotFound
        );
    }
}

mod comment_tests {
    use super::*;

    #[test]
    fn only_the_author_may_edit_or_delete() {
        let db = setup_db();
        let (author, _, column_id) = setup_board(&db);
        let other = register(&db, "other@example.com");
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let comment = db
            .create_comment(
                &author.id,
                &NewComment {
                    task_id: card.task.id.clone(),
                    content: "first draft".to_string(),
                },
            )
            .unwrap();

        assert_eq!(
            code(db.update_comment(&other.id, &comment.id, "hijack").unwrap_err()),
            ErrorCode::Forbidden
        );
        assert_eq!(
            code(db.delete_comment(&other.id, &comment.id).unwrap_err()),
            ErrorCode::Forbidden
        );

        let edited = db.update_comment(&author.id, &comment.id, "final").unwrap();
        assert_eq!(edited.content, "final");
        db.delete_comment(&author.id, &comment.id).unwrap();
        assert_eq!(
            code(db.delete_comment(&author.id, &comment.id).unwrap_err()),
            ErrorCode::CommentNotFound
        );
    }
}

mod time_entry_tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn entries_list_most_recent_first() {
        let db = setup_db();
        let (user, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let now = Utc::now();

        for (hours, days_ago) in [(1.0, 3), (2.0, 1), (3.0, 2)] {
            db.create_time_entry(
                &user.id,
                &NewTimeEntry {
                    task_id: card.task.id.clone(),
                    hours: Some(hours),
                    date: Some(now - Duration::days(days_ago)),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let hours: Vec<f64> = db
            .list_time_entries(&card.task.id)
            .unwrap()
            .iter()
            .map(|e| e.hours)
            .collect();
        assert_eq!(hours, [2.0, 3.0, 1.0]);
    }

    #[test]
    fn hours_must_be_positive() {
        let db = setup_db();
        let (user, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();

        let err = db
            .create_time_entry(
                &user.id,
                &NewTimeEntry {
                    task_id: card.task.id.clone(),
                    hours: Some(0.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);
    }

    #[test]
    fn only_the_owner_may_edit_or_delete() {
        let db = setup_db();
        let (owner, _, column_id) = setup_board(&db);
        let other = register(&db, "other@example.com");
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let entry = db
            .create_time_entry(
                &owner.id,
                &NewTimeEntry {
                    task_id: card.task.id.clone(),
                    hours: Some(2.0),
                    description: Some("pairing".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let update = TimeEntryUpdate {
            hours: Some(3.0),
            description: Some(None),
            ..Default::default()
        };
        let err = db
            .update_time_entry(&other.id, &entry.id, &update)
            .unwrap_err();
        let err = ApiError::from(err);
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert_eq!(err.message, "You can only edit your own time entries");

        let err = ApiError::from(db.delete_time_entry(&other.id, &entry.id).unwrap_err());
        assert_eq!(err.message, "You can only delete your own time entries");

        let updated = db.update_time_entry(&owner.id, &entry.id, &update).unwrap();
        assert_eq!(updated.hours, 3.0);
        assert!(updated.description.is_none());
        db.delete_time_entry(&owner.id, &entry.id).unwrap();
        assert!(db.list_time_entries(&card.task.id).unwrap().is_empty());
    }
}

mod attachment_tests {
    use super::*;
    use kanban_tracker::types::AttachmentUpload;
    use kanban_tracker::uploads::UploadDir;

    #[test]
    fn upload_read_and_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().with_uploads(UploadDir::new(dir.path()));
        let (_, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();

        let attachment = db
            .upload_attachment(&AttachmentUpload {
                task_id: card.task.id.clone(),
                filename: "notes.txt".to_string(),
                mimetype: "text/plain".to_string(),
                data: b"hello".to_vec(),
            })
            .unwrap();
        assert!(attachment.filepath.starts_with("/uploads/notes-"));
        assert_eq!(attachment.size, 5);

        let (meta, data) = db.attachment_content(&attachment.id).unwrap();
        assert_eq!(meta, attachment);
        assert_eq!(data, b"hello");

        let stored = dir
            .path()
            .join(attachment.filepath.trim_start_matches("/uploads/"));
        assert!(stored.exists());

        db.delete_attachment(&attachment.id).unwrap();
        assert!(!stored.exists());
        assert_eq!(
            code(db.attachment_content(&attachment.id).unwrap_err()),
            ErrorCode::AttachmentNotFound
        );
    }

    #[test]
    fn deleting_task_removes_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().with_uploads(UploadDir::new(dir.path()));
        let (_, _, column_id) = setup_board(&db);
        let card = db.create_task(&NewTask::new(&column_id, "t")).unwrap();
        let attachment = db
            .upload_attachment(&AttachmentUpload {
                task_id: card.task.id.clone(),
                filename: "diagram.png".to_string(),
                mimetype: "image/png".to_string(),
                data: vec![0x89, b'P', b'N', b'G'],
            })
            .unwrap();

        db.delete_task(&card.task.id).unwrap();

        let stored = dir
            .path()
            .join(attachment.filepath.trim_start_matches("/uploads/"));
        assert!(!stored.exists());
    }

    #[test]
    fn upload_to_missing_task_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().with_uploads(UploadDir::new(dir.path()));
        let err = db
            .upload_attachment(&AttachmentUpload {
                task_id: "nope".to_string(),
                filename: "a.txt".to_string(),
                mimetype: "text/plain".to_string(),
                data: Vec::new(),
            })
            .unwrap_err();
        assert_eq!(code(err), ErrorCode::TaskNotFound);
    }
}
