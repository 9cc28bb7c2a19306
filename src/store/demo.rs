//! Seed data for demo mode.

use chrono::{Duration, Utc};

use super::memory::{BoardData, StoredUser};
use crate::types::{
    Checklist, ChecklistItem, Column, Comment, DEFAULT_COLUMNS, DEFAULT_LABELS, Label, Priority,
    Project, ProjectType, Role, Task, User, UserSummary,
};

pub const DEMO_USER_ID: &str = "demo-user-1";
pub const DEMO_PROJECT_ID: &str = "demo-project-1";

/// The user every request acts as in demo mode.
pub fn demo_user() -> User {
    User {
        id: DEMO_USER_ID.to_string(),
        email: "demo@example.com".to_string(),
        name: "Demo User".to_string(),
        role: Role::Admin,
        avatar: None,
        created_at: Utc::now(),
    }
}

/// One project with five columns, three tasks, a checklist, a comment and
/// the default labels.
pub fn demo_data() -> BoardData {
    let now = Utc::now();
    let user = demo_user();
    let author = UserSummary::from(&user);

    let project = Project {
        id: DEMO_PROJECT_ID.to_string(),
        name: "AI Team Project Tracker".to_string(),
        description: Some("Track all AI adoption team projects and tasks".to_string()),
        project_type: ProjectType::Internal,
        archived: false,
        owner_id: user.id.clone(),
        created_at: now,
        updated_at: now,
    };

    let columns = (0i64..)
        .zip(DEFAULT_COLUMNS)
        .map(|(position, name)| Column {
            id: format!("col-{}", position + 1),
            project_id: project.id.clone(),
            name: name.to_string(),
            position,
        })
        .collect();

    let labels = (1..)
        .zip(DEFAULT_LABELS)
        .map(|(n, (name, color))| Label {
            id: format!("label-{}", n),
            project_id: project.id.clone(),
            name: name.to_string(),
            color: color.to_string(),
        })
        .collect();

    let task = |id: &str,
                column: &str,
                title: &str,
                description: &str,
                priority: Priority,
                due_in_days: Option<i64>| Task {
        id: id.to_string(),
        column_id: column.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        position: 0,
        priority,
        due_date: due_in_days.map(|days| now + Duration::days(days)),
        assignee_id: Some(user.id.clone()),
        estimated_hours: None,
        created_at: now,
        updated_at: now,
    };

    let mut setup = task(
        "task-3",
        "col-5",
        "Project setup and configuration",
        "Initialize the project skeleton and build tooling",
        Priority::Medium,
        None,
    );
    setup.created_at = now - Duration::days(7);

    let tasks = vec![
        task(
            "task-1",
            "col-2",
            "Design new dashboard layout",
            "Create wireframes and mockups for the new dashboard",
            Priority::High,
            Some(7),
        ),
        task(
            "task-2",
            "col-3",
            "Implement user authentication",
            "Set up credential-based login",
            Priority::High,
            Some(3),
        ),
        setup,
    ];

    let checklists = vec![Checklist {
        id: "checklist-1".to_string(),
        task_id: "task-1".to_string(),
        title: "Design Tasks".to_string(),
        position: 0,
        items: Vec::new(),
    }];

    let checklist_items = (0i64..)
        .zip([
            ("Create wireframes", true),
            ("Design mockups", false),
            ("Get feedback", false),
        ])
        .map(|(position, (content, completed))| ChecklistItem {
            id: format!("item-{}", position + 1),
            checklist_id: "checklist-1".to_string(),
            content: content.to_string(),
            completed,
            position,
        })
        .collect();

    let comments = vec![Comment {
        id: "comment-1".to_string(),
        task_id: "task-2".to_string(),
        author_id: user.id.clone(),
        author,
        content: "Started working on this. Will have a PR ready by tomorrow.".to_string(),
        created_at: now,
        updated_at: now,
    }];

    BoardData {
        users: vec![StoredUser {
            user,
            password_hash: None,
        }],
        projects: vec![project],
        columns,
        labels,
        tasks,
        checklists,
        checklist_items,
        comments,
        ..Default::default()
    }
}
