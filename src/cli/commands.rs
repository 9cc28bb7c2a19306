//! Implementations of the board subcommands.
//!
//! Everything except seeding goes through [`BoardStore`], so the same code
//! drives a local store and a remote tracker.

use anyhow::Result;
use tracing::info;

use crate::db::Database;
use crate::error::ApiError;
use crate::position::{ContainerOrder, Placement, plan_move};
use crate::store::BoardStore;
use crate::types::{DEFAULT_LABELS, NewLabel, NewProject, NewUser, ProjectType, Role, User};

/// Result of seeding a database.
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub user: User,
    pub created_user: bool,
    /// Set when a sample project was created.
    pub project_id: Option<String>,
}

/// Ensure an admin user exists and, on an empty database, create a sample
/// project with the default columns and labels.
pub fn seed_database(db: &Database, email: &str, name: &str, password: &str) -> Result<SeedReport> {
    let (user, created_user) = match db.get_user_by_email(email)? {
        Some(user) => (user, false),
        None => {
            let input = NewUser {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            };
            (db.create_user(&input, Role::Admin)?, true)
        }
    };

    let project_id = if db.list_projects()?.is_empty() {
        let project = NewProject {
            name: "Sample Project".to_string(),
            description: Some("Created by kanban-tracker seed".to_string()),
            project_type: ProjectType::General,
            labels: DEFAULT_LABELS
                .iter()
                .map(|(name, color)| NewLabel {
                    name: name.to_string(),
                    color: color.to_string(),
                })
                .collect(),
        };
        Some(db.create_project(&user.id, &project)?.project.id)
    } else {
        None
    };

    info!(user_id = %user.id, created_user, sample_project = ?project_id, "Seed complete");
    Ok(SeedReport {
        user,
        created_user,
        project_id,
    })
}

/// Move `task_id` to `index` of `column_id`, renumbering the affected
/// columns from the board's current order. Returns the submitted batch.
pub async fn move_task(
    store: &dyn BoardStore,
    task_id: &str,
    column_id: &str,
    index: usize,
) -> Result<Vec<Placement>, ApiError> {
    let detail = store.get_task(task_id).await?;
    let board = store.get_project(&detail.project_id).await?;

    let order_of = |id: &str| -> Result<ContainerOrder, ApiError> {
        let column = board
            .column(id)
            .ok_or_else(|| ApiError::column_not_found(id))?;
        Ok(ContainerOrder::new(
            id,
            column.tasks.iter().map(|t| t.task.id.clone()).collect(),
        ))
    };

    let source = order_of(&detail.card.task.column_id)?;
    let dest = order_of(column_id)?;
    let placements = plan_move(&source, Some(&dest), task_id, index)?;

    store.reorder_tasks(placements.clone()).await?;
    info!(task_id = %task_id, column_id = %column_id, index, "Task moved");
    Ok(placements)
}
