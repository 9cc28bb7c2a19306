//! Task CRUD and batch reordering.

use super::attachments::task_attachments;
use super::checklists::task_checklists;
use super::comments::task_comments;
use super::projects::{column_project_id, task_labels};
use super::time_entries::task_time_entries;
use super::users::user_summary_internal;
use super::{Database, enum_column, from_ms, new_id, now_ms, row_exists, to_ms};
use crate::error::ApiError;
use crate::position::{self, DensityPolicy, Placement, Position};
use crate::types::{NewTask, Priority, Task, TaskCard, TaskCounts, TaskDetail, TaskUpdate};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use tracing::{debug, info};

const TASK_COLUMNS: &str = "id, column_id, title, description, position, priority, due_date, \
                            assignee_id, estimated_hours, created_at, updated_at";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let due_date: Option<i64> = row.get("due_date")?;
    Ok(Task {
        id: row.get("id")?,
        column_id: row.get("column_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        position: row.get("position")?,
        priority: enum_column(row, "priority", "priority", Priority::parse)?,
        due_date: due_date.map(from_ms),
        assignee_id: row.get("assignee_id")?,
        estimated_hours: row.get("estimated_hours")?,
        created_at: from_ms(row.get("created_at")?),
        updated_at: from_ms(row.get("updated_at")?),
    })
}

pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    Ok(conn
        .query_row(&sql, params![task_id], parse_task_row)
        .optional()?)
}

/// Positions currently used in a column.
fn column_positions(conn: &Connection, column_id: &str) -> Result<Vec<Position>> {
    let mut stmt = conn.prepare("SELECT position FROM tasks WHERE column_id = ?1")?;
    let positions = stmt
        .query_map(params![column_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Position>>>()?;
    Ok(positions)
}

/// Decorate a task with everything the board card shows.
pub(crate) fn task_card_internal(conn: &Connection, task: Task) -> Result<TaskCard> {
    let assignee = match task.assignee_id {
        Some(ref id) => Some(user_summary_internal(conn, id)?),
        None => None,
    };
    let checklists = task_checklists(conn, &task.id)?;
    let labels = task_labels(conn, &task.id)?;
    let (comments, attachments, logged_hours): (i64, i64, f64) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM comments WHERE task_id = ?1),
            (SELECT COUNT(*) FROM attachments WHERE task_id = ?1),
            (SELECT COALESCE(SUM(hours), 0.0) FROM time_entries WHERE task_id = ?1)",
        params![task.id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(TaskCard {
        task,
        assignee,
        checklists,
        labels,
        counts: TaskCounts {
            comments,
            attachments,
        },
        logged_hours,
    })
}

/// Task cards of a column in display order.
pub(crate) fn column_task_cards(conn: &Connection, column_id: &str) -> Result<Vec<TaskCard>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE column_id = ?1 ORDER BY position, created_at",
        TASK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![column_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    tasks
        .into_iter()
        .map(|task| task_card_internal(conn, task))
        .collect()
}

/// Replace a task's label set with labels of its own project.
fn sync_task_labels(
    conn: &Connection,
    task_id: &str,
    project_id: &str,
    label_ids: &[String],
) -> Result<()> {
    conn.execute("DELETE FROM task_labels WHERE task_id = ?1", params![task_id])?;
    for label_id in label_ids {
        let belongs: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM labels WHERE id = ?1 AND project_id = ?2)",
            params![label_id, project_id],
            |row| row.get(0),
        )?;
        if !belongs {
            return Err(ApiError::invalid_value(
                "labelIds",
                format!("Label {} does not belong to this project", label_id),
            )
            .into());
        }
        conn.execute(
            "INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?1, ?2)",
            params![task_id, label_id],
        )?;
    }
    Ok(())
}

fn ensure_assignee(conn: &Connection, assignee_id: Option<&str>) -> Result<()> {
    if let Some(id) = assignee_id {
        if !row_exists(conn, "users", id)? {
            return Err(ApiError::user_not_found(id).with_field("assigneeId").into());
        }
    }
    Ok(())
}

impl Database {
    /// Create a task at the end of its column.
    pub fn create_task(&self, input: &NewTask) -> Result<TaskCard> {
        input.validate()?;
        let now = now_ms();
        let task_id = new_id();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let project_id = column_project_id(&tx, &input.column_id)?
                .ok_or_else(|| ApiError::column_not_found(&input.column_id))?;
            ensure_assignee(&tx, input.assignee_id.as_deref())?;

            let max: Option<Position> = tx.query_row(
                "SELECT MAX(position) FROM tasks WHERE column_id = ?1",
                params![input.column_id],
                |row| row.get(0),
            )?;
            let task_position = position::append_position(max).map_err(ApiError::from)?;

            tx.execute(
                "INSERT INTO tasks (id, column_id, title, description, position, priority, due_date,
                                    assignee_id, estimated_hours, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    task_id,
                    input.column_id,
                    input.title.trim(),
                    input.description,
                    task_position,
                    input.priority.as_str(),
                    input.due_date.map(to_ms),
                    input.assignee_id,
                    input.estimated_hours,
                    now,
                ],
            )?;

            if !input.label_ids.is_empty() {
                sync_task_labels(&tx, &task_id, &project_id, &input.label_ids)?;
            }

            tx.commit()?;

            info!(
                task_id = %task_id,
                column_id = %input.column_id,
                position = task_position,
                "Task created"
            );

            let task = get_task_internal(conn, &task_id)?
                .ok_or_else(|| ApiError::task_not_found(&task_id))?;
            task_card_internal(conn, task)
        })
    }

    /// Load a task with comments, attachments and time entries.
    pub fn get_task(&self, task_id: &str) -> Result<TaskDetail> {
        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;
            let project_id = column_project_id(conn, &task.column_id)?
                .ok_or_else(|| ApiError::column_not_found(&task.column_id))?;
            let card = task_card_internal(conn, task)?;

            debug!(task_id = %task_id, "Loaded task detail");

            Ok(TaskDetail {
                project_id,
                comments: task_comments(conn, task_id)?,
                attachments: task_attachments(conn, task_id)?,
                time_entries: task_time_entries(conn, task_id)?,
                card,
            })
        })
    }

    /// Apply a partial update. Position and column are only changed by reordering.
    pub fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<TaskCard> {
        update.validate()?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            if let Some(ref title) = update.title {
                task.title = title.trim().to_string();
            }
            if let Some(ref description) = update.description {
                task.description = description.clone();
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(due_date) = update.due_date {
                task.due_date = due_date;
            }
            if let Some(ref assignee_id) = update.assignee_id {
                ensure_assignee(&tx, assignee_id.as_deref())?;
                task.assignee_id = assignee_id.clone();
            }
            if let Some(estimated_hours) = update.estimated_hours {
                task.estimated_hours = estimated_hours;
            }

            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, due_date = ?4,
                                  assignee_id = ?5, estimated_hours = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date.map(to_ms),
                    task.assignee_id,
                    task.estimated_hours,
                    now_ms(),
                    task_id,
                ],
            )?;

            if let Some(ref label_ids) = update.label_ids {
                let project_id = column_project_id(&tx, &task.column_id)?
                    .ok_or_else(|| ApiError::column_not_found(&task.column_id))?;
                sync_task_labels(&tx, task_id, &project_id, label_ids)?;
            }

            tx.commit()?;

            info!(task_id = %task_id, "Task updated");

            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;
            task_card_internal(conn, task)
        })
    }

    /// Delete a task. The rest of its column keeps its positions.
    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        let files = self.with_conn(|conn| {
            if !row_exists(conn, "tasks", task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            let mut stmt = conn.prepare("SELECT filepath FROM attachments WHERE task_id = ?1")?;
            let files = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(files)
        })?;

        self.remove_upload_files(&files);
        info!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    /// Apply a batch of placements in one transaction.
    ///
    /// Every referenced task and column must exist; otherwise nothing is
    /// written. Under [`DensityPolicy::Strict`] each touched column must end
    /// up numbered `0..N-1`.
    pub fn reorder_tasks(&self, placements: &[Placement]) -> Result<()> {
        position::validate_batch(placements).map_err(ApiError::from)?;
        let density = self.density;
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut touched = BTreeSet::new();

            for placement in placements {
                if !row_exists(&tx, "columns", &placement.container_id)? {
                    return Err(ApiError::column_not_found(&placement.container_id).into());
                }

                let previous: Option<String> = tx
                    .query_row(
                        "SELECT column_id FROM tasks WHERE id = ?1",
                        params![placement.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let previous = previous.ok_or_else(|| ApiError::task_not_found(&placement.id))?;

                tx.execute(
                    "UPDATE tasks SET column_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
                    params![placement.container_id, placement.position, now, placement.id],
                )?;

                touched.insert(previous);
                touched.insert(placement.container_id.clone());
            }

            if density == DensityPolicy::Strict {
                for column_id in &touched {
                    let positions = column_positions(&tx, column_id)?;
                    position::check_dense(column_id, positions).map_err(ApiError::from)?;
                }
            }

            tx.commit().map_err(ApiError::storage_failure)?;

            info!(
                placements = placements.len(),
                columns = touched.len(),
                "Tasks reordered"
            );
            Ok(())
        })
    }

    /// Current positions of a column's tasks, in display order.
    pub fn column_order(&self, column_id: &str) -> Result<Vec<(String, Position)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, position FROM tasks WHERE column_id = ?1 ORDER BY position, created_at",
            )?;
            let order = stmt
                .query_map(params![column_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(order)
        })
    }
}
