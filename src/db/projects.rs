//! Project, column and label operations.

use super::tasks::column_task_cards;
use super::users::user_summary_internal;
use super::{Database, enum_column, from_ms, new_id, now_ms};
use crate::error::ApiError;
use crate::types::{
    BoardColumn, Column, ColumnSummary, DEFAULT_COLUMNS, Label, NewProject, Project, ProjectBoard,
    ProjectSummary, ProjectType, ProjectUpdate,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

const PROJECT_COLUMNS: &str =
    "id, name, description, type, archived, owner_id, created_at, updated_at";

pub(crate) fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    let archived: i32 = row.get("archived")?;
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        project_type: enum_column(row, "type", "project type", ProjectType::parse)?,
        archived: archived != 0,
        owner_id: row.get("owner_id")?,
        created_at: from_ms(row.get("created_at")?),
        updated_at: from_ms(row.get("updated_at")?),
    })
}

fn parse_column_row(row: &Row) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
    })
}

fn parse_label_row(row: &Row) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        color: row.get("color")?,
    })
}

pub(crate) fn get_project_internal(conn: &Connection, project_id: &str) -> Result<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![project_id], parse_project_row)
        .optional()?)
}

pub(crate) fn project_columns(conn: &Connection, project_id: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, position FROM columns
         WHERE project_id = ?1 ORDER BY position",
    )?;
    let columns = stmt
        .query_map(params![project_id], parse_column_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub(crate) fn project_labels(conn: &Connection, project_id: &str) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, color FROM labels WHERE project_id = ?1 ORDER BY name",
    )?;
    let labels = stmt
        .query_map(params![project_id], parse_label_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(labels)
}

pub(crate) fn task_labels(conn: &Connection, task_id: &str) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.project_id, l.name, l.color
         FROM labels l JOIN task_labels tl ON tl.label_id = l.id
         WHERE tl.task_id = ?1 ORDER BY l.name",
    )?;
    let labels = stmt
        .query_map(params![task_id], parse_label_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(labels)
}

/// The project that owns `column_id`, if the column exists.
pub(crate) fn column_project_id(conn: &Connection, column_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT project_id FROM columns WHERE id = ?1",
            params![column_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn load_board(conn: &Connection, project: Project) -> Result<ProjectBoard> {
    let owner = user_summary_internal(conn, &project.owner_id)?;
    let mut columns = Vec::new();
    for column in project_columns(conn, &project.id)? {
        let tasks = column_task_cards(conn, &column.id)?;
        columns.push(BoardColumn { column, tasks });
    }
    let labels = project_labels(conn, &project.id)?;
    Ok(ProjectBoard {
        project,
        owner,
        columns,
        labels,
    })
}

/// Stored files of every attachment under a project.
fn project_attachment_paths(conn: &Connection, project_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.filepath FROM attachments a
         JOIN tasks t ON t.id = a.task_id
         JOIN columns c ON c.id = t.column_id
         WHERE c.project_id = ?1",
    )?;
    let paths = stmt
        .query_map(params![project_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(paths)
}

impl Database {
    /// List non-archived projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM projects WHERE archived = 0 ORDER BY created_at DESC, id DESC",
                PROJECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut count_stmt =
                conn.prepare("SELECT COUNT(*) FROM tasks WHERE column_id = ?1")?;

            let mut summaries = Vec::with_capacity(projects.len());
            for project in projects {
                let owner = user_summary_internal(conn, &project.owner_id)?;
                let mut columns = Vec::new();
                for column in project_columns(conn, &project.id)? {
                    let task_count: i64 =
                        count_stmt.query_row(params![column.id], |row| row.get(0))?;
                    columns.push(ColumnSummary { column, task_count });
                }
                summaries.push(ProjectSummary {
                    project,
                    owner,
                    columns,
                });
            }

            debug!(count = summaries.len(), "Listed projects");
            Ok(summaries)
        })
    }

    /// Load a project board: columns in order, each with its ordered tasks.
    pub fn get_project(&self, project_id: &str) -> Result<ProjectBoard> {
        self.with_conn(|conn| {
            let project = get_project_internal(conn, project_id)?
                .ok_or_else(|| ApiError::project_not_found(project_id))?;
            load_board(conn, project)
        })
    }

    /// Create a project with the default columns and any requested labels.
    pub fn create_project(&self, owner_id: &str, input: &NewProject) -> Result<ProjectBoard> {
        input.validate()?;
        let now = now_ms();
        let project_id = new_id();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !super::row_exists(&tx, "users", owner_id)? {
                return Err(ApiError::user_not_found(owner_id).into());
            }

            tx.execute(
                "INSERT INTO projects (id, name, description, type, archived, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)",
                params![
                    project_id,
                    input.name.trim(),
                    input.description,
                    input.project_type.as_str(),
                    owner_id,
                    now,
                ],
            )?;

            for (position, name) in (0i64..).zip(DEFAULT_COLUMNS) {
                tx.execute(
                    "INSERT INTO columns (id, project_id, name, position, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![new_id(), project_id, name, position, now],
                )?;
            }

            for label in &input.labels {
                tx.execute(
                    "INSERT INTO labels (id, project_id, name, color) VALUES (?1, ?2, ?3, ?4)",
                    params![new_id(), project_id, label.name, label.color],
                )?;
            }

            tx.commit()?;

            info!(project_id = %project_id, owner_id = %owner_id, "Project created");

            let project = get_project_internal(conn, &project_id)?
                .ok_or_else(|| ApiError::project_not_found(&project_id))?;
            load_board(conn, project)
        })
    }

    pub fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project> {
        update.validate()?;
        self.with_conn(|conn| {
            let mut project = get_project_internal(conn, project_id)?
                .ok_or_else(|| ApiError::project_not_found(project_id))?;

            if let Some(ref name) = update.name {
                project.name = name.trim().to_string();
            }
            if let Some(ref description) = update.description {
                project.description = description.clone();
            }
            if let Some(project_type) = update.project_type {
                project.project_type = project_type;
            }
            if let Some(archived) = update.archived {
                project.archived = archived;
            }
            let now = now_ms();

            conn.execute(
                "UPDATE projects SET name = ?1, description = ?2, type = ?3, archived = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    project.name,
                    project.description,
                    project.project_type.as_str(),
                    project.archived as i32,
                    now,
                    project_id,
                ],
            )?;
            project.updated_at = from_ms(now);

            info!(project_id = %project_id, "Project updated");
            Ok(project)
        })
    }

    /// Delete a project with its columns, tasks and their attachment files.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        let files = self.with_conn(|conn| {
            if !super::row_exists(conn, "projects", project_id)? {
                return Err(ApiError::project_not_found(project_id).into());
            }
            let files = project_attachment_paths(conn, project_id)?;
            conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            Ok(files)
        })?;

        self.remove_upload_files(&files);
        info!(project_id = %project_id, files = files.len(), "Project deleted");
        Ok(())
    }
}
