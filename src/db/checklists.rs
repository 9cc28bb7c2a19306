//! Checklists within tasks and items within checklists.

use super::{Database, new_id, row_exists};
use crate::error::ApiError;
use crate::position::{self, Position};
use crate::store::require_text;
use crate::types::{Checklist, ChecklistItem, ChecklistItemUpdate, NewChecklist, NewChecklistItem};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

fn parse_item_row(row: &Row) -> rusqlite::Result<ChecklistItem> {
    let completed: i32 = row.get("completed")?;
    Ok(ChecklistItem {
        id: row.get("id")?,
        checklist_id: row.get("checklist_id")?,
        content: row.get("content")?,
        completed: completed != 0,
        position: row.get("position")?,
    })
}

fn checklist_items(conn: &Connection, checklist_id: &str) -> Result<Vec<ChecklistItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, checklist_id, content, completed, position FROM checklist_items
         WHERE checklist_id = ?1 ORDER BY position",
    )?;
    let items = stmt
        .query_map(params![checklist_id], parse_item_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

fn get_checklist_internal(conn: &Connection, checklist_id: &str) -> Result<Option<Checklist>> {
    let row: Option<(String, String, String, Position)> = conn
        .query_row(
            "SELECT id, task_id, title, position FROM checklists WHERE id = ?1",
            params![checklist_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    match row {
        Some((id, task_id, title, position)) => {
            let items = checklist_items(conn, &id)?;
            Ok(Some(Checklist {
                id,
                task_id,
                title,
                position,
                items,
            }))
        }
        None => Ok(None),
    }
}

fn get_item_internal(conn: &Connection, item_id: &str) -> Result<Option<ChecklistItem>> {
    Ok(conn
        .query_row(
            "SELECT id, checklist_id, content, completed, position FROM checklist_items WHERE id = ?1",
            params![item_id],
            parse_item_row,
        )
        .optional()?)
}

/// Checklists of a task in display order, each with its ordered items.
pub(crate) fn task_checklists(conn: &Connection, task_id: &str) -> Result<Vec<Checklist>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, title, position FROM checklists WHERE task_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![task_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<rusqlite::Result<Vec<(String, String, String, Position)>>>()?;

    rows.into_iter()
        .map(|(id, task_id, title, position)| {
            let items = checklist_items(conn, &id)?;
            Ok(Checklist {
                id,
                task_id,
                title,
                position,
                items,
            })
        })
        .collect()
}

impl Database {
    /// Append a checklist to a task.
    pub fn create_checklist(&self, input: &NewChecklist) -> Result<Checklist> {
        input.validate()?;
        let checklist_id = new_id();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !row_exists(&tx, "tasks", &input.task_id)? {
                return Err(ApiError::task_not_found(&input.task_id).into());
            }

            let max: Option<Position> = tx.query_row(
                "SELECT MAX(position) FROM checklists WHERE task_id = ?1",
                params![input.task_id],
                |row| row.get(0),
            )?;
            let checklist_position = position::append_position(max).map_err(ApiError::from)?;

            tx.execute(
                "INSERT INTO checklists (id, task_id, title, position) VALUES (?1, ?2, ?3, ?4)",
                params![checklist_id, input.task_id, input.title.trim(), checklist_position],
            )?;
            tx.commit()?;

            info!(checklist_id = %checklist_id, task_id = %input.task_id, "Checklist created");

            Ok(Checklist {
                id: checklist_id.clone(),
                task_id: input.task_id.clone(),
                title: input.title.trim().to_string(),
                position: checklist_position,
                items: Vec::new(),
            })
        })
    }

    pub fn rename_checklist(&self, checklist_id: &str, title: &str) -> Result<Checklist> {
        require_text("title", title)?;
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE checklists SET title = ?1 WHERE id = ?2",
                params![title.trim(), checklist_id],
            )?;
            if updated == 0 {
                return Err(ApiError::checklist_not_found(checklist_id).into());
            }
            get_checklist_internal(conn, checklist_id)?
                .ok_or_else(|| ApiError::checklist_not_found(checklist_id).into())
        })
    }

    /// Delete a checklist. Sibling checklists keep their positions.
    pub fn delete_checklist(&self, checklist_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM checklists WHERE id = ?1", params![checklist_id])?;
            if deleted == 0 {
                return Err(ApiError::checklist_not_found(checklist_id).into());
            }
            info!(checklist_id = %checklist_id, "Checklist deleted");
            Ok(())
        })
    }

    /// Append an item to a checklist.
    pub fn create_checklist_item(&self, input: &NewChecklistItem) -> Result<ChecklistItem> {
        input.validate()?;
        let item_id = new_id();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !row_exists(&tx, "checklists", &input.checklist_id)? {
                return Err(ApiError::checklist_not_found(&input.checklist_id).into());
            }

            let max: Option<Position> = tx.query_row(
                "SELECT MAX(position) FROM checklist_items WHERE checklist_id = ?1",
                params![input.checklist_id],
                |row| row.get(0),
            )?;
            let item_position = position::append_position(max).map_err(ApiError::from)?;

            tx.execute(
                "INSERT INTO checklist_items (id, checklist_id, content, completed, position)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![item_id, input.checklist_id, input.content.trim(), item_position],
            )?;
            tx.commit()?;

            Ok(ChecklistItem {
                id: item_id.clone(),
                checklist_id: input.checklist_id.clone(),
                content: input.content.trim().to_string(),
                completed: false,
                position: item_position,
            })
        })
    }

    pub fn update_checklist_item(
        &self,
        item_id: &str,
        update: &ChecklistItemUpdate,
    ) -> Result<ChecklistItem> {
        update.validate()?;
        self.with_conn(|conn| {
            let mut item = get_item_internal(conn, item_id)?
                .ok_or_else(|| ApiError::checklist_item_not_found(item_id))?;

            if let Some(ref content) = update.content {
                item.content = content.trim().to_string();
            }
            if let Some(completed) = update.completed {
                item.completed = completed;
            }

            conn.execute(
                "UPDATE checklist_items SET content = ?1, completed = ?2 WHERE id = ?3",
                params![item.content, item.completed as i32, item_id],
            )?;
            Ok(item)
        })
    }

    /// Delete an item. Remaining items keep their positions.
    pub fn delete_checklist_item(&self, item_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM checklist_items WHERE id = ?1", params![item_id])?;
            if deleted == 0 {
                return Err(ApiError::checklist_item_not_found(item_id).into());
            }
            Ok(())
        })
    }
}
