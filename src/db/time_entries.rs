//! Hours logged against tasks.

use super::{Database, from_ms, new_id, now_ms, row_exists, to_ms};
use crate::error::ApiError;
use crate::store::{TIME_ENTRY_DELETE_FORBIDDEN, TIME_ENTRY_EDIT_FORBIDDEN};
use crate::types::{NewTimeEntry, TimeEntry, TimeEntryUpdate, UserSummary};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

const ENTRY_SELECT: &str = "SELECT e.id, e.task_id, e.user_id, e.hours, e.description, e.date, e.created_at,
            u.name AS user_name, u.email AS user_email, u.avatar AS user_avatar
     FROM time_entries e JOIN users u ON u.id = e.user_id";

fn parse_entry_row(row: &Row) -> rusqlite::Result<TimeEntry> {
    let user_id: String = row.get("user_id")?;
    Ok(TimeEntry {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user: UserSummary {
            id: user_id.clone(),
            name: row.get("user_name")?,
            email: row.get("user_email")?,
            avatar: row.get("user_avatar")?,
        },
        user_id,
        hours: row.get("hours")?,
        description: row.get("description")?,
        date: from_ms(row.get("date")?),
        created_at: from_ms(row.get("created_at")?),
    })
}

fn get_entry_internal(conn: &Connection, entry_id: &str) -> Result<Option<TimeEntry>> {
    let sql = format!("{} WHERE e.id = ?1", ENTRY_SELECT);
    Ok(conn
        .query_row(&sql, params![entry_id], parse_entry_row)
        .optional()?)
}

/// Time entries of a task, most recent date first.
pub(crate) fn task_time_entries(conn: &Connection, task_id: &str) -> Result<Vec<TimeEntry>> {
    let sql = format!(
        "{} WHERE e.task_id = ?1 ORDER BY e.date DESC, e.created_at DESC",
        ENTRY_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![task_id], parse_entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn owned_entry(
    conn: &Connection,
    caller_id: &str,
    entry_id: &str,
    forbidden: &str,
) -> Result<TimeEntry> {
    let entry = get_entry_internal(conn, entry_id)?
        .ok_or_else(|| ApiError::time_entry_not_found(entry_id))?;
    if entry.user_id != caller_id {
        return Err(ApiError::forbidden(forbidden).into());
    }
    Ok(entry)
}

impl Database {
    pub fn list_time_entries(&self, task_id: &str) -> Result<Vec<TimeEntry>> {
        self.with_conn(|conn| task_time_entries(conn, task_id))
    }

    /// Log hours against a task. The date defaults to now.
    pub fn create_time_entry(&self, user_id: &str, input: &NewTimeEntry) -> Result<TimeEntry> {
        let hours = input.validate()?;
        let entry_id = new_id();
        let now = now_ms();
        let date = input.date.map(to_ms).unwrap_or(now);

        self.with_conn(|conn| {
            if !row_exists(conn, "tasks", &input.task_id)? {
                return Err(ApiError::task_not_found(&input.task_id).into());
            }
            conn.execute(
                "INSERT INTO time_entries (id, task_id, user_id, hours, description, date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![entry_id, input.task_id, user_id, hours, input.description, date, now],
            )?;

            info!(entry_id = %entry_id, task_id = %input.task_id, hours, "Time logged");

            get_entry_internal(conn, &entry_id)?
                .ok_or_else(|| ApiError::time_entry_not_found(&entry_id).into())
        })
    }

    pub fn update_time_entry(
        &self,
        caller_id: &str,
        entry_id: &str,
        update: &TimeEntryUpdate,
    ) -> Result<TimeEntry> {
        update.validate()?;
        self.with_conn(|conn| {
            let mut entry = owned_entry(conn, caller_id, entry_id, TIME_ENTRY_EDIT_FORBIDDEN)?;

            if let Some(hours) = update.hours {
                entry.hours = hours;
            }
            if let Some(ref description) = update.description {
                entry.description = description.clone();
            }
            if let Some(date) = update.date {
                entry.date = date;
            }

            conn.execute(
                "UPDATE time_entries SET hours = ?1, description = ?2, date = ?3 WHERE id = ?4",
                params![entry.hours, entry.description, to_ms(entry.date), entry_id],
            )?;
            Ok(entry)
        })
    }

    pub fn delete_time_entry(&self, caller_id: &str, entry_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            owned_entry(conn, caller_id, entry_id, TIME_ENTRY_DELETE_FORBIDDEN)?;
            conn.execute("DELETE FROM time_entries WHERE id = ?1", params![entry_id])?;
            info!(entry_id = %entry_id, "Time entry deleted");
            Ok(())
        })
    }
}
