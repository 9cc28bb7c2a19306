//! Task comments.

use super::{Database, from_ms, new_id, now_ms, row_exists};
use crate::error::ApiError;
use crate::store::{COMMENT_FORBIDDEN, require_text};
use crate::types::{Comment, NewComment, UserSummary};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

const COMMENT_SELECT: &str = "SELECT c.id, c.task_id, c.author_id, c.content, c.created_at, c.updated_at,
            u.name AS author_name, u.email AS author_email, u.avatar AS author_avatar
     FROM comments c JOIN users u ON u.id = c.author_id";

fn parse_comment_row(row: &Row) -> rusqlite::Result<Comment> {
    let author_id: String = row.get("author_id")?;
    Ok(Comment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        author: UserSummary {
            id: author_id.clone(),
            name: row.get("author_name")?,
            email: row.get("author_email")?,
            avatar: row.get("author_avatar")?,
        },
        author_id,
        content: row.get("content")?,
        created_at: from_ms(row.get("created_at")?),
        updated_at: from_ms(row.get("updated_at")?),
    })
}

fn get_comment_internal(conn: &Connection, comment_id: &str) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
    Ok(conn
        .query_row(&sql, params![comment_id], parse_comment_row)
        .optional()?)
}

/// Comments on a task, oldest first.
pub(crate) fn task_comments(conn: &Connection, task_id: &str) -> Result<Vec<Comment>> {
    let sql = format!("{} WHERE c.task_id = ?1 ORDER BY c.created_at, c.id", COMMENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map(params![task_id], parse_comment_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}

/// Load a comment and check that `caller_id` wrote it.
fn authored_comment(conn: &Connection, caller_id: &str, comment_id: &str) -> Result<Comment> {
    let comment = get_comment_internal(conn, comment_id)?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;
    if comment.author_id != caller_id {
        return Err(ApiError::forbidden(COMMENT_FORBIDDEN).into());
    }
    Ok(comment)
}

impl Database {
    pub fn create_comment(&self, author_id: &str, input: &NewComment) -> Result<Comment> {
        input.validate()?;
        let comment_id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            if !row_exists(conn, "tasks", &input.task_id)? {
                return Err(ApiError::task_not_found(&input.task_id).into());
            }
            conn.execute(
                "INSERT INTO comments (id, task_id, author_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![comment_id, input.task_id, author_id, input.content.trim(), now],
            )?;

            info!(comment_id = %comment_id, task_id = %input.task_id, "Comment added");

            get_comment_internal(conn, &comment_id)?
                .ok_or_else(|| ApiError::comment_not_found(&comment_id).into())
        })
    }

    pub fn update_comment(&self, caller_id: &str, comment_id: &str, content: &str) -> Result<Comment> {
        require_text("content", content)?;
        self.with_conn(|conn| {
            let mut comment = authored_comment(conn, caller_id, comment_id)?;
            let now = now_ms();
            conn.execute(
                "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content.trim(), now, comment_id],
            )?;
            comment.content = content.trim().to_string();
            comment.updated_at = from_ms(now);
            Ok(comment)
        })
    }

    pub fn delete_comment(&self, caller_id: &str, comment_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            authored_comment(conn, caller_id, comment_id)?;
            conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
            info!(comment_id = %comment_id, "Comment deleted");
            Ok(())
        })
    }
}
