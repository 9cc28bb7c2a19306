//! Attachment records and their stored files.

use super::{Database, from_ms, new_id, now_ms, row_exists};
use crate::error::ApiError;
use crate::types::{Attachment, AttachmentUpload};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, warn};

const ATTACHMENT_COLUMNS: &str = "id, task_id, filename, filepath, mimetype, size, created_at";

fn parse_attachment_row(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        filename: row.get("filename")?,
        filepath: row.get("filepath")?,
        mimetype: row.get("mimetype")?,
        size: row.get("size")?,
        created_at: from_ms(row.get("created_at")?),
    })
}

fn get_attachment_internal(conn: &Connection, attachment_id: &str) -> Result<Option<Attachment>> {
    let sql = format!("SELECT {} FROM attachments WHERE id = ?1", ATTACHMENT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![attachment_id], parse_attachment_row)
        .optional()?)
}

/// Attachments of a task, newest first.
pub(crate) fn task_attachments(conn: &Connection, task_id: &str) -> Result<Vec<Attachment>> {
    let sql = format!(
        "SELECT {} FROM attachments WHERE task_id = ?1 ORDER BY created_at DESC, id DESC",
        ATTACHMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let attachments = stmt
        .query_map(params![task_id], parse_attachment_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(attachments)
}

impl Database {
    fn require_uploads(&self) -> Result<&crate::uploads::UploadDir> {
        self.uploads()
            .ok_or_else(|| ApiError::storage_failure("no upload directory configured").into())
    }

    /// Store an uploaded file and record it against its task.
    pub fn upload_attachment(&self, upload: &AttachmentUpload) -> Result<Attachment> {
        upload.validate()?;
        let uploads = self.require_uploads()?;

        if !self.with_conn(|conn| row_exists(conn, "tasks", &upload.task_id))? {
            return Err(ApiError::task_not_found(&upload.task_id).into());
        }

        let filepath = uploads
            .save(&upload.filename, &upload.data)
            .map_err(ApiError::storage_failure)?;
        let attachment = Attachment {
            id: new_id(),
            task_id: upload.task_id.clone(),
            filename: upload.filename.clone(),
            filepath,
            mimetype: upload.mimetype.clone(),
            size: upload.data.len() as i64,
            created_at: from_ms(now_ms()),
        };

        let inserted = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (id, task_id, filename, filepath, mimetype, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    attachment.id,
                    attachment.task_id,
                    attachment.filename,
                    attachment.filepath,
                    attachment.mimetype,
                    attachment.size,
                    attachment.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        });

        if let Err(e) = inserted {
            // The record never landed; do not leave an orphaned file behind.
            self.remove_upload_files(std::slice::from_ref(&attachment.filepath));
            return Err(e);
        }

        info!(
            attachment_id = %attachment.id,
            task_id = %attachment.task_id,
            size = attachment.size,
            "Attachment stored"
        );
        Ok(attachment)
    }

    pub fn get_attachment(&self, attachment_id: &str) -> Result<Attachment> {
        self.with_conn(|conn| {
            get_attachment_internal(conn, attachment_id)?
                .ok_or_else(|| ApiError::attachment_not_found(attachment_id).into())
        })
    }

    /// Attachment record with its file content.
    pub fn attachment_content(&self, attachment_id: &str) -> Result<(Attachment, Vec<u8>)> {
        let attachment = self.get_attachment(attachment_id)?;
        let data = self
            .require_uploads()?
            .read(&attachment.filepath)
            .map_err(ApiError::storage_failure)?;
        Ok((attachment, data))
    }

    /// Delete an attachment record and its file.
    pub fn delete_attachment(&self, attachment_id: &str) -> Result<()> {
        let attachment = self.get_attachment(attachment_id)?;
        self.with_conn(|conn| {
            conn.execute("DELETE FROM attachments WHERE id = ?1", params![attachment_id])?;
            Ok(())
        })?;
        self.remove_upload_files(std::slice::from_ref(&attachment.filepath));
        info!(attachment_id = %attachment_id, "Attachment deleted");
        Ok(())
    }

    /// Best-effort removal of stored files whose records are gone.
    pub(crate) fn remove_upload_files(&self, files: &[String]) {
        let Some(uploads) = self.uploads() else {
            return;
        };
        for file in files {
            if let Err(e) = uploads.remove(file) {
                warn!(file = %file, error = %e, "Failed to remove attachment file");
            }
        }
    }
}
