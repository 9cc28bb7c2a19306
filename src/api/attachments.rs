//! Attachment upload, download and removal.

use axum::{
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{
        HeaderName, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Json, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::ATTACHMENT_META_HEADER;
use super::auth::CurrentUser;
use super::server::{ApiServer, Success, success};
use crate::error::{ApiError, ApiResult};
use crate::types::{Attachment, AttachmentUpload};
use crate::uploads::guess_mimetype;

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::invalid_value("file", err.body_text())
}

/// Accept a multipart form with a `file` part and a `taskId` field.
pub(super) async fn upload_attachment(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    let mut task_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("taskId") => {
                task_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mimetype = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| guess_mimetype(&filename).to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, mimetype, data.to_vec()));
            }
            _ => {}
        }
    }

    let (Some(task_id), Some((filename, mimetype, data))) = (task_id, file) else {
        return Err(ApiError::missing_fields("File and taskId are required"));
    };
    if data.len() > state.max_upload_bytes() {
        return Err(ApiError::invalid_value(
            "file",
            format!(
                "File exceeds the upload limit of {} bytes",
                state.max_upload_bytes()
            ),
        ));
    }

    let attachment = state
        .store()
        .upload_attachment(AttachmentUpload {
            task_id,
            filename,
            mimetype,
            data,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// Header-safe rendition of a file name.
fn disposition_name(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Stream the stored content back. Metadata travels in
/// [`ATTACHMENT_META_HEADER`] as base64 JSON.
pub(super) async fn download_attachment(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (attachment, data) = state.store().attachment_content(&id).await?;
    let meta = serde_json::to_vec(&attachment).map_err(ApiError::internal)?;

    let headers = [
        (CONTENT_TYPE, attachment.mimetype.clone()),
        (
            CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                disposition_name(&attachment.filename)
            ),
        ),
        (
            HeaderName::from_static(ATTACHMENT_META_HEADER),
            STANDARD.encode(meta),
        ),
    ];
    Ok((headers, data).into_response())
}

pub(super) async fn delete_attachment(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_attachment(&id).await?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_name_strips_quotes_and_non_ascii() {
        assert_eq!(disposition_name("report \"final\".pdf"), "report _final_.pdf");
        assert_eq!(disposition_name("résumé.txt"), "r_sum_.txt");
    }
}
