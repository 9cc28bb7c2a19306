//! [`BoardStore`] that talks to another tracker over its REST API.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::BoardStore;
use crate::api::{ATTACHMENT_META_HEADER, Success};
use crate::error::{ApiError, ApiResult};
use crate::position::Placement;
use crate::types::{
    Attachment, AttachmentUpload, Checklist, ChecklistItem, ChecklistItemUpdate, Comment,
    Credentials, NewChecklist, NewChecklistItem, NewComment, NewProject, NewTask, NewTimeEntry,
    NewUser, Project, ProjectBoard, ProjectSummary, ProjectUpdate, Session, TaskCard, TaskDetail,
    TaskUpdate, TimeEntry, TimeEntryUpdate, User,
};

/// HTTP client for a remote tracker.
///
/// Requests carry the configured bearer token. Error responses are decoded
/// back into the [`ApiError`] the server produced, so callers see the same
/// codes as with a local store. Caller ids passed to ownership-checked
/// operations are ignored; the server checks against the token's user.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorize(
            self.client
                .request(method, format!("{}{}", self.base_url, path)),
        )
    }

    /// Request for `{collection}/{id}`, with `id` encoded as one path segment.
    fn resource(&self, method: Method, collection: &str, id: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, collection);
        match Url::parse(&url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.push(id);
                }
                self.authorize(self.client.request(method, url))
            }
            // reqwest reports the malformed URL when the request is sent.
            Err(_) => self.authorize(self.client.request(method, url)),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(ApiError::remote)?;
        debug!(url = %response.url(), status = %response.status(), "Remote response");
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(ApiError::remote)
    }

    async fn send_success(&self, request: RequestBuilder) -> ApiResult<()> {
        self.send_json::<Success>(request).await.map(|_| ())
    }
}

/// Turn a non-2xx response into the error it carries.
async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.map_err(ApiError::remote)?;
    match serde_json::from_str::<ApiError>(&body) {
        Ok(err) => Err(err),
        Err(_) => Err(ApiError::remote(format!(
            "remote returned {}: {}",
            status,
            body.trim()
        ))),
    }
}

#[async_trait]
impl BoardStore for RemoteStore {
    async fn register_user(&self, input: NewUser) -> ApiResult<User> {
        self.send_json(self.request(Method::POST, "/api/auth/register").json(&input))
            .await
    }

    async fn login(&self, credentials: Credentials) -> ApiResult<Session> {
        self.send_json(
            self.request(Method::POST, "/api/auth/login")
                .json(&credentials),
        )
        .await
    }

    async fn user_for_token(&self, token: &str) -> ApiResult<Option<User>> {
        let response = self
            .client
            .get(format!("{}/api/auth/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiError::remote)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        check_status(response)
            .await?
            .json::<User>()
            .await
            .map(Some)
            .map_err(ApiError::remote)
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        self.send_success(
            self.client
                .post(format!("{}/api/auth/logout", self.base_url))
                .bearer_auth(token),
        )
        .await
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.send_json(self.request(Method::GET, "/api/users")).await
    }

    async fn list_projects(&self) -> ApiResult<Vec<ProjectSummary>> {
        self.send_json(self.request(Method::GET, "/api/projects"))
            .await
    }

    async fn get_project(&self, id: &str) -> ApiResult<ProjectBoard> {
        self.send_json(self.resource(Method::GET, "/api/projects", id))
            .await
    }

    /// The remote owner is always the token's user.
    async fn create_project(&self, _owner_id: &str, input: NewProject) -> ApiResult<ProjectBoard> {
        self.send_json(self.request(Method::POST, "/api/projects").json(&input))
            .await
    }

    async fn update_project(&self, id: &str, update: ProjectUpdate) -> ApiResult<Project> {
        self.send_json(
            self.resource(Method::PUT, "/api/projects", id)
                .json(&update),
        )
        .await
    }

    async fn delete_project(&self, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/projects", id))
            .await
    }

    async fn create_task(&self, input: NewTask) -> ApiResult<TaskCard> {
        self.send_json(self.request(Method::POST, "/api/tasks").json(&input))
            .await
    }

    async fn get_task(&self, id: &str) -> ApiResult<TaskDetail> {
        self.send_json(self.resource(Method::GET, "/api/tasks", id))
            .await
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> ApiResult<TaskCard> {
        self.send_json(
            self.resource(Method::PUT, "/api/tasks", id)
                .json(&update),
        )
        .await
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/tasks", id))
            .await
    }

    async fn reorder_tasks(&self, placements: Vec<Placement>) -> ApiResult<()> {
        self.send_success(
            self.request(Method::PUT, "/api/tasks")
                .json(&json!({ "tasks": placements })),
        )
        .await
    }

    async fn create_checklist(&self, input: NewChecklist) -> ApiResult<Checklist> {
        self.send_json(self.request(Method::POST, "/api/checklists").json(&input))
            .await
    }

    async fn rename_checklist(&self, id: &str, title: String) -> ApiResult<Checklist> {
        self.send_json(
            self.resource(Method::PUT, "/api/checklists", id)
                .json(&json!({ "title": title })),
        )
        .await
    }

    async fn delete_checklist(&self, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/checklists", id))
            .await
    }

    async fn create_checklist_item(&self, input: NewChecklistItem) -> ApiResult<ChecklistItem> {
        self.send_json(
            self.request(Method::POST, "/api/checklist-items")
                .json(&input),
        )
        .await
    }

    async fn update_checklist_item(
        &self,
        id: &str,
        update: ChecklistItemUpdate,
    ) -> ApiResult<ChecklistItem> {
        self.send_json(
            self.resource(Method::PUT, "/api/checklist-items", id)
                .json(&update),
        )
        .await
    }

    async fn delete_checklist_item(&self, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/checklist-items", id))
            .await
    }

    async fn create_comment(&self, _author_id: &str, input: NewComment) -> ApiResult<Comment> {
        self.send_json(self.request(Method::POST, "/api/comments").json(&input))
            .await
    }

    async fn update_comment(
        &self,
        _caller_id: &str,
        id: &str,
        content: String,
    ) -> ApiResult<Comment> {
        self.send_json(
            self.resource(Method::PUT, "/api/comments", id)
                .json(&json!({ "content": content })),
        )
        .await
    }

    async fn delete_comment(&self, _caller_id: &str, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/comments", id))
            .await
    }

    async fn list_time_entries(&self, task_id: &str) -> ApiResult<Vec<TimeEntry>> {
        self.send_json(
            self.request(Method::GET, "/api/time-entries")
                .query(&[("taskId", task_id)]),
        )
        .await
    }

    async fn create_time_entry(
        &self,
        _user_id: &str,
        input: NewTimeEntry,
    ) -> ApiResult<TimeEntry> {
        self.send_json(self.request(Method::POST, "/api/time-entries").json(&input))
            .await
    }

    async fn update_time_entry(
        &self,
        _caller_id: &str,
        id: &str,
        update: TimeEntryUpdate,
    ) -> ApiResult<TimeEntry> {
        self.send_json(
            self.resource(Method::PUT, "/api/time-entries", id)
                .json(&update),
        )
        .await
    }

    async fn delete_time_entry(&self, _caller_id: &str, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/time-entries", id))
            .await
    }

    async fn upload_attachment(&self, upload: AttachmentUpload) -> ApiResult<Attachment> {
        upload.validate()?;
        let part = Part::bytes(upload.data)
            .file_name(upload.filename)
            .mime_str(&upload.mimetype)
            .map_err(|e| ApiError::invalid_value("file", e.to_string()))?;
        let form = Form::new().text("taskId", upload.task_id).part("file", part);
        self.send_json(
            self.request(Method::POST, "/api/attachments")
                .multipart(form),
        )
        .await
    }

    async fn attachment_content(&self, id: &str) -> ApiResult<(Attachment, Vec<u8>)> {
        let response = self
            .send(self.resource(Method::GET, "/api/attachments", id))
            .await?;

        let meta = response
            .headers()
            .get(ATTACHMENT_META_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::remote("attachment metadata header missing"))?;
        let meta = STANDARD.decode(meta).map_err(ApiError::remote)?;
        let attachment: Attachment = serde_json::from_slice(&meta).map_err(ApiError::remote)?;

        let data = response.bytes().await.map_err(ApiError::remote)?;
        Ok((attachment, data.to_vec()))
    }

    async fn delete_attachment(&self, id: &str) -> ApiResult<()> {
        self.send_success(self.resource(Method::DELETE, "/api/attachments", id))
            .await
    }
}
