//! Storage interface shared by every backend.
//!
//! Handlers and the CLI only see [`BoardStore`]; the concrete backend is
//! picked at startup:
//! - [`crate::db::Database`] - durable SQLite storage
//! - [`MemoryStore`] - demo data held in memory, optionally snapshotted to a file
//! - [`RemoteStore`] - another tracker instance reached over HTTP
//!
//! Inputs are validated at this boundary so that every backend rejects the
//! same requests with the same errors.

pub mod demo;
pub mod memory;
pub mod remote;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::position::Placement;
use crate::types::{
    Attachment, AttachmentUpload, Checklist, ChecklistItem, ChecklistItemUpdate, Comment,
    Credentials, NewChecklist, NewChecklistItem, NewComment, NewProject, NewTask, NewTimeEntry,
    NewUser, Project, ProjectBoard, ProjectSummary, ProjectUpdate, Session, TaskCard, TaskDetail,
    TaskUpdate, TimeEntry, TimeEntryUpdate, User,
};

pub use memory::MemoryStore;
pub use remote::RemoteStore;

#[async_trait]
pub trait BoardStore: Send + Sync {
    // Users and sessions

    async fn register_user(&self, input: NewUser) -> ApiResult<User>;

    async fn login(&self, credentials: Credentials) -> ApiResult<Session>;

    /// Resolve a bearer token. Unknown or expired tokens yield `None`.
    async fn user_for_token(&self, token: &str) -> ApiResult<Option<User>>;

    /// End the session identified by `token`.
    async fn logout(&self, token: &str) -> ApiResult<()>;

    async fn list_users(&self) -> ApiResult<Vec<User>>;

    // Projects

    /// Non-archived projects, newest first.
    async fn list_projects(&self) -> ApiResult<Vec<ProjectSummary>>;

    async fn get_project(&self, id: &str) -> ApiResult<ProjectBoard>;

    /// Create a project owned by `owner_id` with the default columns.
    async fn create_project(&self, owner_id: &str, input: NewProject) -> ApiResult<ProjectBoard>;

    async fn update_project(&self, id: &str, update: ProjectUpdate) -> ApiResult<Project>;

    async fn delete_project(&self, id: &str) -> ApiResult<()>;

    // Tasks

    /// Append a task to the end of its column.
    async fn create_task(&self, input: NewTask) -> ApiResult<TaskCard>;

    async fn get_task(&self, id: &str) -> ApiResult<TaskDetail>;

    async fn update_task(&self, id: &str, update: TaskUpdate) -> ApiResult<TaskCard>;

    /// Delete a task. Remaining positions in its column are not compacted.
    async fn delete_task(&self, id: &str) -> ApiResult<()>;

    /// Apply a drag-and-drop renumbering. All placements are applied or none.
    async fn reorder_tasks(&self, placements: Vec<Placement>) -> ApiResult<()>;

    // Checklists

    async fn create_checklist(&self, input: NewChecklist) -> ApiResult<Checklist>;

    async fn rename_checklist(&self, id: &str, title: String) -> ApiResult<Checklist>;

    async fn delete_checklist(&self, id: &str) -> ApiResult<()>;

    async fn create_checklist_item(&self, input: NewChecklistItem) -> ApiResult<ChecklistItem>;

    async fn update_checklist_item(
        &self,
        id: &str,
        update: ChecklistItemUpdate,
    ) -> ApiResult<ChecklistItem>;

    async fn delete_checklist_item(&self, id: &str) -> ApiResult<()>;

    // Comments

    async fn create_comment(&self, author_id: &str, input: NewComment) -> ApiResult<Comment>;

    /// Edit a comment. Only its author may do so.
    async fn update_comment(&self, caller_id: &str, id: &str, content: String)
    -> ApiResult<Comment>;

    async fn delete_comment(&self, caller_id: &str, id: &str) -> ApiResult<()>;

    // Time entries

    /// Entries for a task, most recent date first.
    async fn list_time_entries(&self, task_id: &str) -> ApiResult<Vec<TimeEntry>>;

    async fn create_time_entry(&self, user_id: &str, input: NewTimeEntry)
    -> ApiResult<TimeEntry>;

    /// Edit a time entry. Only the user who logged it may do so.
    async fn update_time_entry(
        &self,
        caller_id: &str,
        id: &str,
        update: TimeEntryUpdate,
    ) -> ApiResult<TimeEntry>;

    async fn delete_time_entry(&self, caller_id: &str, id: &str) -> ApiResult<()>;

    // Attachments

    async fn upload_attachment(&self, upload: AttachmentUpload) -> ApiResult<Attachment>;

    /// Attachment metadata together with its content.
    async fn attachment_content(&self, id: &str) -> ApiResult<(Attachment, Vec<u8>)>;

    async fn delete_attachment(&self, id: &str) -> ApiResult<()>;
}

/// Messages used for ownership failures.
pub(crate) const COMMENT_FORBIDDEN: &str = "Forbidden";
pub(crate) const TIME_ENTRY_EDIT_FORBIDDEN: &str = "You can only edit your own time entries";
pub(crate) const TIME_ENTRY_DELETE_FORBIDDEN: &str = "You can only delete your own time entries";

/// Reject a blank replacement text for `field`.
pub(crate) fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(crate::error::ApiError::missing_field(field));
    }
    Ok(())
}
