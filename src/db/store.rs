//! [`BoardStore`] implementation backed by SQLite.

use async_trait::async_trait;

use super::Database;
use crate::error::ApiResult;
use crate::position::Placement;
use crate::store::BoardStore;
use crate::types::{
    Attachment, AttachmentUpload, Checklist, ChecklistItem, ChecklistItemUpdate, Comment,
    Credentials, NewChecklist, NewChecklistItem, NewComment, NewProject, NewTask, NewTimeEntry,
    NewUser, Project, ProjectBoard, ProjectSummary, ProjectUpdate, Session, TaskCard, TaskDetail,
    TaskUpdate, TimeEntry, TimeEntryUpdate, User,
};

#[async_trait]
impl BoardStore for Database {
    async fn register_user(&self, input: NewUser) -> ApiResult<User> {
        Ok(Database::register_user(self, &input)?)
    }

    async fn login(&self, credentials: Credentials) -> ApiResult<Session> {
        Ok(Database::login(self, &credentials)?)
    }

    async fn user_for_token(&self, token: &str) -> ApiResult<Option<User>> {
        Ok(Database::user_for_token(self, token)?)
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        Database::logout(self, token)?;
        Ok(())
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        Ok(Database::list_users(self)?)
    }

    async fn list_projects(&self) -> ApiResult<Vec<ProjectSummary>> {
        Ok(Database::list_projects(self)?)
    }

    async fn get_project(&self, id: &str) -> ApiResult<ProjectBoard> {
        Ok(Database::get_project(self, id)?)
    }

    async fn create_project(&self, owner_id: &str, input: NewProject) -> ApiResult<ProjectBoard> {
        Ok(Database::create_project(self, owner_id, &input)?)
    }

    async fn update_project(&self, id: &str, update: ProjectUpdate) -> ApiResult<Project> {
        Ok(Database::update_project(self, id, &update)?)
    }

    async fn delete_project(&self, id: &str) -> ApiResult<()> {
        Ok(Database::delete_project(self, id)?)
    }

    async fn create_task(&self, input: NewTask) -> ApiResult<TaskCard> {
        Ok(Database::create_task(self, &input)?)
    }

    async fn get_task(&self, id: &str) -> ApiResult<TaskDetail> {
        Ok(Database::get_task(self, id)?)
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> ApiResult<TaskCard> {
        Ok(Database::update_task(self, id, &update)?)
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        Ok(Database::delete_task(self, id)?)
    }

    async fn reorder_tasks(&self, placements: Vec<Placement>) -> ApiResult<()> {
        Ok(Database::reorder_tasks(self, &placements)?)
    }

    async fn create_checklist(&self, input: NewChecklist) -> ApiResult<Checklist> {
        Ok(Database::create_checklist(self, &input)?)
    }

    async fn rename_checklist(&self, id: &str, title: String) -> ApiResult<Checklist> {
        Ok(Database::rename_checklist(self, id, &title)?)
    }

    async fn delete_checklist(&self, id: &str) -> ApiResult<()> {
        Ok(Database::delete_checklist(self, id)?)
    }

    async fn create_checklist_item(&self, input: NewChecklistItem) -> ApiResult<ChecklistItem> {
        Ok(Database::create_checklist_item(self, &input)?)
    }

    async fn update_checklist_item(
        &self,
        id: &str,
        update: ChecklistItemUpdate,
    ) -> ApiResult<ChecklistItem> {
        Ok(Database::update_checklist_item(self, id, &update)?)
    }

    async fn delete_checklist_item(&self, id: &str) -> ApiResult<()> {
        Ok(Database::delete_checklist_item(self, id)?)
    }

    async fn create_comment(&self, author_id: &str, input: NewComment) -> ApiResult<Comment> {
        Ok(Database::create_comment(self, author_id, &input)?)
    }

    async fn update_comment(
        &self,
        caller_id: &str,
        id: &str,
        content: String,
    ) -> ApiResult<Comment> {
        Ok(Database::update_comment(self, caller_id, id, &content)?)
    }

    async fn delete_comment(&self, caller_id: &str, id: &str) -> ApiResult<()> {
        Ok(Database::delete_comment(self, caller_id, id)?)
    }

    async fn list_time_entries(&self, task_id: &str) -> ApiResult<Vec<TimeEntry>> {
        Ok(Database::list_time_entries(self, task_id)?)
    }

    async fn create_time_entry(
        &self,
        user_id: &str,
        input: NewTimeEntry,
    ) -> ApiResult<TimeEntry> {
        Ok(Database::create_time_entry(self, user_id, &input)?)
    }

    async fn update_time_entry(
        &self,
        caller_id: &str,
        id: &str,
        update: TimeEntryUpdate,
    ) -> ApiResult<TimeEntry> {
        Ok(Database::update_time_entry(self, caller_id, id, &update)?)
    }

    async fn delete_time_entry(&self, caller_id: &str, id: &str) -> ApiResult<()> {
        Ok(Database::delete_time_entry(self, caller_id, id)?)
    }

    async fn upload_attachment(&self, upload: AttachmentUpload) -> ApiResult<Attachment> {
        Ok(Database::upload_attachment(self, &upload)?)
    }

    async fn attachment_content(&self, id: &str) -> ApiResult<(Attachment, Vec<u8>)> {
        Ok(Database::attachment_content(self, id)?)
    }

    async fn delete_attachment(&self, id: &str) -> ApiResult<()> {
        Ok(Database::delete_attachment(self, id)?)
    }
}
