//! Core types for the kanban tracker.
//!
//! Wire representation is camelCase JSON; timestamps are RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::position::{Position, Positioned};

/// Names of the columns every new project starts with, in board order.
pub const DEFAULT_COLUMNS: [&str; 5] = ["Backlog", "To Do", "In Progress", "Review", "Done"];

/// Labels created for seeded and demo projects.
pub const DEFAULT_LABELS: [(&str, &str); 4] = [
    ("Bug", "#ef4444"),
    ("Feature", "#3b82f6"),
    ("Enhancement", "#10b981"),
    ("Documentation", "#f59e0b"),
];

/// Deserialize a present-but-possibly-null field as `Some(value)`, so that
/// an absent field (`None`) can be told apart from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    #[default]
    General,
    Client,
    Internal,
    FeatureRequest,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::General => "general",
            ProjectType::Client => "client",
            ProjectType::Internal => "internal",
            ProjectType::FeatureRequest => "feature_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(ProjectType::General),
            "client" => Some(ProjectType::Client),
            "internal" => Some(ProjectType::Internal),
            "feature_request" => Some(ProjectType::FeatureRequest),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Users and sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The user fields embedded in other views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

impl NewUser {
    pub fn validate(&self) -> ApiResult<()> {
        if is_blank(&self.email) || self.password.is_empty() || is_blank(&self.name) {
            return Err(ApiError::missing_fields("Missing required fields"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// ---------------------------------------------------------------------------
// Projects, columns and labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub archived: bool,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub color: String,
}

/// A column in the project list, with its task count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    #[serde(flatten)]
    pub column: Column,
    pub task_count: i64,
}

/// A project as shown in the project list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub owner: UserSummary,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<TaskCard>,
}

/// A project with its columns and their tasks in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBoard {
    #[serde(flatten)]
    pub project: Project,
    pub owner: UserSummary,
    pub columns: Vec<BoardColumn>,
    pub labels: Vec<Label>,
}

impl ProjectBoard {
    pub fn column(&self, column_id: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.column.id == column_id)
    }

    /// The column currently holding `task_id`.
    pub fn column_of_task(&self, task_id: &str) -> Option<&BoardColumn> {
        self.columns
            .iter()
            .find(|c| c.tasks.iter().any(|t| t.task.id == task_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub project_type: ProjectType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<NewLabel>,
}

impl NewProject {
    pub fn validate(&self) -> ApiResult<()> {
        if is_blank(&self.name) {
            return Err(ApiError::missing_fields("Project name is required").with_field("name"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if self.name.as_deref().is_some_and(is_blank) {
            return Err(ApiError::invalid_value("name", "Project name cannot be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: Position,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Positioned for Task {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn container_id(&self) -> &str {
        &self.column_id
    }
    fn position(&self) -> Position {
        self.position
    }
    fn place(&mut self, container_id: &str, position: Position) {
        self.column_id = container_id.to_string();
        self.position = position;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub comments: i64,
    pub attachments: i64,
}

/// A task as rendered on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCard {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default)]
    pub assignee: Option<UserSummary>,
    pub checklists: Vec<Checklist>,
    pub labels: Vec<Label>,
    #[serde(rename = "_count")]
    pub counts: TaskCounts,
    pub logged_hours: f64,
}

/// A task with everything the detail view shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub card: TaskCard,
    pub project_id: String,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
    pub time_entries: Vec<TimeEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub column_id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,
}

impl NewTask {
    pub fn new(column_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            column_id: column_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if is_blank(&self.title) || self.column_id.is_empty() {
            return Err(ApiError::missing_fields("Title and column are required"));
        }
        validate_estimate(self.estimated_hours)
    }
}

fn validate_estimate(hours: Option<f64>) -> ApiResult<()> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(ApiError::invalid_value(
            "estimatedHours",
            "estimatedHours must be a non-negative number",
        )),
        _ => Ok(()),
    }
}

/// Partial task update. Nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if self.title.as_deref().is_some_and(is_blank) {
            return Err(ApiError::invalid_value("title", "Title cannot be empty"));
        }
        validate_estimate(self.estimated_hours.flatten())
    }
}

// ---------------------------------------------------------------------------
// Checklists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub position: Position,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

impl Positioned for Checklist {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn container_id(&self) -> &str {
        &self.task_id
    }
    fn position(&self) -> Position {
        self.position
    }
    fn place(&mut self, container_id: &str, position: Position) {
        self.task_id = container_id.to_string();
        self.position = position;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub checklist_id: String,
    pub content: String,
    pub completed: bool,
    pub position: Position,
}

impl Positioned for ChecklistItem {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn container_id(&self) -> &str {
        &self.checklist_id
    }
    fn position(&self) -> Position {
        self.position
    }
    fn place(&mut self, container_id: &str, position: Position) {
        self.checklist_id = container_id.to_string();
        self.position = position;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChecklist {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub title: String,
}

impl NewChecklist {
    pub fn validate(&self) -> ApiResult<()> {
        if self.task_id.is_empty() || is_blank(&self.title) {
            return Err(ApiError::missing_fields("Title and task are required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChecklistItem {
    #[serde(default)]
    pub checklist_id: String,
    #[serde(default)]
    pub content: String,
}

impl NewChecklistItem {
    pub fn validate(&self) -> ApiResult<()> {
        if self.checklist_id.is_empty() || is_blank(&self.content) {
            return Err(ApiError::missing_fields("Content and checklist are required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ChecklistItemUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if self.content.as_deref().is_some_and(is_blank) {
            return Err(ApiError::invalid_value("content", "Content cannot be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub author_id: String,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> ApiResult<()> {
        if self.task_id.is_empty() || is_blank(&self.content) {
            return Err(ApiError::missing_fields("Content and task are required"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub filename: String,
    pub filepath: String,
    pub mimetype: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file on its way into a store.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub task_id: String,
    pub filename: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

impl AttachmentUpload {
    pub fn validate(&self) -> ApiResult<()> {
        if self.task_id.is_empty() || self.filename.trim().is_empty() {
            return Err(ApiError::missing_fields("File and taskId are required"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Time entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub user: UserSummary,
    pub hours: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn valid_hours(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    #[serde(default)]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl NewTimeEntry {
    pub fn validate(&self) -> ApiResult<f64> {
        match self.hours {
            Some(hours) if !self.task_id.is_empty() && valid_hours(hours) => Ok(hours),
            _ => Err(ApiError::missing_fields(
                "taskId and a positive hours value are required",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl TimeEntryUpdate {
    pub fn validate(&self) -> ApiResult<()> {
        if self.hours.is_some_and(|h| !valid_hours(h)) {
            return Err(ApiError::invalid_value("hours", "hours must be positive"));
        }
        Ok(())
    }
}
