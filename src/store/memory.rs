//! In-memory [`BoardStore`] used for demo mode.
//!
//! All data lives in one [`BoardData`] value behind a mutex. Every mutation
//! runs against a copy which replaces the live data only when the whole
//! operation succeeded (and, with a snapshot file configured, once the copy
//! has been written to disk).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::demo;
use super::{
    BoardStore, COMMENT_FORBIDDEN, TIME_ENTRY_DELETE_FORBIDDEN, TIME_ENTRY_EDIT_FORBIDDEN,
    require_text,
};
use crate::auth;
use crate::db::{DEFAULT_SESSION_TTL_HOURS, new_id};
use crate::error::{ApiError, ApiResult};
use crate::position::{self, DensityPolicy, Placement};
use crate::types::{
    Attachment, AttachmentUpload, BoardColumn, Checklist, ChecklistItem, ChecklistItemUpdate,
    Column, ColumnSummary, Comment, Credentials, DEFAULT_COLUMNS, Label, NewChecklist,
    NewChecklistItem, NewComment, NewProject, NewTask, NewTimeEntry, NewUser, Project,
    ProjectBoard, ProjectSummary, ProjectUpdate, Role, Session, Task, TaskCard, TaskCounts,
    TaskDetail, TaskUpdate, TimeEntry, TimeEntryUpdate, User, UserSummary,
};
use crate::uploads;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLabel {
    pub task_id: String,
    pub label_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttachment {
    #[serde(flatten)]
    pub attachment: Attachment,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Attachment bytes are kept as base64 text in snapshots.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Everything a [`MemoryStore`] holds. Checklists are stored without their
/// items; items are attached when read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardData {
    pub users: Vec<StoredUser>,
    pub sessions: Vec<StoredSession>,
    pub projects: Vec<Project>,
    pub columns: Vec<Column>,
    pub labels: Vec<Label>,
    pub tasks: Vec<Task>,
    pub task_labels: Vec<TaskLabel>,
    pub checklists: Vec<Checklist>,
    pub checklist_items: Vec<ChecklistItem>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<StoredAttachment>,
    pub time_entries: Vec<TimeEntry>,
}

impl BoardData {
    fn user(&self, id: &str) -> ApiResult<&User> {
        self.users
            .iter()
            .map(|u| &u.user)
            .find(|u| u.id == id)
            .ok_or_else(|| ApiError::user_not_found(id))
    }

    fn user_summary(&self, id: &str) -> ApiResult<UserSummary> {
        self.user(id).map(UserSummary::from)
    }

    fn project(&self, id: &str) -> ApiResult<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ApiError::project_not_found(id))
    }

    fn column(&self, id: &str) -> ApiResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::column_not_found(id))
    }

    fn task(&self, id: &str) -> ApiResult<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::task_not_found(id))
    }

    fn task_mut(&mut self, id: &str) -> ApiResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::task_not_found(id))
    }

    fn checklist_with_items(&self, checklist: &Checklist) -> Checklist {
        let items = position::ordered(&self.checklist_items, &checklist.id)
            .into_iter()
            .cloned()
            .collect();
        Checklist {
            items,
            ..checklist.clone()
        }
    }

    fn task_checklists(&self, task_id: &str) -> Vec<Checklist> {
        position::ordered(&self.checklists, task_id)
            .into_iter()
            .map(|c| self.checklist_with_items(c))
            .collect()
    }

    fn task_labels(&self, task_id: &str) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .task_labels
            .iter()
            .filter(|tl| tl.task_id == task_id)
            .filter_map(|tl| self.labels.iter().find(|l| l.id == tl.label_id))
            .cloned()
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        labels
    }

    fn task_card(&self, task: &Task) -> ApiResult<TaskCard> {
        let assignee = match task.assignee_id {
            Some(ref id) => Some(self.user_summary(id)?),
            None => None,
        };
        let comments = self.comments.iter().filter(|c| c.task_id == task.id).count();
        let attachments = self
            .attachments
            .iter()
            .filter(|a| a.attachment.task_id == task.id)
            .count();
        let logged_hours = self
            .time_entries
            .iter()
            .filter(|e| e.task_id == task.id)
            .map(|e| e.hours)
            .sum();

        Ok(TaskCard {
            task: task.clone(),
            assignee,
            checklists: self.task_checklists(&task.id),
            labels: self.task_labels(&task.id),
            counts: TaskCounts {
                comments: comments as i64,
                attachments: attachments as i64,
            },
            logged_hours,
        })
    }

    fn project_columns(&self, project_id: &str) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| c.project_id == project_id)
            .collect();
        columns.sort_by_key(|c| c.position);
        columns
    }

    fn board(&self, project: &Project) -> ApiResult<ProjectBoard> {
        let mut columns = Vec::new();
        for column in self.project_columns(&project.id) {
            let tasks = position::ordered(&self.tasks, &column.id)
                .into_iter()
                .map(|t| self.task_card(t))
                .collect::<ApiResult<Vec<_>>>()?;
            columns.push(BoardColumn {
                column: column.clone(),
                tasks,
            });
        }
        let mut labels: Vec<Label> = self
            .labels
            .iter()
            .filter(|l| l.project_id == project.id)
            .cloned()
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ProjectBoard {
            project: project.clone(),
            owner: self.user_summary(&project.owner_id)?,
            columns,
            labels,
        })
    }

    fn set_task_labels(
        &mut self,
        task_id: &str,
        project_id: &str,
        label_ids: &[String],
    ) -> ApiResult<()> {
        for label_id in label_ids {
            if !self
                .labels
                .iter()
                .any(|l| &l.id == label_id && l.project_id == project_id)
            {
                return Err(ApiError::invalid_value(
                    "labelIds",
                    format!("Label {} does not belong to this project", label_id),
                ));
            }
        }
        self.task_labels.retain(|tl| tl.task_id != task_id);
        for label_id in label_ids {
            let link = TaskLabel {
                task_id: task_id.to_string(),
                label_id: label_id.clone(),
            };
            if !self.task_labels.contains(&link) {
                self.task_labels.push(link);
            }
        }
        Ok(())
    }

    /// Remove a task and everything hanging off it. Column neighbors keep
    /// their positions.
    fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let task = position::remove(&mut self.tasks, task_id)?;
        let checklist_ids: Vec<String> = self
            .checklists
            .iter()
            .filter(|c| c.task_id == task_id)
            .map(|c| c.id.clone())
            .collect();
        self.checklist_items
            .retain(|i| !checklist_ids.contains(&i.checklist_id));
        self.checklists.retain(|c| c.task_id != task_id);
        self.task_labels.retain(|tl| tl.task_id != task_id);
        self.comments.retain(|c| c.task_id != task_id);
        self.attachments.retain(|a| a.attachment.task_id != task_id);
        self.time_entries.retain(|e| e.task_id != task_id);
        Some(task)
    }

    fn sorted_time_entries(&self, task_id: &str) -> Vec<TimeEntry> {
        let mut entries: Vec<TimeEntry> = self
            .time_entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        entries
    }
}

/// Board storage held in process memory.
pub struct MemoryStore {
    data: Mutex<BoardData>,
    snapshot_path: Option<PathBuf>,
    density: DensityPolicy,
    session_ttl_hours: u64,
}

impl MemoryStore {
    pub fn new(data: BoardData) -> Self {
        Self {
            data: Mutex::new(data),
            snapshot_path: None,
            density: DensityPolicy::default(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }

    /// A store seeded with the demo project.
    pub fn demo() -> Self {
        Self::new(demo::demo_data())
    }

    /// Load the store from a snapshot file, seeding demo data when the file
    /// is missing or unreadable. Every later mutation rewrites the file.
    pub fn open_snapshot(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            match serde_json::from_str::<BoardData>(&content) {
                Ok(data) => {
                    info!(path = %path.display(), tasks = data.tasks.len(), "Loaded board snapshot");
                    data
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Snapshot unreadable, reseeding demo data");
                    demo::demo_data()
                }
            }
        } else {
            demo::demo_data()
        };

        write_snapshot(&path, &data)?;

        let mut store = Self::new(data);
        store.snapshot_path = Some(path);
        Ok(store)
    }

    pub fn with_density_policy(mut self, density: DensityPolicy) -> Self {
        self.density = density;
        self
    }

    pub fn with_session_ttl_hours(mut self, hours: u64) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    /// A copy of the current data.
    pub fn snapshot(&self) -> ApiResult<BoardData> {
        self.read(|data| Ok(data.clone()))
    }

    fn read<T>(&self, f: impl FnOnce(&BoardData) -> ApiResult<T>) -> ApiResult<T> {
        let data = self
            .data
            .lock()
            .map_err(|_| ApiError::internal("board data lock poisoned"))?;
        f(&data)
    }

    /// Run `f` on a copy of the data and install the copy only if `f`
    /// succeeds and the snapshot (if any) was written.
    fn mutate<T>(&self, f: impl FnOnce(&mut BoardData) -> ApiResult<T>) -> ApiResult<T> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| ApiError::internal("board data lock poisoned"))?;
        let mut draft = data.clone();
        let result = f(&mut draft)?;
        if let Some(ref path) = self.snapshot_path {
            write_snapshot(path, &draft).map_err(ApiError::storage_failure)?;
        }
        *data = draft;
        Ok(result)
    }
}

fn write_snapshot(path: &Path, data: &BoardData) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn register_user(&self, input: NewUser) -> ApiResult<User> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        let password_hash = auth::hash_password(&input.password).map_err(ApiError::internal)?;

        let user = self.mutate(|data| {
            if data.users.iter().any(|u| u.user.email == email) {
                return Err(ApiError::already_exists("User already exists"));
            }
            let user = User {
                id: new_id(),
                email: email.clone(),
                name: input.name.trim().to_string(),
                role: Role::Member,
                avatar: None,
                created_at: Utc::now(),
            };
            data.users.push(StoredUser {
                user: user.clone(),
                password_hash: Some(password_hash),
            });
            Ok(user)
        })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    async fn login(&self, credentials: Credentials) -> ApiResult<Session> {
        let email = credentials.email.trim().to_lowercase();
        let ttl = self.session_ttl_hours;

        self.mutate(|data| {
            let user = data
                .users
                .iter()
                .find(|u| u.user.email == email)
                .filter(|u| {
                    u.password_hash
                        .as_deref()
                        .is_some_and(|hash| auth::verify_password(&credentials.password, hash))
                })
                .map(|u| u.user.clone())
                .ok_or_else(ApiError::invalid_credentials)?;

            let now = Utc::now();
            data.sessions.retain(|s| s.expires_at > now);

            let session = Session {
                token: auth::new_session_token(),
                user,
                expires_at: auth::session_expiry(ttl),
            };
            data.sessions.push(StoredSession {
                token: session.token.clone(),
                user_id: session.user.id.clone(),
                expires_at: session.expires_at,
            });
            Ok(session)
        })
    }

    async fn user_for_token(&self, token: &str) -> ApiResult<Option<User>> {
        self.read(|data| {
            let now = Utc::now();
            let Some(session) = data
                .sessions
                .iter()
                .find(|s| s.token == token && s.expires_at > now)
            else {
                return Ok(None);
            };
            Ok(data.user(&session.user_id).ok().cloned())
        })
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        self.mutate(|data| {
            data.sessions.retain(|s| s.token != token);
            Ok(())
        })
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.read(|data| {
            let mut users: Vec<User> = data.users.iter().map(|u| u.user.clone()).collect();
            users.sort_by(|a, b| a.name.cmp(&b.name).then(a.email.cmp(&b.email)));
            Ok(users)
        })
    }

    async fn list_projects(&self) -> ApiResult<Vec<ProjectSummary>> {
        self.read(|data| {
            let mut projects: Vec<&Project> =
                data.projects.iter().filter(|p| !p.archived).collect();
            projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

            let summaries = projects
                .into_iter()
                .map(|project| {
                    let columns = data
                        .project_columns(&project.id)
                        .into_iter()
                        .map(|column| ColumnSummary {
                            column: column.clone(),
                            task_count: data
                                .tasks
                                .iter()
                                .filter(|t| t.column_id == column.id)
                                .count() as i64,
                        })
                        .collect();
                    Ok(ProjectSummary {
                        project: project.clone(),
                        owner: data.user_summary(&project.owner_id)?,
                        columns,
                    })
                })
                .collect::<ApiResult<Vec<_>>>()?;

            debug!(count = summaries.len(), "Listed projects");
            Ok(summaries)
        })
    }

    async fn get_project(&self, id: &str) -> ApiResult<ProjectBoard> {
        self.read(|data| data.board(data.project(id)?))
    }

    async fn create_project(&self, owner_id: &str, input: NewProject) -> ApiResult<ProjectBoard> {
        input.validate()?;
        let board = self.mutate(|data| {
            data.user(owner_id)?;
            let now = Utc::now();
            let project = Project {
                id: new_id(),
                name: input.name.trim().to_string(),
                description: input.description.clone(),
                project_type: input.project_type,
                archived: false,
                owner_id: owner_id.to_string(),
                created_at: now,
                updated_at: now,
            };
            for (position, name) in (0i64..).zip(DEFAULT_COLUMNS) {
                data.columns.push(Column {
                    id: new_id(),
                    project_id: project.id.clone(),
                    name: name.to_string(),
                    position,
                });
            }
            for label in &input.labels {
                data.labels.push(Label {
                    id: new_id(),
                    project_id: project.id.clone(),
                    name: label.name.clone(),
                    color: label.color.clone(),
                });
            }
            data.projects.push(project.clone());
            data.board(&project)
        })?;

        info!(project_id = %board.project.id, owner_id = %owner_id, "Project created");
        Ok(board)
    }

    async fn update_project(&self, id: &str, update: ProjectUpdate) -> ApiResult<Project> {
        update.validate()?;
        self.mutate(|data| {
            let project = data
                .projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| ApiError::project_not_found(id))?;
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
            project.updated_at = Utc::now();
            Ok(project.clone())
        })
    }

    async fn delete_project(&self, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            data.project(id)?;
            let column_ids: Vec<String> = data
                .columns
                .iter()
                .filter(|c| c.project_id == id)
                .map(|c| c.id.clone())
                .collect();
            let task_ids: Vec<String> = data
                .tasks
                .iter()
                .filter(|t| column_ids.contains(&t.column_id))
                .map(|t| t.id.clone())
                .collect();
            for task_id in &task_ids {
                data.remove_task(task_id);
            }
            data.columns.retain(|c| c.project_id != id);
            data.labels.retain(|l| l.project_id != id);
            data.projects.retain(|p| p.id != id);
            Ok(())
        })?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }

    async fn create_task(&self, input: NewTask) -> ApiResult<TaskCard> {
        input.validate()?;
        let card = self.mutate(|data| {
            let project_id = data.column(&input.column_id)?.project_id.clone();
            if let Some(ref assignee_id) = input.assignee_id {
                data.user(assignee_id)
                    .map_err(|e| e.with_field("assigneeId"))?;
            }

            let next = position::next_position(
                data.tasks
                    .iter()
                    .filter(|t| t.column_id == input.column_id)
                    .map(|t| t.position),
            )?;
            let now = Utc::now();
            let task = Task {
                id: new_id(),
                column_id: input.column_id.clone(),
                title: input.title.trim().to_string(),
                description: input.description.clone(),
                position: next,
                priority: input.priority,
                due_date: input.due_date,
                assignee_id: input.assignee_id.clone(),
                estimated_hours: input.estimated_hours,
                created_at: now,
                updated_at: now,
            };
            data.tasks.push(task.clone());
            if !input.label_ids.is_empty() {
                data.set_task_labels(&task.id, &project_id, &input.label_ids)?;
            }
            data.task_card(&task)
        })?;

        info!(
            task_id = %card.task.id,
            column_id = %card.task.column_id,
            position = card.task.position,
            "Task created"
        );
        Ok(card)
    }

    async fn get_task(&self, id: &str) -> ApiResult<TaskDetail> {
        self.read(|data| {
            let task = data.task(id)?;
            let project_id = data.column(&task.column_id)?.project_id.clone();

            let mut comments: Vec<Comment> = data
                .comments
                .iter()
                .filter(|c| c.task_id == id)
                .cloned()
                .collect();
            comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            let mut attachments: Vec<Attachment> = data
                .attachments
                .iter()
                .filter(|a| a.attachment.task_id == id)
                .map(|a| a.attachment.clone())
                .collect();
            attachments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            Ok(TaskDetail {
                card: data.task_card(task)?,
                project_id,
                comments,
                attachments,
                time_entries: data.sorted_time_entries(id),
            })
        })
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> ApiResult<TaskCard> {
        update.validate()?;
        self.mutate(|data| {
            if let Some(Some(ref assignee_id)) = update.assignee_id {
                data.user(assignee_id)
                    .map_err(|e| e.with_field("assigneeId"))?;
            }
            if let Some(ref label_ids) = update.label_ids {
                let column_id = data.task(id)?.column_id.clone();
                let project_id = data.column(&column_id)?.project_id.clone();
                data.set_task_labels(id, &project_id, label_ids)?;
            }

            let task = data.task_mut(id)?;
            if let Some(ref title) = update.title {
                task.title = title.trim().to_string();
            }
            if let Some(ref description) = update.description {
                task.description = description.clone();
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(due_date) = update.due_date {
                task.due_date = due_date;
            }
            if let Some(ref assignee_id) = update.assignee_id {
                task.assignee_id = assignee_id.clone();
            }
            if let Some(estimated_hours) = update.estimated_hours {
                task.estimated_hours = estimated_hours;
            }
            task.updated_at = Utc::now();

            let task = task.clone();
            data.task_card(&task)
        })
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            data.remove_task(id)
                .map(|_| ())
                .ok_or_else(|| ApiError::task_not_found(id))
        })?;
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    async fn reorder_tasks(&self, placements: Vec<Placement>) -> ApiResult<()> {
        position::validate_batch(&placements)?;
        let density = self.density;

        let touched = self.mutate(|data| {
            let mut touched = BTreeSet::new();
            for placement in &placements {
                data.column(&placement.container_id)?;
                touched.insert(data.task(&placement.id)?.column_id.clone());
                touched.insert(placement.container_id.clone());
            }

            position::apply_placements(&mut data.tasks, &placements)
                .map_err(|id| ApiError::task_not_found(&id))?;

            let now = Utc::now();
            for placement in &placements {
                data.task_mut(&placement.id)?.updated_at = now;
            }

            if density == DensityPolicy::Strict {
                for column_id in &touched {
                    position::check_dense(
                        column_id,
                        data.tasks
                            .iter()
                            .filter(|t| &t.column_id == column_id)
                            .map(|t| t.position),
                    )?;
                }
            }
            Ok(touched.len())
        })?;

        info!(placements = placements.len(), columns = touched, "Tasks reordered");
        Ok(())
    }

    async fn create_checklist(&self, input: NewChecklist) -> ApiResult<Checklist> {
        input.validate()?;
        self.mutate(|data| {
            data.task(&input.task_id)?;
            let checklist = Checklist {
                id: new_id(),
                task_id: input.task_id.clone(),
                title: input.title.trim().to_string(),
                position: position::next_position(
                    data.checklists
                        .iter()
                        .filter(|c| c.task_id == input.task_id)
                        .map(|c| c.position),
                )?,
                items: Vec::new(),
            };
            data.checklists.push(checklist.clone());
            Ok(checklist)
        })
    }

    async fn rename_checklist(&self, id: &str, title: String) -> ApiResult<Checklist> {
        require_text("title", &title)?;
        self.mutate(|data| {
            let checklist = data
                .checklists
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ApiError::checklist_not_found(id))?;
            checklist.title = title.trim().to_string();
            let checklist = checklist.clone();
            Ok(data.checklist_with_items(&checklist))
        })
    }

    async fn delete_checklist(&self, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            position::remove(&mut data.checklists, id)
                .ok_or_else(|| ApiError::checklist_not_found(id))?;
            data.checklist_items.retain(|i| i.checklist_id != id);
            Ok(())
        })
    }

    async fn create_checklist_item(&self, input: NewChecklistItem) -> ApiResult<ChecklistItem> {
        input.validate()?;
        self.mutate(|data| {
            if !data.checklists.iter().any(|c| c.id == input.checklist_id) {
                return Err(ApiError::checklist_not_found(&input.checklist_id));
            }
            let item = ChecklistItem {
                id: new_id(),
                checklist_id: input.checklist_id.clone(),
                content: input.content.trim().to_string(),
                completed: false,
                position: position::next_position(
                    data.checklist_items
                        .iter()
                        .filter(|i| i.checklist_id == input.checklist_id)
                        .map(|i| i.position),
                )?,
            };
            data.checklist_items.push(item.clone());
            Ok(item)
        })
    }

    async fn update_checklist_item(
        &self,
        id: &str,
        update: ChecklistItemUpdate,
    ) -> ApiResult<ChecklistItem> {
        update.validate()?;
        self.mutate(|data| {
            let item = data
                .checklist_items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::checklist_item_not_found(id))?;
            if let Some(ref content) = update.content {
                item.content = content.trim().to_string();
            }
            if let Some(completed) = update.completed {
                item.completed = completed;
            }
            Ok(item.clone())
        })
    }

    async fn delete_checklist_item(&self, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            position::remove(&mut data.checklist_items, id)
                .map(|_| ())
                .ok_or_else(|| ApiError::checklist_item_not_found(id))
        })
    }

    async fn create_comment(&self, author_id: &str, input: NewComment) -> ApiResult<Comment> {
        input.validate()?;
        self.mutate(|data| {
            data.task(&input.task_id)?;
            let now = Utc::now();
            let comment = Comment {
                id: new_id(),
                task_id: input.task_id.clone(),
                author_id: author_id.to_string(),
                author: data.user_summary(author_id)?,
                content: input.content.trim().to_string(),
                created_at: now,
                updated_at: now,
            };
            data.comments.push(comment.clone());
            Ok(comment)
        })
    }

    async fn update_comment(
        &self,
        caller_id: &str,
        id: &str,
        content: String,
    ) -> ApiResult<Comment> {
        require_text("content", &content)?;
        self.mutate(|data| {
            let comment = data
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ApiError::comment_not_found(id))?;
            if comment.author_id != caller_id {
                return Err(ApiError::forbidden(COMMENT_FORBIDDEN));
            }
            comment.content = content.trim().to_string();
            comment.updated_at = Utc::now();
            Ok(comment.clone())
        })
    }

    async fn delete_comment(&self, caller_id: &str, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            let comment = data
                .comments
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| ApiError::comment_not_found(id))?;
            if comment.author_id != caller_id {
                return Err(ApiError::forbidden(COMMENT_FORBIDDEN));
            }
            data.comments.retain(|c| c.id != id);
            Ok(())
        })
    }

    async fn list_time_entries(&self, task_id: &str) -> ApiResult<Vec<TimeEntry>> {
        self.read(|data| Ok(data.sorted_time_entries(task_id)))
    }

    async fn create_time_entry(
        &self,
        user_id: &str,
        input: NewTimeEntry,
    ) -> ApiResult<TimeEntry> {
        let hours = input.validate()?;
        self.mutate(|data| {
            data.task(&input.task_id)?;
            let now = Utc::now();
            let entry = TimeEntry {
                id: new_id(),
                task_id: input.task_id.clone(),
                user_id: user_id.to_string(),
                user: data.user_summary(user_id)?,
                hours,
                description: input.description.clone(),
                date: input.date.unwrap_or(now),
                created_at: now,
            };
            data.time_entries.push(entry.clone());
            Ok(entry)
        })
    }

    async fn update_time_entry(
        &self,
        caller_id: &str,
        id: &str,
        update: TimeEntryUpdate,
    ) -> ApiResult<TimeEntry> {
        update.validate()?;
        self.mutate(|data| {
            let entry = data
                .time_entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| ApiError::time_entry_not_found(id))?;
            if entry.user_id != caller_id {
                return Err(ApiError::forbidden(TIME_ENTRY_EDIT_FORBIDDEN));
            }
            if let Some(hours) = update.hours {
                entry.hours = hours;
            }
            if let Some(ref description) = update.description {
                entry.description = description.clone();
            }
            if let Some(date) = update.date {
                entry.date = date;
            }
            Ok(entry.clone())
        })
    }

    async fn delete_time_entry(&self, caller_id: &str, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            let entry = data
                .time_entries
                .iter()
                .find(|e| e.id == id)
                .ok_or_else(|| ApiError::time_entry_not_found(id))?;
            if entry.user_id != caller_id {
                return Err(ApiError::forbidden(TIME_ENTRY_DELETE_FORBIDDEN));
            }
            data.time_entries.retain(|e| e.id != id);
            Ok(())
        })
    }

    async fn upload_attachment(&self, upload: AttachmentUpload) -> ApiResult<Attachment> {
        upload.validate()?;
        self.mutate(|data| {
            data.task(&upload.task_id)?;
            let now = Utc::now();
            let filepath = (0..)
                .map(|attempt| {
                    format!(
                        "{}{}",
                        uploads::PUBLIC_PREFIX,
                        uploads::stored_file_name(&upload.filename, now.timestamp_millis(), attempt)
                    )
                })
                .find(|path| !data.attachments.iter().any(|a| &a.attachment.filepath == path))
                .ok_or_else(|| ApiError::internal("no free attachment path"))?;
            let attachment = Attachment {
                id: new_id(),
                task_id: upload.task_id.clone(),
                filename: upload.filename.clone(),
                filepath,
                mimetype: upload.mimetype.clone(),
                size: upload.data.len() as i64,
                created_at: now,
            };
            data.attachments.push(StoredAttachment {
                attachment: attachment.clone(),
                data: upload.data.clone(),
            });
            Ok(attachment)
        })
    }

    async fn attachment_content(&self, id: &str) -> ApiResult<(Attachment, Vec<u8>)> {
        self.read(|data| {
            data.attachments
                .iter()
                .find(|a| a.attachment.id == id)
                .map(|a| (a.attachment.clone(), a.data.clone()))
                .ok_or_else(|| ApiError::attachment_not_found(id))
        })
    }

    async fn delete_attachment(&self, id: &str) -> ApiResult<()> {
        self.mutate(|data| {
            let before = data.attachments.len();
            data.attachments.retain(|a| a.attachment.id != id);
            if data.attachments.len() == before {
                return Err(ApiError::attachment_not_found(id));
            }
            Ok(())
        })
    }
}
