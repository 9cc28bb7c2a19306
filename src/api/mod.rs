//! REST API over a [`crate::store::BoardStore`].
//!
//! Every route lives under `/api`, speaks camelCase JSON and, apart from
//! health, registration and login, requires a bearer token.

mod attachments;
mod auth;
mod checklists;
mod comments;
mod projects;
mod server;
mod tasks;
mod time_entries;
mod users;

pub use auth::{ApiJson, CurrentUser};
pub use server::{
    ApiServer, DEFAULT_MAX_UPLOAD_BYTES, ServerHandle, Success, build_router, start_server,
};

/// Response header carrying base64-encoded attachment metadata on downloads.
pub const ATTACHMENT_META_HEADER: &str = "x-attachment-meta";
