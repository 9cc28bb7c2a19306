//! User accounts and login sessions.

use super::{Database, enum_column, from_ms, new_id, now_ms, to_ms};
use crate::auth;
use crate::error::ApiError;
use crate::types::{Credentials, NewUser, Role, Session, User, UserSummary};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

const USER_COLUMNS: &str = "id, email, name, role, avatar, created_at";

pub(crate) fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role: enum_column(row, "role", "role", Role::parse)?,
        avatar: row.get("avatar")?,
        created_at: from_ms(row.get("created_at")?),
    })
}

pub(crate) fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn
        .query_row(&sql, params![user_id], parse_user_row)
        .optional()?)
}

/// Load the summary of a user that a foreign key guarantees exists.
pub(crate) fn user_summary_internal(conn: &Connection, user_id: &str) -> Result<UserSummary> {
    get_user_internal(conn, user_id)?
        .map(|u| UserSummary::from(&u))
        .ok_or_else(|| ApiError::user_not_found(user_id).into())
}

impl Database {
    /// Create a user account with the given role.
    pub fn create_user(&self, input: &NewUser, role: Role) -> Result<User> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        let password_hash = auth::hash_password(&input.password)?;
        let now = now_ms();
        let id = new_id();

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ApiError::already_exists("User already exists").into());
            }

            conn.execute(
                "INSERT INTO users (id, email, name, password_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, email, input.name.trim(), password_hash, role.as_str(), now],
            )?;

            info!(user_id = %id, email = %email, role = role.as_str(), "User created");

            Ok(User {
                id: id.clone(),
                email: email.clone(),
                name: input.name.trim().to_string(),
                role,
                avatar: None,
                created_at: from_ms(now),
            })
        })
    }

    /// Self-service registration; new accounts are members.
    pub fn register_user(&self, input: &NewUser) -> Result<User> {
        self.create_user(input, Role::Member)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        self.with_conn(|conn| {
            Ok(conn
                .query_row(&sql, params![email.trim().to_lowercase()], parse_user_row)
                .optional()?)
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY name, email", USER_COLUMNS);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Verify credentials and open a session.
    pub fn login(&self, credentials: &Credentials) -> Result<Session> {
        let email = credentials.email.trim().to_lowercase();
        let token = auth::new_session_token();
        let expires_at = auth::session_expiry(self.session_ttl_hours);

        self.with_conn(|conn| {
            let found: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT id, password_hash FROM users WHERE email = ?1",
                    params![email],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let user_id = match found {
                Some((id, Some(hash))) if auth::verify_password(&credentials.password, &hash) => id,
                _ => return Err(ApiError::invalid_credentials().into()),
            };

            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now_ms(), to_ms(expires_at)],
            )?;

            let user = get_user_internal(conn, &user_id)?
                .ok_or_else(|| ApiError::user_not_found(&user_id))?;

            info!(user_id = %user.id, "Session opened");

            Ok(Session {
                token: token.clone(),
                user,
                expires_at,
            })
        })
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let session: Option<(String, i64)> = conn
                .query_row(
                    "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                    params![token],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match session {
                Some((user_id, expires_at)) if expires_at > now_ms() => {
                    get_user_internal(conn, &user_id)
                }
                Some(_) => {
                    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    /// End a session.
    pub fn logout(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(deleted > 0)
        })
    }
}
