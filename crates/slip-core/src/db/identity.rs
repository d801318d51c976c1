//! Users, alias profiles and the signed-in session

use std::sync::LazyLock;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::Database;
use crate::error::{Error, Result};
use crate::models::Session;
use crate::store::IdentityProvider;

/// Domain for aliases given without one
pub const DEFAULT_ALIAS_DOMAIN: &str = "slip.email";

pub const MIN_PASSWORD_LEN: usize = 6;

static ALIAS_LOCAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{1,30}[a-z0-9]$").expect("valid regex"));

/// Full alias address for `alias`
///
/// A bare alias gets `@<domain>` appended; the local part is lowercased and
/// must be 3 to 32 characters of `a-z 0-9 . _ -`.
pub fn email_alias(alias: &str, domain: &str) -> Result<String> {
    let alias = alias.trim().to_lowercase();
    let (local, domain) = match alias.split_once('@') {
        Some((local, domain)) => (local.to_string(), domain.to_string()),
        None => (alias.clone(), domain.trim_start_matches('@').to_lowercase()),
    };

    if !ALIAS_LOCAL_PART.is_match(&local) {
        return Err(Error::InvalidData(format!(
            "Invalid alias '{}': use 3-32 letters, digits, '.', '_' or '-'",
            local
        )));
    }
    if domain.is_empty() || !domain.contains('.') {
        return Err(Error::InvalidData(format!("Invalid alias domain '{}'", domain)));
    }

    Ok(format!("{}@{}", local, domain))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| Error::Auth(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn load_session(conn: &Connection, user_id: &str) -> Result<Session> {
    conn.query_row(
        "SELECT u.id, u.email, p.email_alias, p.full_name
         FROM users u JOIN profiles p ON p.user_id = u.id
         WHERE u.id = ?",
        params![user_id],
        |row| {
            Ok(Session {
                user_id: row.get(0)?,
                email: row.get(1)?,
                email_alias: row.get(2)?,
                full_name: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

impl Database {
    /// Register a user and profile, then sign them in
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        alias: &str,
        full_name: Option<&str>,
    ) -> Result<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidData(format!("Invalid email: '{}'", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Auth(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let alias = email_alias(alias, &self.alias_domain)?;
        let full_name = full_name.map(str::trim).filter(|n| !n.is_empty());
        let password_hash = hash_password(password)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let email_taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)",
            params![email],
            |row| row.get(0),
        )?;
        if email_taken {
            return Err(Error::Auth(format!("Email already registered: {}", email)));
        }

        let alias_taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE email_alias = ?)",
            params![alias],
            |row| row.get(0),
        )?;
        if alias_taken {
            return Err(Error::Auth(format!("Alias already taken: {}", alias)));
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
            params![user_id, email, password_hash],
        )?;
        tx.execute(
            "INSERT INTO profiles (user_id, email_alias, full_name) VALUES (?, ?, ?)",
            params![user_id, alias, full_name],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO session (id, user_id) VALUES (1, ?)",
            params![user_id],
        )?;

        let session = load_session(&tx, &user_id)?;
        tx.commit()?;

        info!("Registered user {} with alias {}", session.email, session.email_alias);
        Ok(session)
    }

    /// Check credentials and make the user the signed-in session
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        let conn = self.conn()?;

        let user: Option<(String, String)> = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let invalid = || Error::Auth("Invalid email or password".to_string());
        let (user_id, stored) = user.ok_or_else(invalid)?;
        if !verify_password(password, &stored)? {
            return Err(invalid());
        }

        conn.execute(
            "INSERT OR REPLACE INTO session (id, user_id) VALUES (1, ?)",
            params![user_id],
        )?;

        info!("Signed in {}", email);
        load_session(&conn, &user_id)
    }

    pub fn session(&self) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let user_id: Option<String> = conn
            .query_row("SELECT user_id FROM session WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        user_id.map(|id| load_session(&conn, &id)).transpose()
    }

    pub fn clear_session(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM session", [])?;
        info!("Signed out");
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for Database {
    async fn current_session(&self) -> Result<Option<Session>> {
        self.session()
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        alias: &str,
        full_name: Option<&str>,
    ) -> Result<Session> {
        self.create_user(email, password, alias, full_name)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.authenticate(email, password)
    }

    async fn sign_out(&self) -> Result<()> {
        self.clear_session()
    }
}
