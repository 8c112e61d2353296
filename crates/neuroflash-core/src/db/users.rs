//! User accounts, password verification and API tokens

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewUser, Profile, ProfileUpdate, User};

const USER_COLUMNS: &str =
    "id, username, email, date_of_birth, gender, country, city, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let dob: Option<String> = row.get(3)?;
    let created_str: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        date_of_birth: dob.as_deref().map(parse_date).transpose()?,
        gender: row.get(4)?,
        country: row.get(5)?,
        city: row.get(6)?,
        created_at: parse_datetime(&created_str),
    })
}

fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// SHA-256 hex digest of a bearer token
pub(crate) fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid email address: {}", email)))
    }
}

impl Database {
    /// Register a user
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let username = new_user.username.trim();
        let email = new_user.email.trim();
        if username.is_empty() || email.is_empty() || new_user.password.is_empty() {
            return Err(Error::Validation(
                "Name, email and password are required".to_string(),
            ));
        }
        validate_email(email)?;

        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)",
            params![email],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&new_user.password)?;
        conn.execute(
            r#"
            INSERT INTO users (username, email, password_hash, date_of_birth, gender, country, city)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                username,
                email,
                password_hash,
                new_user.date_of_birth.map(|d| d.to_string()),
                new_user.gender,
                new_user.country,
                new_user.city,
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!(user_id = id, "User registered");
        self.get_user(id)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
    }

    /// Get a user by email (case-insensitive)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                params![email.trim()],
                user_from_row,
            )
            .optional()?)
    }

    /// Check an email/password pair
    ///
    /// Unknown email and wrong password fail identically.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let conn = self.conn()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?",
                params![email.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((id, hash)) if verify_password(password, &hash) => self.get_user(id),
            _ => {
                debug!("Login rejected");
                Err(Error::Auth("Invalid email or password".to_string()))
            }
        }
    }

    /// Issue a new bearer token, returning the plaintext value
    ///
    /// Only the digest is stored.
    pub fn issue_token(&self, user_id: i64) -> Result<String> {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        let token = hex::encode(bytes);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_tokens (user_id, token_hash) VALUES (?, ?)",
            params![user_id, token_digest(&token)],
        )?;
        Ok(token)
    }

    /// Resolve a bearer token to its user
    pub fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let digest = token_digest(token);
        let user_id: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM api_tokens WHERE token_hash = ?",
                params![digest],
                |row| row.get(0),
            )
            .optional()?;

        match user_id {
            Some(id) => {
                conn.execute(
                    "UPDATE api_tokens SET last_used_at = CURRENT_TIMESTAMP WHERE token_hash = ?",
                    params![digest],
                )?;
                Ok(Some(self.get_user(id)?))
            }
            None => Ok(None),
        }
    }

    /// Revoke a bearer token, returning whether it existed
    pub fn revoke_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM api_tokens WHERE token_hash = ?",
            params![token_digest(token)],
        )?;
        Ok(removed > 0)
    }

    /// Profile with settings and points
    pub fn get_profile(&self, user_id: i64) -> Result<Profile> {
        let user = self.get_user(user_id)?;
        let settings = self.get_settings(user_id)?;
        let points = self.get_user_stats(user_id)?.points;
        Ok(Profile {
            user,
            settings,
            points,
        })
    }

    /// Update username, email and study settings
    pub fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile> {
        let current = self.get_user(user_id)?;

        let username = match &update.username {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::Validation("Username cannot be empty".to_string()))
            }
            Some(name) => name.trim().to_string(),
            None => current.username.clone(),
        };
        let email = match &update.email {
            Some(email) if email.trim().is_empty() => {
                return Err(Error::Validation("Email cannot be empty".to_string()))
            }
            Some(email) => {
                validate_email(email.trim())?;
                email.trim().to_string()
            }
            None => current.email.clone(),
        };

        let settings = self.get_settings(user_id)?.merged(&update.settings);
        settings.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND id != ?)",
            params![email, user_id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::Conflict("Email already in use".to_string()));
        }

        tx.execute(
            "UPDATE users SET username = ?, email = ? WHERE id = ?",
            params![username, email, user_id],
        )?;
        Self::save_settings_tx(&tx, user_id, &settings)?;
        tx.commit()?;

        self.get_profile(user_id)
    }
}
