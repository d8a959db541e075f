//! Optional SQLite-backed user and score store.
//!
//! Absence of a database path (or a failed open) disables persistence
//! without affecting the rest of the server. Passwords are stored as
//! blake3 hashes, never as plain text.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// Outcome of a login check against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Known user, password hash matched.
    Ok,
    /// First sighting; the account was created.
    Created,
    /// Known user, wrong password.
    WrongPassword,
}

pub struct Store {
    conn: Connection,
}

fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Verify a login, creating the account on first use.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, StoreError> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(stored_hash) => {
                if stored_hash == hash_password(password) {
                    Ok(LoginOutcome::Ok)
                } else {
                    Ok(LoginOutcome::WrongPassword)
                }
            }
            None => {
                self.conn.execute(
                    "INSERT INTO users (username, password, score) VALUES (?1, ?2, 0)",
                    params![username, hash_password(password)],
                )?;
                Ok(LoginOutcome::Created)
            }
        }
    }

    /// Persist a match result, keeping the user's best score.
    pub fn record_score(&self, username: &str, score: u32) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE users SET score = MAX(score, ?2) WHERE username = ?1",
            params![username, score],
        )?;
        Ok(())
    }

    pub fn best_score(&self, username: &str) -> Result<Option<u32>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT score FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_login_creates_account() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.login("alice", "pw").unwrap(), LoginOutcome::Created);
        assert_eq!(store.login("alice", "pw").unwrap(), LoginOutcome::Ok);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.login("alice", "pw").unwrap();
        assert_eq!(
            store.login("alice", "nope").unwrap(),
            LoginOutcome::WrongPassword
        );
    }

    #[test]
    fn passwords_are_not_stored_in_plain_text() {
        let store = Store::open_in_memory().unwrap();
        store.login("alice", "hunter2").unwrap();
        let stored: String = store
            .conn
            .query_row(
                "SELECT password FROM users WHERE username = 'alice'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(stored.len(), 64, "blake3 hex digest");
    }

    #[test]
    fn score_keeps_the_best_result() {
        let store = Store::open_in_memory().unwrap();
        store.login("alice", "pw").unwrap();

        store.record_score("alice", 300).unwrap();
        store.record_score("alice", 150).unwrap();
        assert_eq!(store.best_score("alice").unwrap(), Some(300));

        store.record_score("alice", 900).unwrap();
        assert_eq!(store.best_score("alice").unwrap(), Some(900));
    }

    #[test]
    fn unknown_user_has_no_score() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.best_score("ghost").unwrap(), None);
    }
}
