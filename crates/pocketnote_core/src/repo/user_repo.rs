//! User profile, credential and session persistence.
//!
//! # Responsibility
//! - Persist `Users` profiles written at sign-up / first federated login.
//! - Persist password credentials and federated subject links for the local
//!   identity provider.
//! - Persist the single signed-in session slot.
//!
//! # Invariants
//! - A profile is written at most once per user id.
//! - Credential emails are unique, case-insensitively.
//! - At most one session row exists.

use crate::model::note::UserId;
use crate::model::user::UserProfile;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Stored password credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: String,
}

/// SQLite-backed access to user-related tables.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Writes `profile` unless one already exists for its user id.
    ///
    /// Returns `true` when a new row was written.
    pub fn insert_profile_if_absent(&self, profile: &UserProfile) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id, email, username) VALUES (?1, ?2, ?3);",
            params![
                profile.user_id.as_str(),
                profile.email.as_str(),
                profile.username.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_profile(&self, user_id: &str) -> RepoResult<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT user_id, email, username FROM users WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        username: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Inserts a credential row; fails on a duplicate email.
    pub fn insert_credential(&self, record: &CredentialRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO credentials (user_id, email, password_hash) VALUES (?1, ?2, ?3);",
            params![
                record.user_id.as_str(),
                record.email.as_str(),
                record.password_hash.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn find_credential_by_email(&self, email: &str) -> RepoResult<Option<CredentialRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT user_id, email, password_hash
                 FROM credentials
                 WHERE email = ?1 COLLATE NOCASE;",
                [email],
                |row| {
                    Ok(CredentialRecord {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn find_federated_user(&self, subject: &str) -> RepoResult<Option<UserId>> {
        let user_id = self
            .conn
            .query_row(
                "SELECT user_id FROM federated_identities WHERE subject = ?1;",
                [subject],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    pub fn link_federated_user(&self, subject: &str, user_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO federated_identities (subject, user_id) VALUES (?1, ?2);",
            params![subject, user_id],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> RepoResult<Option<UserId>> {
        let user_id = self
            .conn
            .query_row("SELECT user_id FROM session WHERE slot = 1;", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(user_id)
    }

    pub fn store_session(&self, user_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO session (slot, user_id) VALUES (1, ?1)
             ON CONFLICT(slot) DO UPDATE SET
                user_id = excluded.user_id,
                signed_in_at = (strftime('%s', 'now') * 1000);",
            [user_id],
        )?;
        Ok(())
    }

    pub fn clear_session(&self) -> RepoResult<()> {
        self.conn.execute("DELETE FROM session;", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CredentialRecord, SqliteUserRepository};
    use crate::db::open_db_in_memory;
    use crate::model::user::UserProfile;

    #[test]
    fn profile_is_written_once() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        let profile = UserProfile {
            user_id: "u1".to_string(),
            email: "a@example.com".to_string(),
            username: "alice".to_string(),
        };

        assert!(repo.insert_profile_if_absent(&profile).unwrap());
        let renamed = UserProfile {
            username: "other".to_string(),
            ..profile.clone()
        };
        assert!(!repo.insert_profile_if_absent(&renamed).unwrap());
        assert_eq!(repo.get_profile("u1").unwrap(), Some(profile));
    }

    #[test]
    fn credential_lookup_ignores_email_case_and_rejects_duplicates() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        let record = CredentialRecord {
            user_id: "u1".to_string(),
            email: "Alice@Example.com".to_string(),
            password_hash: "hash".to_string(),
        };
        repo.insert_credential(&record).unwrap();

        let found = repo
            .find_credential_by_email("alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "u1");

        let duplicate = CredentialRecord {
            user_id: "u2".to_string(),
            ..record
        };
        assert!(repo.insert_credential(&duplicate).is_err());
    }

    #[test]
    fn session_slot_is_replaced_and_cleared() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        assert_eq!(repo.load_session().unwrap(), None);

        repo.store_session("u1").unwrap();
        repo.store_session("u2").unwrap();
        assert_eq!(repo.load_session().unwrap().as_deref(), Some("u2"));

        repo.clear_session().unwrap();
        assert_eq!(repo.load_session().unwrap(), None);
    }
}
