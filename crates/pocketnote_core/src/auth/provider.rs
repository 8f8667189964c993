//! Identity provider seam and the local SQLite-backed provider.
//!
//! # Responsibility
//! - Define the contract the auth gateway uses to check credentials.
//! - Verify federated tokens through an injected verifier.
//!
//! # Invariants
//! - Credential emails are unique, case-insensitively.
//! - A federated subject maps to exactly one user id.
//! - An account never exists without its `Users` profile: both rows are
//!   written in one transaction.

use crate::auth::password::PasswordHashing;
use crate::auth::AuthError;
use crate::db::Database;
use crate::model::note::UserId;
use crate::model::user::UserProfile;
use crate::repo::user_repo::{CredentialRecord, SqliteUserRepository};
use crate::repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Minimum accepted password length for new accounts.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Identity asserted by a verified federated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    /// Stable account id at the federated issuer.
    pub subject: String,
    pub email: String,
    pub display_name: String,
}

/// Outcome of a successful federated sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedSignIn {
    pub user_id: UserId,
    pub identity: FederatedIdentity,
    /// `true` when this sign-in created the local account.
    pub is_new_user: bool,
}

/// Validates federated tokens.
pub trait FederatedVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError>;
}

impl<F> FederatedVerifier for F
where
    F: Fn(&str) -> Result<FederatedIdentity, AuthError> + Send + Sync,
{
    fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError> {
        self(token)
    }
}

/// Verifier used when no federated issuer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FederatedDisabled;

impl FederatedVerifier for FederatedDisabled {
    fn verify(&self, _token: &str) -> Result<FederatedIdentity, AuthError> {
        Err(AuthError::FederatedUnavailable)
    }
}

/// Credential authority used by the auth gateway.
pub trait IdentityProvider: Send + Sync {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<UserId, AuthError>;
    /// Creates the account and its `Users` profile atomically.
    fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, AuthError>;
    /// Signs in, linking the account and writing its profile on first use.
    fn sign_in_with_federated_token(&self, token: &str) -> Result<FederatedSignIn, AuthError>;
}

/// Identity provider backed by the local database.
pub struct LocalIdentityProvider {
    db: Database,
    hashing: PasswordHashing,
    verifier: Box<dyn FederatedVerifier>,
}

impl LocalIdentityProvider {
    pub fn new(db: Database, verifier: impl FederatedVerifier + 'static) -> Self {
        Self {
            db,
            hashing: PasswordHashing::default(),
            verifier: Box::new(verifier),
        }
    }

    /// Overrides password hashing cost.
    pub fn with_hashing(mut self, hashing: PasswordHashing) -> Self {
        self.hashing = hashing;
        self
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = email.trim();
        let record = self
            .db
            .with_conn(|conn| SqliteUserRepository::new(conn).find_credential_by_email(email))?
            .ok_or(AuthError::InvalidCredentials)?;

        if self.hashing.verify(&record.password_hash, password) {
            Ok(record.user_id)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, AuthError> {
        let email = email.trim();
        if !EMAIL_RE.is_match(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let password_hash = self.hashing.hash(password).map_err(AuthError::Hashing)?;
        let user_id = Uuid::new_v4().to_string();
        let record = CredentialRecord {
            user_id: user_id.clone(),
            email: email.to_string(),
            password_hash,
        };

        let profile = UserProfile {
            user_id: user_id.clone(),
            email: email.to_string(),
            username: display_name.trim().to_string(),
        };

        self.db.with_conn(|conn| {
            let tx = conn.transaction().map_err(RepoError::from)?;
            let repo = SqliteUserRepository::new(&tx);
            if repo.find_credential_by_email(email)?.is_some() {
                return Err(AuthError::EmailTaken);
            }
            repo.insert_credential(&record)?;
            repo.insert_profile_if_absent(&profile)?;
            tx.commit().map_err(RepoError::from)?;
            Ok(())
        })?;

        Ok(user_id)
    }

    fn sign_in_with_federated_token(&self, token: &str) -> Result<FederatedSignIn, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::FederatedRejected("empty token".to_string()));
        }
        let identity = self.verifier.verify(token)?;

        self.db.with_conn(|conn| {
            let tx = conn.transaction().map_err(RepoError::from)?;
            let repo = SqliteUserRepository::new(&tx);
            if let Some(user_id) = repo.find_federated_user(&identity.subject)? {
                return Ok(FederatedSignIn {
                    user_id,
                    identity: identity.clone(),
                    is_new_user: false,
                });
            }

            let user_id = Uuid::new_v4().to_string();
            repo.link_federated_user(&identity.subject, &user_id)?;
            repo.insert_profile_if_absent(&UserProfile {
                user_id: user_id.clone(),
                email: identity.email.clone(),
                username: identity.display_name.clone(),
            })?;
            tx.commit().map_err(RepoError::from)?;
            Ok(FederatedSignIn {
                user_id,
                identity: identity.clone(),
                is_new_user: true,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FederatedDisabled, FederatedVerifier, IdentityProvider, LocalIdentityProvider, EMAIL_RE,
    };
    use crate::auth::password::PasswordHashing;
    use crate::auth::AuthError;
    use crate::db::Database;
    use crate::repo::user_repo::SqliteUserRepository;
    use argon2::Params;

    #[test]
    fn email_shape_check() {
        assert!(EMAIL_RE.is_match("a@b.co"));
        assert!(!EMAIL_RE.is_match("a@b"));
        assert!(!EMAIL_RE.is_match("a b@c.de"));
        assert!(!EMAIL_RE.is_match(""));
    }

    #[test]
    fn disabled_verifier_rejects_every_token() {
        assert!(matches!(
            FederatedDisabled.verify("token"),
            Err(AuthError::FederatedUnavailable)
        ));
    }

    #[test]
    fn failed_profile_write_leaves_no_credential() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TEMP TRIGGER reject_profiles BEFORE INSERT ON users
                 BEGIN SELECT RAISE(ABORT, 'profiles unavailable'); END;",
            )
        })
        .unwrap();
        let provider = LocalIdentityProvider::new(db.clone(), FederatedDisabled)
            .with_hashing(PasswordHashing::new(Params::new(256, 1, 1, None).unwrap()));

        let result = provider.create_user_with_password("ana@example.com", "hunter22", "Ana");

        assert!(matches!(result, Err(AuthError::Repo(_))));
        let stored = db
            .with_conn(|conn| {
                SqliteUserRepository::new(conn).find_credential_by_email("ana@example.com")
            })
            .unwrap();
        assert!(stored.is_none());
    }
}
