//! Auth gateway: sign-in/sign-up flows, session and login alert state.
//!
//! # Responsibility
//! - Run password, sign-up and federated flows against an injected
//!   identity provider.
//! - Provision the `Users` profile on sign-up and first federated sign-in.
//! - Track the signed-in user and persist it across restarts.
//! - Expose a login alert keyed by the flow that failed.
//!
//! # Invariants
//! - A failed attempt never changes the signed-in user.
//! - Attempts are never retried.
//! - Credentials and emails are never written to logs.

use crate::db::Database;
use crate::model::note::UserId;
use crate::model::user::UserProfile;
use crate::repo::user_repo::SqliteUserRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod password;
pub mod provider;

pub use provider::{
    FederatedDisabled, FederatedIdentity, FederatedSignIn, FederatedVerifier, IdentityProvider,
    LocalIdentityProvider,
};

pub const BAD_CREDENTIALS_MESSAGE: &str = "Incorrect email and/or password!";
pub const FEDERATED_FAILURE_MESSAGE: &str =
    "Could not sign in with your external account, please try again later!";
pub const UNKNOWN_FAILURE_MESSAGE: &str = "An unknown error occurred!";

/// Authentication failures.
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    FederatedRejected(String),
    FederatedUnavailable,
    EmailTaken,
    InvalidEmail,
    WeakPassword { min_len: usize },
    Hashing(String),
    NotSignedIn,
    Repo(RepoError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::FederatedRejected(reason) => write!(f, "federated token rejected: {reason}"),
            Self::FederatedUnavailable => write!(f, "federated sign-in is not configured"),
            Self::EmailTaken => write!(f, "email is already registered"),
            Self::InvalidEmail => write!(f, "email address is not valid"),
            Self::WeakPassword { min_len } => {
                write!(f, "password must have at least {min_len} characters")
            }
            Self::Hashing(message) => write!(f, "password hashing failed: {message}"),
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::FederatedRejected(_) => "federated_rejected",
            Self::FederatedUnavailable => "federated_unavailable",
            Self::EmailTaken => "email_taken",
            Self::InvalidEmail => "invalid_email",
            Self::WeakPassword { .. } => "weak_password",
            Self::Hashing(_) => "hashing_failed",
            Self::NotSignedIn => "not_signed_in",
            Self::Repo(_) => "storage_failed",
        }
    }
}

/// Which login flow raised the current alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFlow {
    Password,
    Federated,
    SignUp,
}

impl LoginFlow {
    fn label(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Federated => "federated",
            Self::SignUp => "sign_up",
        }
    }
}

/// Alert shown by login screens after a failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAlert {
    pub visible: bool,
    pub flow: Option<LoginFlow>,
}

impl LoginAlert {
    /// Canned message for the flow that failed.
    pub fn message(&self) -> &'static str {
        match self.flow {
            Some(LoginFlow::Password) => BAD_CREDENTIALS_MESSAGE,
            Some(LoginFlow::Federated) => FEDERATED_FAILURE_MESSAGE,
            Some(LoginFlow::SignUp) | None => UNKNOWN_FAILURE_MESSAGE,
        }
    }
}

/// Source of the signed-in user id.
pub trait CurrentUser: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

impl<T: CurrentUser + ?Sized> CurrentUser for Arc<T> {
    fn current_user_id(&self) -> Option<UserId> {
        (**self).current_user_id()
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    current_user: Option<UserId>,
    alert: LoginAlert,
}

/// Auth facade used by login screens and by note services.
pub struct AuthGateway<P: IdentityProvider> {
    provider: P,
    db: Database,
    state: Mutex<GatewayState>,
}

impl<P: IdentityProvider> AuthGateway<P> {
    /// Creates the gateway and restores a persisted session, if any.
    pub fn new(provider: P, db: Database) -> Result<Self, AuthError> {
        let restored = db.with_conn(|conn| SqliteUserRepository::new(conn).load_session())?;
        if restored.is_some() {
            info!("event=session_restore module=auth status=ok");
        }
        Ok(Self {
            provider,
            db,
            state: Mutex::new(GatewayState {
                current_user: restored,
                alert: LoginAlert::default(),
            }),
        })
    }

    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let result = self.provider.sign_in_with_password(email, password);
        self.finish(LoginFlow::Password, result)
    }

    /// Creates an account and writes its profile.
    pub fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, AuthError> {
        let result = self
            .provider
            .create_user_with_password(email, password, display_name);
        self.finish(LoginFlow::SignUp, result)
    }

    /// Signs in with a federated token, provisioning a profile on first use.
    pub fn sign_in_with_federated_token(&self, token: &str) -> Result<UserId, AuthError> {
        let result = self
            .provider
            .sign_in_with_federated_token(token)
            .map(|signed_in| {
                if signed_in.is_new_user {
                    info!("event=profile_provision module=auth status=ok flow=federated");
                }
                signed_in.user_id
            });
        self.finish(LoginFlow::Federated, result)
    }

    pub fn sign_out(&self) -> Result<(), AuthError> {
        self.db
            .with_conn(|conn| SqliteUserRepository::new(conn).clear_session())?;
        self.lock_state().current_user = None;
        info!("event=sign_out module=auth status=ok");
        Ok(())
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.lock_state().current_user.clone()
    }

    /// Signed-in user id, or `NotSignedIn`.
    pub fn require_user(&self) -> Result<UserId, AuthError> {
        self.current_user_id().ok_or(AuthError::NotSignedIn)
    }

    pub fn alert(&self) -> LoginAlert {
        self.lock_state().alert
    }

    pub fn dismiss_alert(&self) {
        self.lock_state().alert.visible = false;
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, AuthError> {
        Ok(self
            .db
            .with_conn(|conn| SqliteUserRepository::new(conn).get_profile(user_id))?)
    }

    fn finish(
        &self,
        flow: LoginFlow,
        result: Result<UserId, AuthError>,
    ) -> Result<UserId, AuthError> {
        let result = result.and_then(|user_id| {
            self.db
                .with_conn(|conn| SqliteUserRepository::new(conn).store_session(&user_id))?;
            Ok(user_id)
        });

        let mut state = self.lock_state();
        match result {
            Ok(user_id) => {
                state.current_user = Some(user_id.clone());
                state.alert = LoginAlert::default();
                info!(
                    "event=sign_in module=auth status=ok flow={}",
                    flow.label()
                );
                Ok(user_id)
            }
            Err(err) => {
                state.alert = LoginAlert {
                    visible: true,
                    flow: Some(flow),
                };
                warn!(
                    "event=sign_in module=auth status=error flow={} error_code={}",
                    flow.label(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GatewayState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<P: IdentityProvider> CurrentUser for AuthGateway<P> {
    fn current_user_id(&self) -> Option<UserId> {
        AuthGateway::current_user_id(self)
    }
}
