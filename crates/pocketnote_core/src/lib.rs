//! Core domain logic for PocketNote.
//! This crate is the single source of truth for note, media and auth rules.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod live;
pub mod logging;
pub mod media;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use auth::{
    AuthError, AuthGateway, CurrentUser, FederatedDisabled, FederatedIdentity, FederatedVerifier,
    IdentityProvider, LocalIdentityProvider, LoginAlert, LoginFlow,
};
pub use config::{ConfigError, CoreConfig};
pub use context::{ContextError, CoreContext, LocalAuthGateway, LocalNoteService};
pub use db::{Database, DbError};
pub use live::Subscription;
pub use logging::{default_log_level, init_logging, logging_status};
pub use media::{MediaCache, MediaError, MediaKind, StagedMedia};
pub use model::draft::{
    DraftField, EditSession, MediaChange, MediaSource, NoteDraft, SnapshotOutcome,
    UnknownDraftField,
};
pub use model::note::{NewNote, Note, NoteId, NoteValidationError, UserId};
pub use model::user::UserProfile;
pub use repo::{RepoError, RepoResult};
pub use service::note_service::{DeleteReport, NoteService, NoteServiceError};
pub use store::{NoteStore, SqliteNoteStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
