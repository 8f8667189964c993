//! Composition root for one app-private data directory.
//!
//! Builds the shared database, auth gateway, note store and media cache and
//! wires them together. Everything is passed in explicitly; nothing here is
//! global.

use crate::auth::{AuthError, AuthGateway, FederatedVerifier, LocalIdentityProvider};
use crate::config::CoreConfig;
use crate::db::{Database, DbError};
use crate::media::MediaCache;
use crate::service::note_service::NoteService;
use crate::store::SqliteNoteStore;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type LocalAuthGateway = AuthGateway<LocalIdentityProvider>;
pub type LocalNoteService = NoteService<SqliteNoteStore, Arc<LocalAuthGateway>>;

#[derive(Debug)]
pub enum ContextError {
    CreateDataRoot(std::io::Error),
    Db(DbError),
    Auth(AuthError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDataRoot(err) => write!(f, "cannot create data root: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Auth(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDataRoot(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Auth(err) => Some(err),
        }
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<AuthError> for ContextError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

/// Fully wired core for one data root.
pub struct CoreContext {
    config: CoreConfig,
    auth: Arc<LocalAuthGateway>,
    notes: LocalNoteService,
}

impl CoreContext {
    /// Opens the database under `config` and assembles the services.
    pub fn open(
        config: CoreConfig,
        verifier: impl FederatedVerifier + 'static,
    ) -> Result<Self, ContextError> {
        std::fs::create_dir_all(config.data_root()).map_err(ContextError::CreateDataRoot)?;
        let db = Database::open(config.db_path())?;
        let context = Self::assemble(config, db, verifier)?;
        info!("event=core_open module=context status=ok");
        Ok(context)
    }

    /// Assembles the services over an already opened database.
    pub fn assemble(
        config: CoreConfig,
        db: Database,
        verifier: impl FederatedVerifier + 'static,
    ) -> Result<Self, ContextError> {
        let provider = LocalIdentityProvider::new(db.clone(), verifier);
        Self::with_provider(config, db, provider)
    }

    /// Assembles the services with a preconfigured identity provider.
    pub fn with_provider(
        config: CoreConfig,
        db: Database,
        provider: LocalIdentityProvider,
    ) -> Result<Self, ContextError> {
        let auth = Arc::new(AuthGateway::new(provider, db.clone())?);
        let store = SqliteNoteStore::new(db);
        let media = MediaCache::new(config.media_root());
        let notes = NoteService::new(store, media, Arc::clone(&auth));
        Ok(Self {
            config,
            auth,
            notes,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn auth(&self) -> &LocalAuthGateway {
        &self.auth
    }

    pub fn notes(&self) -> &LocalNoteService {
        &self.notes
    }
}
