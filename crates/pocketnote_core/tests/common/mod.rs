#![allow(dead_code)]

use argon2::Params;
use pocketnote_core::auth::password::PasswordHashing;
use pocketnote_core::{
    AuthError, CoreConfig, CoreContext, Database, FederatedIdentity, LocalIdentityProvider,
    UserId,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub ctx: CoreContext,
}

impl Fixture {
    pub fn media_root(&self) -> &Path {
        self.ctx.config().media_root()
    }

    /// Writes a source file outside the media root and returns its path.
    pub fn source_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let dir = self.dir.path().join("sources");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::new(dir.path().join("app")).unwrap();
    let db = Database::open_in_memory().unwrap();
    let provider =
        LocalIdentityProvider::new(db.clone(), fake_verifier).with_hashing(cheap_hashing());
    let ctx = CoreContext::with_provider(config, db, provider).unwrap();
    Fixture { dir, ctx }
}

pub fn cheap_hashing() -> PasswordHashing {
    PasswordHashing::new(Params::new(256, 1, 1, None).unwrap())
}

/// Accepts `valid:<subject>` tokens.
pub fn fake_verifier(token: &str) -> Result<FederatedIdentity, AuthError> {
    match token.strip_prefix("valid:") {
        Some(subject) => Ok(FederatedIdentity {
            subject: subject.to_string(),
            email: format!("{subject}@federated.test"),
            display_name: subject.to_uppercase(),
        }),
        None => Err(AuthError::FederatedRejected("bad signature".to_string())),
    }
}

pub fn sign_up(fx: &Fixture, email: &str) -> UserId {
    fx.ctx
        .auth()
        .sign_up_with_password(email, "hunter22", "tester")
        .unwrap()
}

/// Regular files below `dir`, or empty when it does not exist.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}
