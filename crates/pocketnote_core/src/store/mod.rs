//! Note store: CRUD plus live observation.
//!
//! # Responsibility
//! - Define the injectable store handle consumed by note services.
//! - Provide the SQLite-backed implementation with change fan-out.
//!
//! # Invariants
//! - Live operations push an initial snapshot, then one full snapshot per
//!   change affecting them, from any handle sharing the store.
//! - Owner lists are ordered by creation time, newest first.

use crate::live::Subscription;
use crate::model::note::{NewNote, Note, NoteId};
use crate::repo::RepoResult;

mod sqlite;

pub use sqlite::SqliteNoteStore;

/// Injectable note store handle.
pub trait NoteStore: Send + Sync {
    /// Persists a new note; the store assigns and returns its id.
    fn create(&self, note: &NewNote) -> RepoResult<NoteId>;
    /// One-shot read of a note.
    fn get(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// One-shot read of an owner's notes, newest first.
    fn list_by_owner(&self, owner_id: &str) -> RepoResult<Vec<Note>>;
    /// Replaces the stored record for `id`.
    fn update(&self, id: NoteId, note: &Note) -> RepoResult<()>;
    /// Removes the stored record for `id`.
    fn delete(&self, id: NoteId) -> RepoResult<()>;
    /// Live view of one note; `None` is pushed once it is deleted.
    fn observe_by_id(&self, id: NoteId) -> RepoResult<Subscription<Option<Note>>>;
    /// Live view of an owner's notes, newest first.
    fn observe_by_owner(&self, owner_id: &str) -> RepoResult<Subscription<Vec<Note>>>;
}
