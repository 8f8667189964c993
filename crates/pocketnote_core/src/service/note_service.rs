//! Note use-case service.
//!
//! # Responsibility
//! - Open add/edit sessions and live views for the signed-in user.
//! - Save sessions: cache attached media, then persist the record.
//! - Delete notes together with their cached media.
//!
//! # Invariants
//! - Every read and write is scoped to the signed-in user; foreign notes
//!   are reported as not owned.
//! - Media copied for a save that then fails to persist is removed again,
//!   and replaced files are deleted only after the record is updated.
//! - A failed media delete never blocks deleting the note record.

use crate::auth::CurrentUser;
use crate::live::Subscription;
use crate::media::{MediaCache, MediaError, MediaKind, StagedMedia};
use crate::model::draft::EditSession;
use crate::model::note::{now_epoch_millis, NewNote, Note, NoteId, UserId};
use crate::repo::RepoError;
use crate::store::NoteStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// No user is signed in.
    NotSignedIn,
    /// Target note belongs to another user.
    NotOwner(NoteId),
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Media cache failure.
    Media(MediaError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::NotOwner(id) => write!(f, "note {id} belongs to another user"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Media(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Media(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<MediaError> for NoteServiceError {
    fn from(value: MediaError) -> Self {
        Self::Media(value)
    }
}

pub type NoteServiceResult<T> = Result<T, NoteServiceError>;

/// What a delete removed from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Number of cached media files removed.
    pub removed_files: usize,
}

/// Note service facade over an injected store, media cache and session.
pub struct NoteService<S: NoteStore, U: CurrentUser> {
    store: S,
    media: MediaCache,
    session: U,
}

impl<S: NoteStore, U: CurrentUser> NoteService<S, U> {
    pub fn new(store: S, media: MediaCache, session: U) -> Self {
        Self {
            store,
            media,
            session,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn media(&self) -> &MediaCache {
        &self.media
    }

    /// Live, newest-first list of the signed-in user's notes.
    pub fn observe_my_notes(&self) -> NoteServiceResult<Subscription<Vec<Note>>> {
        let owner = self.require_user()?;
        Ok(self.store.observe_by_owner(&owner)?)
    }

    /// Live view of one owned note.
    pub fn observe_note(&self, id: NoteId) -> NoteServiceResult<Subscription<Option<Note>>> {
        self.get_note(id)?;
        Ok(self.store.observe_by_id(id)?)
    }

    /// One-shot read of one owned note.
    pub fn get_note(&self, id: NoteId) -> NoteServiceResult<Note> {
        let owner = self.require_user()?;
        let note = self
            .store
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;
        ensure_owner(&note, &owner)?;
        Ok(note)
    }

    /// Starts an "add note" session.
    pub fn begin_new(&self) -> EditSession {
        EditSession::new_note()
    }

    /// Starts an "edit note" session seeded from the stored note.
    pub fn begin_edit(&self, id: NoteId) -> NoteServiceResult<EditSession> {
        Ok(EditSession::for_existing(self.get_note(id)?))
    }

    /// Persists a session, creating or updating as appropriate.
    ///
    /// On success the session is marked saved with the stored note.
    pub fn save(&self, session: &mut EditSession) -> NoteServiceResult<Note> {
        let owner = self.require_user()?;
        let started_at = Instant::now();
        let mode = if session.is_existing() {
            "update"
        } else {
            "create"
        };

        let result = if session.is_existing() {
            self.save_existing(&owner, session)
        } else {
            self.save_new(&owner, session)
        };

        match &result {
            Ok(note) => {
                info!(
                    "event=note_save module=service status=ok mode={mode} note_id={} duration_ms={}",
                    note.id,
                    started_at.elapsed().as_millis()
                );
                session.mark_saved(note.clone());
            }
            Err(err) => warn!(
                "event=note_save module=service status=error mode={mode} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Deletes an owned note and its cached media.
    pub fn delete(&self, id: NoteId) -> NoteServiceResult<DeleteReport> {
        let note = self.get_note(id)?;
        let mut report = DeleteReport::default();

        for path in note.media_paths() {
            match self.media.delete_if_exists(path) {
                Ok(true) => report.removed_files += 1,
                Ok(false) => {}
                Err(err) => warn!(
                    "event=note_delete module=service status=warn note_id={id} error_code=media_delete_failed error={err}"
                ),
            }
        }

        self.store.delete(id)?;
        info!(
            "event=note_delete module=service status=ok note_id={id} removed_files={}",
            report.removed_files
        );
        Ok(report)
    }

    fn save_new(&self, owner: &str, session: &EditSession) -> NoteServiceResult<Note> {
        let (image, audio) = self.stage_media(owner, None, session)?;

        let draft = session.draft();
        let new_note = NewNote {
            owner_id: owner.to_string(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            image_path: image.path.clone(),
            audio_path: audio.path.clone(),
            reminder: draft.reminder.clone(),
            created_at: now_epoch_millis(),
        };

        let id = match self.store.create(&new_note) {
            Ok(id) => id,
            Err(err) => {
                self.rollback(&[&image, &audio]);
                return Err(err.into());
            }
        };

        self.store
            .get(id)?
            .ok_or(NoteServiceError::InconsistentState(
                "created note not found in read-back",
            ))
    }

    fn save_existing(&self, owner: &str, session: &EditSession) -> NoteServiceResult<Note> {
        let committed = session
            .committed()
            .ok_or(NoteServiceError::InconsistentState(
                "existing session without committed note",
            ))?;
        ensure_owner(committed, owner)?;

        let (image, audio) = self.stage_media(owner, Some(committed), session)?;

        let draft = session.draft();
        let updated = Note {
            id: committed.id,
            owner_id: committed.owner_id.clone(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            image_path: image.path.clone(),
            audio_path: audio.path.clone(),
            reminder: draft.reminder.clone(),
            created_at: committed.created_at,
        };
        if let Err(err) = self.store.update(updated.id, &updated) {
            self.rollback(&[&image, &audio]);
            return Err(err.into());
        }

        // The record no longer references superseded files.
        for staged in [&image, &audio] {
            if let Err(err) = self.media.release_superseded(staged) {
                warn!(
                    "event=note_save module=service status=warn note_id={} error_code=media_release_failed error={err}",
                    updated.id
                );
            }
        }

        self.store
            .get(updated.id)?
            .ok_or(NoteServiceError::InconsistentState(
                "updated note not found in read-back",
            ))
    }

    /// Stages both media slots; a failure on the second undoes the first.
    fn stage_media(
        &self,
        owner: &str,
        committed: Option<&Note>,
        session: &EditSession,
    ) -> NoteServiceResult<(StagedMedia, StagedMedia)> {
        let image = self.media.stage(
            owner,
            MediaKind::Image,
            committed.and_then(|note| note.image_path.as_deref()),
            session.image_change(),
        )?;
        let audio = match self.media.stage(
            owner,
            MediaKind::Audio,
            committed.and_then(|note| note.audio_path.as_deref()),
            session.audio_change(),
        ) {
            Ok(staged) => staged,
            Err(err) => {
                self.rollback(&[&image]);
                return Err(err.into());
            }
        };
        Ok((image, audio))
    }

    fn rollback(&self, staged: &[&StagedMedia]) {
        for slot in staged {
            if let Err(err) = self.media.rollback(slot) {
                warn!("event=media_rollback module=service status=error error={err}");
            }
        }
    }

    fn require_user(&self) -> NoteServiceResult<UserId> {
        self.session
            .current_user_id()
            .ok_or(NoteServiceError::NotSignedIn)
    }
}

fn ensure_owner(note: &Note, owner: &str) -> NoteServiceResult<()> {
    if note.owner_id == owner {
        Ok(())
    } else {
        Err(NoteServiceError::NotOwner(note.id))
    }
}
