//! Editing state for the add/edit note flows.
//!
//! # Responsibility
//! - Hold the draft being composed, separately from the last committed
//!   store snapshot.
//! - Apply typed, single-field edits.
//! - Record pending media changes until the draft is saved.
//!
//! # Invariants
//! - `set` mutates exactly one field.
//! - A session is "existing" iff it has a committed snapshot.
//! - Store snapshots never overwrite a dirty draft.

use crate::model::note::{Note, NoteId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Editable text attributes of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Title,
    Body,
    Reminder,
}

impl DraftField {
    pub const ALL: [DraftField; 3] = [Self::Title, Self::Body, Self::Reminder];

    /// Parses the UI field name (`title`, `note`, `reminder`).
    pub fn from_name(name: &str) -> Result<Self, UnknownDraftField> {
        match name {
            "title" => Ok(Self::Title),
            "note" => Ok(Self::Body),
            "reminder" => Ok(Self::Reminder),
            other => Err(UnknownDraftField(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "note",
            Self::Reminder => "reminder",
        }
    }
}

/// Field name that does not map to any `DraftField`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDraftField(pub String);

impl Display for UnknownDraftField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown draft field `{}`; expected title|note|reminder",
            self.0
        )
    }
}

impl Error for UnknownDraftField {}

/// Text content of the note being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub body: String,
    pub reminder: String,
}

impl NoteDraft {
    pub fn from_note(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            body: note.body.clone(),
            reminder: note.reminder.clone(),
        }
    }

    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Title => &self.title,
            DraftField::Body => &self.body,
            DraftField::Reminder => &self.reminder,
        }
    }

    pub fn set(&mut self, field: DraftField, value: impl Into<String>) {
        let slot = match field {
            DraftField::Title => &mut self.title,
            DraftField::Body => &mut self.body,
            DraftField::Reminder => &mut self.reminder,
        };
        *slot = value.into();
    }

    /// Copy-on-write variant of [`NoteDraft::set`].
    pub fn with(&self, field: DraftField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.set(field, value);
        next
    }
}

/// Where attached media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A plain filesystem path or a `file://` URI.
    Uri(String),
    /// Already encoded bytes (a captured camera frame).
    Bytes(Vec<u8>),
}

impl MediaSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Uri(path.into().to_string_lossy().into_owned())
    }
}

/// Pending change to one media slot of the draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MediaChange {
    /// Leave the committed attachment as is.
    #[default]
    Keep,
    /// Detach and delete the committed attachment.
    Remove,
    /// Attach new media, replacing any committed attachment.
    Attach(MediaSource),
}

impl MediaChange {
    /// Builds the change implied by an incoming UI reference.
    ///
    /// `None` or an empty reference means the slot was cleared.
    pub fn from_reference(reference: Option<&str>) -> Self {
        match reference.map(str::trim) {
            None | Some("") => Self::Remove,
            Some(value) => Self::Attach(MediaSource::Uri(value.to_string())),
        }
    }
}

/// Result of offering a store snapshot to an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot committed and the draft replaced with it.
    Applied,
    /// Snapshot committed; local unsaved edits were kept.
    DraftKept,
    /// The note no longer exists in the store.
    Deleted,
}

/// One add or edit screen's worth of state.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    committed: Option<Note>,
    draft: NoteDraft,
    image: MediaChange,
    audio: MediaChange,
}

impl EditSession {
    /// Empty session for the "add note" flow.
    pub fn new_note() -> Self {
        Self::default()
    }

    /// Session for the "edit note" flow, seeded from a store snapshot.
    pub fn for_existing(note: Note) -> Self {
        Self {
            draft: NoteDraft::from_note(&note),
            committed: Some(note),
            image: MediaChange::Keep,
            audio: MediaChange::Keep,
        }
    }

    pub fn is_existing(&self) -> bool {
        self.committed.is_some()
    }

    pub fn note_id(&self) -> Option<NoteId> {
        self.committed.as_ref().map(|note| note.id)
    }

    pub fn committed(&self) -> Option<&Note> {
        self.committed.as_ref()
    }

    pub fn draft(&self) -> &NoteDraft {
        &self.draft
    }

    pub fn image_change(&self) -> &MediaChange {
        &self.image
    }

    pub fn audio_change(&self) -> &MediaChange {
        &self.audio
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        self.draft.set(field, value);
    }

    /// Applies an edit addressed by UI field name.
    pub fn set_field_by_name(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), UnknownDraftField> {
        let field = DraftField::from_name(name)?;
        self.draft.set(field, value);
        Ok(())
    }

    pub fn set_image(&mut self, change: MediaChange) {
        self.image = change;
    }

    pub fn set_audio(&mut self, change: MediaChange) {
        self.audio = change;
    }

    /// Whether the draft diverges from the committed snapshot.
    pub fn is_dirty(&self) -> bool {
        let baseline = self
            .committed
            .as_ref()
            .map(NoteDraft::from_note)
            .unwrap_or_default();
        self.draft != baseline || self.image != MediaChange::Keep || self.audio != MediaChange::Keep
    }

    /// Offers a live store snapshot to this session.
    pub fn apply_snapshot(&mut self, snapshot: Option<Note>) -> SnapshotOutcome {
        let Some(note) = snapshot else {
            self.committed = None;
            return SnapshotOutcome::Deleted;
        };

        if self.is_dirty() {
            self.committed = Some(note);
            return SnapshotOutcome::DraftKept;
        }

        self.draft = NoteDraft::from_note(&note);
        self.committed = Some(note);
        SnapshotOutcome::Applied
    }

    /// Marks `note` as the saved state and clears pending changes.
    pub fn mark_saved(&mut self, note: Note) {
        self.draft = NoteDraft::from_note(&note);
        self.committed = Some(note);
        self.image = MediaChange::Keep;
        self.audio = MediaChange::Keep;
    }
}
