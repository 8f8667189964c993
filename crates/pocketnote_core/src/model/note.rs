//! Note domain model.
//!
//! # Responsibility
//! - Define the note record and its pre-creation shape (`NewNote`).
//! - Own the serialized document layout (`userId`, `note`, `imageUrl`, ...).
//!
//! # Invariants
//! - `owner_id` is never empty.
//! - Attached media paths are either `None` or a non-empty path; the
//!   serialized document uses an empty string for "no media".
//! - `created_at` is Unix epoch milliseconds and orders lists numerically.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned note identifier.
pub type NoteId = Uuid;

/// Identifier of an authenticated user.
pub type UserId = String;

const CREATED_AT_DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Validation failures for note records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    MissingOwner,
    EmptyMediaPath(&'static str),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOwner => write!(f, "note owner id must not be empty"),
            Self::EmptyMediaPath(field) => {
                write!(f, "{field} must be absent or a non-empty path")
            }
        }
    }
}

impl Error for NoteValidationError {}

/// A persisted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "idNote")]
    pub id: NoteId,
    #[serde(rename = "userId")]
    pub owner_id: UserId,
    pub title: String,
    /// Body text, stored under the `note` field.
    #[serde(rename = "note")]
    pub body: String,
    /// Local path of the attached image.
    #[serde(rename = "imageUrl", with = "empty_as_none", default)]
    pub image_path: Option<String>,
    /// Local path of the attached voice recording.
    #[serde(rename = "audioUrl", with = "empty_as_none", default)]
    pub audio_path: Option<String>,
    /// Free-text reminder date as picked in the UI.
    pub reminder: String,
    #[serde(rename = "createAt")]
    pub created_at: i64,
}

impl Note {
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        validate_fields(
            &self.owner_id,
            self.image_path.as_deref(),
            self.audio_path.as_deref(),
        )
    }

    /// Creation time rendered as `dd/MM/yyyy HH:mm:ss` in local time.
    pub fn created_at_display(&self) -> String {
        format_epoch_millis(self.created_at)
    }

    /// Iterates attached media paths (image first).
    pub fn media_paths(&self) -> impl Iterator<Item = &str> {
        self.image_path
            .as_deref()
            .into_iter()
            .chain(self.audio_path.as_deref())
    }
}

/// A note that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub owner_id: UserId,
    pub title: String,
    pub body: String,
    pub image_path: Option<String>,
    pub audio_path: Option<String>,
    pub reminder: String,
    pub created_at: i64,
}

impl NewNote {
    /// Creates a text-only note stamped with the current time.
    pub fn new(
        owner_id: impl Into<UserId>,
        title: impl Into<String>,
        body: impl Into<String>,
        reminder: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            body: body.into(),
            image_path: None,
            audio_path: None,
            reminder: reminder.into(),
            created_at: now_epoch_millis(),
        }
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        validate_fields(
            &self.owner_id,
            self.image_path.as_deref(),
            self.audio_path.as_deref(),
        )
    }

    /// Binds the store-assigned id.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            owner_id: self.owner_id,
            title: self.title,
            body: self.body,
            image_path: self.image_path,
            audio_path: self.audio_path,
            reminder: self.reminder,
            created_at: self.created_at,
        }
    }
}

/// Current time as Unix epoch milliseconds.
pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats epoch milliseconds with the note display layout.
///
/// Out-of-range values render as an empty string.
pub fn format_epoch_millis(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format(CREATED_AT_DISPLAY_FORMAT)
                .to_string()
        })
        .unwrap_or_default()
}

fn validate_fields(
    owner_id: &str,
    image_path: Option<&str>,
    audio_path: Option<&str>,
) -> Result<(), NoteValidationError> {
    if owner_id.trim().is_empty() {
        return Err(NoteValidationError::MissingOwner);
    }
    if image_path.is_some_and(|path| path.trim().is_empty()) {
        return Err(NoteValidationError::EmptyMediaPath("image_path"));
    }
    if audio_path.is_some_and(|path| path.trim().is_empty()) {
        return Err(NoteValidationError::EmptyMediaPath("audio_path"));
    }
    Ok(())
}

/// Maps `None` to `""` on the wire and back.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(de)?;
        Ok(raw.filter(|value| !value.is_empty()))
    }
}
