//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `notes` table.
//! - Assign note ids on creation.
//!
//! # Invariants
//! - Owner lists are ordered by `create_at DESC, id ASC`.
//! - `update_note` never changes a note's owner.

use crate::model::note::{NewNote, Note, NoteId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    note,
    image_url,
    audio_url,
    reminder,
    create_at
FROM notes";

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts a note and returns its freshly assigned id.
    fn create_note(&self, note: &NewNote) -> RepoResult<NoteId>;
    /// Gets one note by id.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Lists all notes of one owner, newest first.
    fn list_notes_by_owner(&self, owner_id: &str) -> RepoResult<Vec<Note>>;
    /// Replaces every mutable field of an existing note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    /// Hard-deletes one note.
    fn delete_note(&self, id: NoteId) -> RepoResult<()>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &NewNote) -> RepoResult<NoteId> {
        note.validate()?;
        let id = Uuid::new_v4();

        self.conn.execute(
            "INSERT INTO notes (
                id,
                user_id,
                title,
                note,
                image_url,
                audio_url,
                reminder,
                create_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                note.owner_id.as_str(),
                note.title.as_str(),
                note.body.as_str(),
                note.image_path.as_deref(),
                note.audio_path.as_deref(),
                note.reminder.as_str(),
                note.created_at,
            ],
        )?;

        Ok(id)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_note_row(row)),
            )
            .optional()?;
        note.transpose()
    }

    fn list_notes_by_owner(&self, owner_id: &str) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY create_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([owner_id])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;

        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?3,
                note = ?4,
                image_url = ?5,
                audio_url = ?6,
                reminder = ?7,
                create_at = ?8
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                note.id.to_string(),
                note.owner_id.as_str(),
                note.title.as_str(),
                note.body.as_str(),
                note.image_path.as_deref(),
                note.audio_path.as_deref(),
                note.reminder.as_str(),
                note.created_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id));
        }
        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in notes.id"))
    })?;

    let note = Note {
        id,
        owner_id: row.get("user_id")?,
        title: row.get("title")?,
        body: row.get("note")?,
        image_path: non_empty(row.get("image_url")?),
        audio_path: non_empty(row.get("audio_url")?),
        reminder: row.get("reminder")?,
        created_at: row.get("create_at")?,
    };
    note.validate()?;
    Ok(note)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
