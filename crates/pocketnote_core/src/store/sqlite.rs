//! SQLite note store with in-process change fan-out.
//!
//! Lock order is always `listeners` before the database connection, so a
//! subscriber can never miss a change between its initial snapshot and its
//! registration.

use super::NoteStore;
use crate::db::Database;
use crate::live::Subscription;
use crate::model::note::{NewNote, Note, NoteId, UserId};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::{RepoError, RepoResult};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// SQLite-backed [`NoteStore`].
///
/// Clones share the connection and the listener registry, so a write made
/// through one clone reaches subscribers of every other clone.
#[derive(Clone)]
pub struct SqliteNoteStore {
    db: Database,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<Listener>,
}

struct Listener {
    id: u64,
    sink: ListenerSink,
}

enum ListenerSink {
    Note(NoteId, Sender<Option<Note>>),
    Owner(UserId, Sender<Vec<Note>>),
}

impl ListenerSink {
    fn matches(&self, note_id: NoteId, owner_id: &str) -> bool {
        match self {
            Self::Note(id, _) => *id == note_id,
            Self::Owner(owner, _) => owner == owner_id,
        }
    }
}

impl SqliteNoteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
        }
    }

    /// Number of live subscriptions currently registered.
    pub fn listener_count(&self) -> usize {
        lock_registry(&self.listeners).entries.len()
    }

    fn register(
        &self,
        registry: &mut ListenerRegistry,
        sink: ListenerSink,
    ) -> impl FnOnce() + Send + 'static {
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push(Listener { id, sink });

        let weak: Weak<Mutex<ListenerRegistry>> = Arc::downgrade(&self.listeners);
        move || {
            if let Some(listeners) = weak.upgrade() {
                lock_registry(&listeners)
                    .entries
                    .retain(|listener| listener.id != id);
                debug!("event=note_observe_release module=store status=ok listener_id={id}");
            }
        }
    }

    /// Pushes fresh snapshots to every listener affected by a change.
    ///
    /// Snapshot failures are logged and skipped; listeners whose consumer
    /// went away are pruned.
    fn notify(&self, note_id: NoteId, owner_id: &str) {
        let mut registry = lock_registry(&self.listeners);
        let mut owner_snapshot: Option<Vec<Note>> = None;
        let mut note_snapshot: Option<Option<Note>> = None;

        registry.entries.retain(|listener| {
            if !listener.sink.matches(note_id, owner_id) {
                return true;
            }
            match &listener.sink {
                ListenerSink::Note(id, tx) => {
                    if note_snapshot.is_none() {
                        match self.read(|repo| repo.get_note(*id)) {
                            Ok(snapshot) => note_snapshot = Some(snapshot),
                            Err(err) => {
                                warn!(
                                    "event=note_observe_push module=store status=error kind=note error={err}"
                                );
                                return true;
                            }
                        }
                    }
                    let snapshot = note_snapshot.clone().unwrap_or_default();
                    tx.send(snapshot).is_ok()
                }
                ListenerSink::Owner(owner, tx) => {
                    if owner_snapshot.is_none() {
                        match self.read(|repo| repo.list_notes_by_owner(owner)) {
                            Ok(snapshot) => owner_snapshot = Some(snapshot),
                            Err(err) => {
                                warn!(
                                    "event=note_observe_push module=store status=error kind=owner error={err}"
                                );
                                return true;
                            }
                        }
                    }
                    let snapshot = owner_snapshot.clone().unwrap_or_default();
                    tx.send(snapshot).is_ok()
                }
            }
        });
    }

    fn read<T>(&self, f: impl FnOnce(&SqliteNoteRepository<'_>) -> RepoResult<T>) -> RepoResult<T> {
        self.db.with_conn(|conn| f(&SqliteNoteRepository::new(conn)))
    }
}

impl NoteStore for SqliteNoteStore {
    fn create(&self, note: &NewNote) -> RepoResult<NoteId> {
        let id = self.read(|repo| repo.create_note(note))?;
        debug!("event=note_store_create module=store status=ok note_id={id}");
        self.notify(id, &note.owner_id);
        Ok(id)
    }

    fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.read(|repo| repo.get_note(id))
    }

    fn list_by_owner(&self, owner_id: &str) -> RepoResult<Vec<Note>> {
        self.read(|repo| repo.list_notes_by_owner(owner_id))
    }

    fn update(&self, id: NoteId, note: &Note) -> RepoResult<()> {
        if note.id != id {
            return Err(RepoError::InvalidData(format!(
                "note id {} does not match update target {id}",
                note.id
            )));
        }
        self.read(|repo| repo.update_note(note))?;
        debug!("event=note_store_update module=store status=ok note_id={id}");
        self.notify(id, &note.owner_id);
        Ok(())
    }

    fn delete(&self, id: NoteId) -> RepoResult<()> {
        let owner_id = self.read(|repo| {
            let existing = repo.get_note(id)?.ok_or(RepoError::NotFound(id))?;
            repo.delete_note(id)?;
            Ok(existing.owner_id)
        })?;
        debug!("event=note_store_delete module=store status=ok note_id={id}");
        self.notify(id, &owner_id);
        Ok(())
    }

    fn observe_by_id(&self, id: NoteId) -> RepoResult<Subscription<Option<Note>>> {
        let mut registry = lock_registry(&self.listeners);
        let initial = self.read(|repo| repo.get_note(id))?;
        let (tx, rx) = mpsc::channel();
        // Receiver is alive in this scope.
        let _ = tx.send(initial);
        let release = self.register(&mut registry, ListenerSink::Note(id, tx));
        Ok(Subscription::new(rx, release))
    }

    fn observe_by_owner(&self, owner_id: &str) -> RepoResult<Subscription<Vec<Note>>> {
        let mut registry = lock_registry(&self.listeners);
        let initial = self.read(|repo| repo.list_notes_by_owner(owner_id))?;
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(initial);
        let release = self.register(
            &mut registry,
            ListenerSink::Owner(owner_id.to_string(), tx),
        );
        Ok(Subscription::new(rx, release))
    }
}

fn lock_registry(listeners: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    match listeners.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
