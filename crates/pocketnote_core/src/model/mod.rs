//! Domain model for notes, user profiles and the editing draft.
//!
//! # Responsibility
//! - Define the canonical note record persisted by the note store.
//! - Define the typed editing state used by add/edit flows.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.
//! - A note's owner never changes after creation.

pub mod draft;
pub mod note;
pub mod user;
