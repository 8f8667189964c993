//! Flutter-facing bindings for PocketNote.

pub mod api;
