//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate auth, store and media cache calls into note use-cases.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod note_service;
