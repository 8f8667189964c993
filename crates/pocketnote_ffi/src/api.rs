//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Own the process-wide core context and live watch registry.
//! - Translate core errors into response envelopes with UI-ready messages.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Functions touching disk or database are async on the Dart side; only
//!   trivial getters are `sync`.
//! - Media fields are empty strings when absent.
//! - A watch only ever delivers notes of the user who opened it; signing
//!   out or switching users closes it.

use log::{info, warn};
use pocketnote_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CoreConfig, CoreContext, DraftField, EditSession, FederatedDisabled, MediaChange,
    MediaSource, Note, NoteId, NoteServiceError, Subscription,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

const WATCH_TIMEOUT_MAX_MS: u32 = 30_000;
const NOT_CONFIGURED_MESSAGE: &str = "core is not configured; call configure first";

type SharedSubscription = Arc<Mutex<Subscription<Vec<Note>>>>;

/// Registered live watch. The registry entry stays in place while a
/// `next` call waits on it, so closing always takes effect.
struct Watch {
    owner_id: String,
    subscription: SharedSubscription,
}

static CORE: OnceLock<CoreContext> = OnceLock::new();
static WATCHES: OnceLock<Mutex<HashMap<u64, Watch>>> = OnceLock::new();
static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Opens the app-private data directory and wires the core services.
///
/// # FFI contract
/// - Async call; opens the database and applies migrations.
/// - `data_root` must be an absolute directory path.
/// - Calling again with the same root is a no-op; a different root is an error.
/// - Returns empty string on success and error message on failure.
pub fn configure(data_root: String) -> String {
    let config = match CoreConfig::new(data_root.trim()) {
        Ok(config) => config,
        Err(err) => return format!("configure failed: {err}"),
    };

    if let Some(existing) = CORE.get() {
        return if existing.config().data_root() == config.data_root() {
            String::new()
        } else {
            "configure failed: already configured with a different data_root".to_string()
        };
    }

    match CoreContext::open(config, FederatedDisabled) {
        Ok(context) => {
            if CORE.set(context).is_err() {
                warn!("event=ffi_configure module=ffi status=skipped reason=concurrent_configure");
            }
            String::new()
        }
        Err(err) => format!("configure failed: {err}"),
    }
}

/// Outcome of an auth flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Whether the flow succeeded.
    pub ok: bool,
    /// Signed-in user id on success.
    pub user_id: Option<String>,
    /// Canned alert message on failure, empty on success.
    pub message: String,
}

/// Login alert state for the login screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAlertView {
    pub visible: bool,
    pub message: String,
}

/// Note projection consumed by list and edit screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub note_id: String,
    pub title: String,
    pub body: String,
    /// Local image path, empty when none.
    pub image_path: String,
    /// Local audio path, empty when none.
    pub audio_path: String,
    pub reminder: String,
    pub created_at_ms: i64,
    /// Creation time as `dd/MM/yyyy HH:mm:ss`.
    pub created_at_display: String,
}

/// Generic note mutation envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteActionResponse {
    pub ok: bool,
    /// Affected note id on success.
    pub note_id: Option<String>,
    /// Media files removed from disk by a delete.
    pub removed_files: u32,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl NoteActionResponse {
    fn success(message: impl Into<String>, note_id: NoteId, removed_files: u32) -> Self {
        Self {
            ok: true,
            note_id: Some(note_id.to_string()),
            removed_files,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            note_id: None,
            removed_files: 0,
            message: message.into(),
        }
    }
}

/// Single note read envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteGetResponse {
    pub ok: bool,
    pub note: Option<NoteItem>,
    pub message: String,
}

/// Envelope returned when opening a live watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesWatchResponse {
    pub ok: bool,
    pub watch_id: Option<u64>,
    pub message: String,
}

/// Next snapshot of a live note list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSnapshotResponse {
    pub ok: bool,
    /// `false` when no new snapshot arrived within the timeout.
    pub changed: bool,
    /// Full newest-first list when `changed`.
    pub items: Vec<NoteItem>,
    pub message: String,
}

/// Signs in with email and password.
///
/// # FFI contract
/// - Async call; verifies the password hash.
/// - On failure the login alert becomes visible with the bad-credentials message.
pub fn auth_sign_in_password(email: String, password: String) -> AuthResponse {
    with_core_auth(|core| sign_in_password_in(core, &email, &password))
}

/// Creates an account and signs in.
///
/// # FFI contract
/// - Async call; hashes the password and provisions the user profile.
pub fn auth_sign_up(email: String, password: String, display_name: String) -> AuthResponse {
    with_core_auth(|core| sign_up_in(core, &email, &password, &display_name))
}

/// Signs in with a federated identity token.
///
/// # FFI contract
/// - Async call.
/// - Without a configured federated verifier every token is rejected.
pub fn auth_sign_in_federated(token: String) -> AuthResponse {
    with_core_auth(|core| auth_response(core, core.auth().sign_in_with_federated_token(&token)))
}

/// Signs out and clears the persisted session.
///
/// # FFI contract
/// - Async call. Returns empty string on success and error message on failure.
pub fn auth_sign_out() -> String {
    match CORE.get() {
        Some(core) => sign_out_in(core),
        None => NOT_CONFIGURED_MESSAGE.to_string(),
    }
}

/// Current signed-in user id, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_current_user() -> Option<String> {
    CORE.get().and_then(|core| core.auth().current_user_id())
}

/// Current login alert.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_alert() -> AuthAlertView {
    match CORE.get() {
        Some(core) => alert_view(core),
        None => AuthAlertView {
            visible: false,
            message: String::new(),
        },
    }
}

/// Hides the login alert.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_dismiss_alert() {
    if let Some(core) = CORE.get() {
        core.auth().dismiss_alert();
    }
}

/// Creates a note for the signed-in user.
///
/// Input semantics:
/// - `image_bytes` (a camera capture) wins over `image_uri` (a gallery pick).
/// - `audio_path` is the recorder output file; empty or `None` means no audio.
///
/// # FFI contract
/// - Async call; copies media into the app-private cache.
/// - Never panics.
pub fn note_create(
    title: String,
    body: String,
    reminder: String,
    image_uri: Option<String>,
    image_bytes: Option<Vec<u8>>,
    audio_path: Option<String>,
) -> NoteActionResponse {
    with_core_action(|core| {
        let mut session = core.notes().begin_new();
        fill_fields(&mut session, title, body, reminder);
        session.set_image(image_change(image_uri, image_bytes));
        session.set_audio(MediaChange::from_reference(audio_path.as_deref()));
        save_in(core, &mut session, "Note created.")
    })
}

/// Updates a note of the signed-in user.
///
/// Input semantics:
/// - Image: `image_bytes` attaches a new capture; otherwise `image_uri`
///   attaches a pick, or keeps the current image when it is the stored path;
///   neither means the image was removed.
/// - Audio: the stored path keeps the clip, another path replaces it, empty
///   or `None` removes it.
///
/// # FFI contract
/// - Async call; replaced or removed media files are deleted.
/// - Never panics.
pub fn note_update(
    note_id: String,
    title: String,
    body: String,
    reminder: String,
    image_uri: Option<String>,
    image_bytes: Option<Vec<u8>>,
    audio_path: Option<String>,
) -> NoteActionResponse {
    with_core_action(|core| {
        let id = parse_note_id(&note_id)?;
        let mut session = core.notes().begin_edit(id).map_err(service_message)?;
        fill_fields(&mut session, title, body, reminder);
        session.set_image(image_change(image_uri, image_bytes));
        session.set_audio(MediaChange::from_reference(audio_path.as_deref()));
        save_in(core, &mut session, "Note updated.")
    })
}

/// Reads one note of the signed-in user.
///
/// # FFI contract
/// - Async call. Never panics.
pub fn note_get(note_id: String) -> NoteGetResponse {
    let Some(core) = CORE.get() else {
        return NoteGetResponse {
            ok: false,
            note: None,
            message: NOT_CONFIGURED_MESSAGE.to_string(),
        };
    };
    get_in(core, &note_id)
}

/// Deletes a note and its cached media.
///
/// # FFI contract
/// - Async call. Never panics.
/// - `removed_files` counts media files actually deleted from disk.
pub fn note_delete(note_id: String) -> NoteActionResponse {
    with_core_action(|core| delete_in(core, &note_id))
}

/// Opens a live watch over the signed-in user's notes.
///
/// The first [`notes_watch_next`] call returns the current list.
///
/// # FFI contract
/// - Async call. Close the watch with [`notes_watch_close`].
pub fn notes_watch_open() -> NotesWatchResponse {
    match CORE.get() {
        Some(core) => open_watch_in(core),
        None => watch_failure(NOT_CONFIGURED_MESSAGE),
    }
}

/// Waits up to `timeout_ms` for the next snapshot of a watch.
///
/// # FFI contract
/// - Async call; blocks a bridge worker for at most `timeout_ms` (capped at 30s).
/// - Queued snapshots are coalesced into the newest one.
pub fn notes_watch_next(watch_id: u64, timeout_ms: u32) -> NotesSnapshotResponse {
    next_snapshot(watch_id, Duration::from_millis(timeout_ms.min(WATCH_TIMEOUT_MAX_MS).into()))
}

/// Releases a watch. Returns `false` for unknown ids.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_watch_close(watch_id: u64) -> bool {
    let closed = watches().remove(&watch_id).is_some();
    if closed {
        info!("event=notes_watch_close module=ffi status=ok watch_id={watch_id}");
    }
    closed
}

fn with_core_auth(f: impl FnOnce(&CoreContext) -> AuthResponse) -> AuthResponse {
    match CORE.get() {
        Some(core) => {
            let previous = core.auth().current_user_id();
            let response = f(core);
            if let Some(previous) = previous {
                if response.ok && response.user_id.as_deref() != Some(previous.as_str()) {
                    close_watches_of(&previous);
                }
            }
            response
        }
        None => AuthResponse {
            ok: false,
            user_id: None,
            message: NOT_CONFIGURED_MESSAGE.to_string(),
        },
    }
}

fn with_core_action(
    f: impl FnOnce(&CoreContext) -> Result<NoteActionResponse, String>,
) -> NoteActionResponse {
    match CORE.get() {
        Some(core) => f(core).unwrap_or_else(NoteActionResponse::failure),
        None => NoteActionResponse::failure(NOT_CONFIGURED_MESSAGE),
    }
}

fn sign_out_in(core: &CoreContext) -> String {
    let previous = core.auth().current_user_id();
    match core.auth().sign_out() {
        Ok(()) => {
            if let Some(previous) = previous {
                close_watches_of(&previous);
            }
            String::new()
        }
        Err(err) => format!("auth_sign_out failed: {err}"),
    }
}

fn sign_in_password_in(core: &CoreContext, email: &str, password: &str) -> AuthResponse {
    auth_response(core, core.auth().sign_in_with_password(email.trim(), password))
}

fn sign_up_in(core: &CoreContext, email: &str, password: &str, display_name: &str) -> AuthResponse {
    auth_response(
        core,
        core.auth()
            .sign_up_with_password(email.trim(), password, display_name.trim()),
    )
}

fn auth_response<E>(core: &CoreContext, result: Result<String, E>) -> AuthResponse {
    match result {
        Ok(user_id) => AuthResponse {
            ok: true,
            user_id: Some(user_id),
            message: String::new(),
        },
        Err(_) => AuthResponse {
            ok: false,
            user_id: None,
            message: alert_view(core).message,
        },
    }
}

fn alert_view(core: &CoreContext) -> AuthAlertView {
    let alert = core.auth().alert();
    AuthAlertView {
        visible: alert.visible,
        message: if alert.visible {
            alert.message().to_string()
        } else {
            String::new()
        },
    }
}

fn fill_fields(session: &mut EditSession, title: String, body: String, reminder: String) {
    session.set_field(DraftField::Title, title);
    session.set_field(DraftField::Body, body);
    session.set_field(DraftField::Reminder, reminder);
}

fn image_change(image_uri: Option<String>, image_bytes: Option<Vec<u8>>) -> MediaChange {
    match image_bytes {
        Some(bytes) if !bytes.is_empty() => MediaChange::Attach(MediaSource::Bytes(bytes)),
        _ => MediaChange::from_reference(image_uri.as_deref()),
    }
}

fn save_in(
    core: &CoreContext,
    session: &mut EditSession,
    message: &str,
) -> Result<NoteActionResponse, String> {
    let note = core.notes().save(session).map_err(service_message)?;
    Ok(NoteActionResponse::success(message, note.id, 0))
}

fn get_in(core: &CoreContext, note_id: &str) -> NoteGetResponse {
    let result = parse_note_id(note_id)
        .and_then(|id| core.notes().get_note(id).map_err(service_message));
    match result {
        Ok(note) => NoteGetResponse {
            ok: true,
            note: Some(to_note_item(note)),
            message: String::new(),
        },
        Err(message) => NoteGetResponse {
            ok: false,
            note: None,
            message,
        },
    }
}

fn delete_in(core: &CoreContext, note_id: &str) -> Result<NoteActionResponse, String> {
    let id = parse_note_id(note_id)?;
    let report = core.notes().delete(id).map_err(service_message)?;
    let removed = u32::try_from(report.removed_files).unwrap_or(u32::MAX);
    Ok(NoteActionResponse::success("Note deleted.", id, removed))
}

fn parse_note_id(raw: &str) -> Result<NoteId, String> {
    NoteId::parse_str(raw.trim()).map_err(|_| format!("invalid note id `{}`", raw.trim()))
}

fn service_message(err: NoteServiceError) -> String {
    match err {
        NoteServiceError::NotSignedIn => "Sign in to manage notes.".to_string(),
        NoteServiceError::NotOwner(_) | NoteServiceError::NoteNotFound(_) => {
            "Note not found.".to_string()
        }
        other => other.to_string(),
    }
}

fn to_note_item(note: Note) -> NoteItem {
    let created_at_display = note.created_at_display();
    NoteItem {
        note_id: note.id.to_string(),
        title: note.title,
        body: note.body,
        image_path: note.image_path.unwrap_or_default(),
        audio_path: note.audio_path.unwrap_or_default(),
        reminder: note.reminder,
        created_at_ms: note.created_at,
        created_at_display,
    }
}

fn watches() -> MutexGuard<'static, HashMap<u64, Watch>> {
    WATCHES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_watch_in(core: &CoreContext) -> NotesWatchResponse {
    let Some(owner_id) = core.auth().current_user_id() else {
        return watch_failure("notes_watch_open failed: Sign in to manage notes.");
    };
    match core.notes().observe_my_notes() {
        Ok(subscription) => NotesWatchResponse {
            ok: true,
            watch_id: Some(register_watch(owner_id, subscription)),
            message: String::new(),
        },
        Err(err) => watch_failure(format!("notes_watch_open failed: {}", service_message(err))),
    }
}

fn register_watch(owner_id: String, subscription: Subscription<Vec<Note>>) -> u64 {
    let watch_id = NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed);
    watches().insert(
        watch_id,
        Watch {
            owner_id,
            subscription: Arc::new(Mutex::new(subscription)),
        },
    );
    info!("event=notes_watch_open module=ffi status=ok watch_id={watch_id}");
    watch_id
}

fn close_watches_of(owner_id: &str) {
    let mut registry = watches();
    let before = registry.len();
    registry.retain(|_, watch| watch.owner_id != owner_id);
    let closed = before - registry.len();
    if closed > 0 {
        info!("event=notes_watch_close module=ffi status=ok reason=user_changed closed={closed}");
    }
}

fn next_snapshot(watch_id: u64, timeout: Duration) -> NotesSnapshotResponse {
    // Registry lock is released before waiting.
    let subscription = match watches().get(&watch_id) {
        Some(watch) => Arc::clone(&watch.subscription),
        None => {
            return NotesSnapshotResponse {
                ok: false,
                changed: false,
                items: Vec::new(),
                message: format!("unknown watch id {watch_id}"),
            };
        }
    };

    let received = {
        let subscription = subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscription
            .recv_timeout(timeout)
            .map(|first| subscription.latest().unwrap_or(first))
    };

    match received {
        Some(notes) => NotesSnapshotResponse {
            ok: true,
            changed: true,
            items: notes.into_iter().map(to_note_item).collect(),
            message: String::new(),
        },
        None => NotesSnapshotResponse {
            ok: true,
            changed: false,
            items: Vec::new(),
            message: String::new(),
        },
    }
}

fn watch_failure(message: impl Into<String>) -> NotesWatchResponse {
    NotesWatchResponse {
        ok: false,
        watch_id: None,
        message: message.into(),
    }
}
