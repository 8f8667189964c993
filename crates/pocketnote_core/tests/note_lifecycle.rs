mod common;

use common::{files_in, fixture, sign_up};
use pocketnote_core::{
    DraftField, MediaChange, MediaKind, MediaSource, NoteServiceError, NoteStore,
};
use std::path::Path;
use std::time::Duration;

#[test]
fn text_only_note_round_trip_touches_no_files() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();

    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "A");
    session.set_field(DraftField::Body, "B");
    session.set_field(DraftField::Reminder, "01/01/2030");
    let saved = notes.save(&mut session).unwrap();

    let stored = notes.store().list_by_owner(&owner).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "A");
    assert_eq!(stored[0].body, "B");
    assert_eq!(stored[0].reminder, "01/01/2030");
    assert_eq!(stored[0].image_path, None);
    assert_eq!(stored[0].audio_path, None);
    assert!(session.is_existing());
    assert!(!session.is_dirty());

    let report = notes.delete(saved.id).unwrap();
    assert_eq!(report.removed_files, 0);
    assert!(notes.store().list_by_owner(&owner).unwrap().is_empty());
    assert!(!fx.media_root().join(&owner).exists());
}

#[test]
fn new_note_copies_image_and_audio_into_owner_dirs() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let audio_source = fx.source_file("clip.m4a", b"audio-bytes");

    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "with media");
    session.set_image(MediaChange::Attach(MediaSource::Bytes(b"jpeg".to_vec())));
    session.set_audio(MediaChange::Attach(MediaSource::path(&audio_source)));
    let saved = notes.save(&mut session).unwrap();

    let image = saved.image_path.clone().unwrap();
    let audio = saved.audio_path.clone().unwrap();
    let image_dir = fx.media_root().join(&owner).join("images");
    let audio_dir = fx.media_root().join(&owner).join("audios");
    assert_eq!(Path::new(&image).parent().unwrap(), image_dir);
    assert_eq!(Path::new(&audio).parent().unwrap(), audio_dir);
    assert!(image.ends_with(".jpg"));
    assert!(audio.ends_with(".m4a"));
    assert_eq!(std::fs::read(&audio).unwrap(), b"audio-bytes");
    assert!(audio_source.exists(), "source must be copied, not moved");

    let report = notes.delete(saved.id).unwrap();
    assert_eq!(report.removed_files, 2);
    assert!(files_in(&image_dir).is_empty());
    assert!(files_in(&audio_dir).is_empty());
    assert!(notes.store().get(saved.id).unwrap().is_none());
}

#[test]
fn replacing_image_deletes_exactly_the_previous_file() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let first_source = fx.source_file("first.jpg", b"first");
    let second_source = fx.source_file("second.jpg", b"second");

    let mut session = notes.begin_new();
    session.set_image(MediaChange::Attach(MediaSource::path(&first_source)));
    let created = notes.save(&mut session).unwrap();
    let previous = created.image_path.clone().unwrap();

    let mut edit = notes.begin_edit(created.id).unwrap();
    edit.set_image(MediaChange::Attach(MediaSource::path(&second_source)));
    let updated = notes.save(&mut edit).unwrap();
    let current = updated.image_path.clone().unwrap();

    let image_dir = fx
        .ctx
        .notes()
        .media()
        .kind_dir(&owner, MediaKind::Image)
        .unwrap();
    assert_ne!(previous, current);
    assert!(!Path::new(&previous).exists());
    assert_eq!(files_in(&image_dir), vec![Path::new(&current).to_path_buf()]);
    assert_eq!(std::fs::read(&current).unwrap(), b"second");
}

#[test]
fn reattaching_the_stored_path_reuses_it_without_copy() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let source = fx.source_file("rec.3gp", b"rec");

    let mut session = notes.begin_new();
    session.set_audio(MediaChange::Attach(MediaSource::path(&source)));
    let created = notes.save(&mut session).unwrap();
    let stored = created.audio_path.clone().unwrap();

    let mut edit = notes.begin_edit(created.id).unwrap();
    edit.set_field(DraftField::Title, "renamed");
    edit.set_audio(MediaChange::from_reference(Some(&stored)));
    let updated = notes.save(&mut edit).unwrap();

    assert_eq!(updated.audio_path.as_deref(), Some(stored.as_str()));
    assert_eq!(updated.title, "renamed");
    let audio_dir = fx.media_root().join(&owner).join("audios");
    assert_eq!(files_in(&audio_dir).len(), 1);
}

#[test]
fn removing_media_deletes_file_and_clears_field() {
    let fx = fixture();
    sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();

    let mut session = notes.begin_new();
    session.set_image(MediaChange::Attach(MediaSource::Bytes(vec![0xFF, 0xD8])));
    let created = notes.save(&mut session).unwrap();
    let image = created.image_path.clone().unwrap();

    let mut edit = notes.begin_edit(created.id).unwrap();
    edit.set_image(MediaChange::Remove);
    let updated = notes.save(&mut edit).unwrap();

    assert_eq!(updated.image_path, None);
    assert!(!Path::new(&image).exists());
    assert_eq!(notes.delete(created.id).unwrap().removed_files, 0);
}

#[test]
fn edit_keeps_creation_time_and_other_fields() {
    let fx = fixture();
    sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();

    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "t");
    session.set_field(DraftField::Body, "b");
    let created = notes.save(&mut session).unwrap();

    let mut edit = notes.begin_edit(created.id).unwrap();
    edit.set_field_by_name("reminder", "02/02/2031").unwrap();
    assert!(edit.set_field_by_name("imageUrl", "x").is_err());
    let updated = notes.save(&mut edit).unwrap();

    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.title, "t");
    assert_eq!(updated.body, "b");
    assert_eq!(updated.reminder, "02/02/2031");
}

#[test]
fn missing_source_fails_save_without_leaving_files() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let missing = fx.dir.path().join("does-not-exist.3gp");

    let mut session = notes.begin_new();
    session.set_image(MediaChange::Attach(MediaSource::Bytes(b"img".to_vec())));
    session.set_audio(MediaChange::Attach(MediaSource::path(&missing)));
    let err = notes.save(&mut session).unwrap_err();

    assert!(matches!(err, NoteServiceError::Media(_)));
    assert!(!session.is_existing());
    assert!(files_in(&fx.media_root().join(&owner).join("images")).is_empty());
    assert!(notes.store().list_by_owner(&owner).unwrap().is_empty());
}

#[test]
fn notes_are_scoped_to_the_signed_in_user() {
    let fx = fixture();
    let notes = fx.ctx.notes();
    let auth = fx.ctx.auth();

    assert!(matches!(
        notes.save(&mut notes.begin_new()),
        Err(NoteServiceError::NotSignedIn)
    ));

    sign_up(&fx, "ana@example.com");
    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "private");
    let ana_note = notes.save(&mut session).unwrap();

    auth.sign_out().unwrap();
    sign_up(&fx, "bob@example.com");
    assert!(matches!(
        notes.get_note(ana_note.id),
        Err(NoteServiceError::NotOwner(_))
    ));
    assert!(matches!(
        notes.delete(ana_note.id),
        Err(NoteServiceError::NotOwner(_))
    ));
    assert!(notes.observe_my_notes().unwrap().recv().unwrap().is_empty());
}

#[test]
fn home_list_refreshes_after_save_and_delete() {
    let fx = fixture();
    sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let wait = Duration::from_millis(500);

    let home = notes.observe_my_notes().unwrap();
    assert!(home.recv_timeout(wait).unwrap().is_empty());

    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "first");
    let saved = notes.save(&mut session).unwrap();
    let listed = home.recv_timeout(wait).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.id);

    notes.delete(saved.id).unwrap();
    assert!(home.recv_timeout(wait).unwrap().is_empty());
}

#[test]
fn edit_screen_snapshot_respects_local_draft() {
    let fx = fixture();
    sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let wait = Duration::from_millis(500);

    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "shared");
    let created = notes.save(&mut session).unwrap();

    let mut screen = notes.begin_edit(created.id).unwrap();
    let detail = notes.observe_note(created.id).unwrap();
    screen.apply_snapshot(detail.recv_timeout(wait).unwrap());
    screen.set_field(DraftField::Body, "typing...");

    let mut other_device = notes.begin_edit(created.id).unwrap();
    other_device.set_field(DraftField::Title, "changed remotely");
    notes.save(&mut other_device).unwrap();

    screen.apply_snapshot(detail.recv_timeout(wait).unwrap());
    assert_eq!(screen.draft().body, "typing...");
    assert_eq!(screen.draft().title, "shared");
    assert_eq!(screen.committed().unwrap().title, "changed remotely");
}

#[test]
fn failed_edit_keeps_stored_media_and_discards_new_copies() {
    let fx = fixture();
    let owner = sign_up(&fx, "ana@example.com");
    let notes = fx.ctx.notes();
    let first_image = fx.source_file("first.jpg", b"first");
    let first_audio = fx.source_file("first.3gp", b"voice");
    let next_image = fx.source_file("next.jpg", b"next");
    let missing_audio = fx.dir.path().join("missing.3gp");

    let mut session = notes.begin_new();
    session.set_image(MediaChange::Attach(MediaSource::path(&first_image)));
    session.set_audio(MediaChange::Attach(MediaSource::path(&first_audio)));
    let created = notes.save(&mut session).unwrap();
    let old_image = created.image_path.clone().unwrap();
    let old_audio = created.audio_path.clone().unwrap();
    let image_dir = fx.media_root().join(&owner).join("images");

    let mut edit = notes.begin_edit(created.id).unwrap();
    edit.set_image(MediaChange::Attach(MediaSource::path(&next_image)));
    edit.set_audio(MediaChange::Attach(MediaSource::path(&missing_audio)));
    assert!(matches!(
        notes.save(&mut edit),
        Err(NoteServiceError::Media(_))
    ));

    let stored = notes.get_note(created.id).unwrap();
    assert_eq!(stored.image_path.as_deref(), Some(old_image.as_str()));
    assert_eq!(stored.audio_path.as_deref(), Some(old_audio.as_str()));
    assert!(Path::new(&old_image).exists());
    assert!(Path::new(&old_audio).exists());
    assert_eq!(files_in(&image_dir), vec![Path::new(&old_image).to_path_buf()]);

    edit.set_audio(MediaChange::Keep);
    let retried = notes.save(&mut edit).unwrap();
    let new_image = retried.image_path.clone().unwrap();
    assert!(!Path::new(&old_image).exists());
    assert_eq!(files_in(&image_dir), vec![Path::new(&new_image).to_path_buf()]);
    assert_eq!(retried.audio_path.as_deref(), Some(old_audio.as_str()));
}
