use pocketnote_core::{Database, NewNote, NoteStore, RepoError, SqliteNoteStore};
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(500);

fn note_at(owner: &str, title: &str, created_at: i64) -> NewNote {
    let mut note = NewNote::new(owner, title, "body", "");
    note.created_at = created_at;
    note
}

fn store() -> SqliteNoteStore {
    SqliteNoteStore::new(Database::open_in_memory().unwrap())
}

#[test]
fn owner_list_orders_newest_first_and_contains_each_note_once() {
    let store = store();
    let older = store.create(&note_at("u1", "older", 1_000)).unwrap();
    let newer = store.create(&note_at("u1", "newer", 9_000)).unwrap();
    let middle = store.create(&note_at("u1", "middle", 5_000)).unwrap();
    store.create(&note_at("u2", "foreign", 7_000)).unwrap();

    let ids: Vec<_> = store
        .list_by_owner("u1")
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(ids, vec![newer, middle, older]);
}

#[test]
fn timestamps_sort_numerically_not_lexicographically() {
    let store = store();
    let nine = store.create(&note_at("u1", "9", 9)).unwrap();
    let ten = store.create(&note_at("u1", "10", 10)).unwrap();

    let ids: Vec<_> = store
        .list_by_owner("u1")
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(ids, vec![ten, nine]);
}

#[test]
fn observe_by_owner_pushes_initial_and_refreshed_snapshots() {
    let store = store();
    let first = store.create(&note_at("u1", "first", 1_000)).unwrap();

    let subscription = store.observe_by_owner("u1").unwrap();
    let initial = subscription.recv_timeout(WAIT).unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].id, first);

    let second = store.create(&note_at("u1", "second", 2_000)).unwrap();
    let refreshed = subscription.recv_timeout(WAIT).unwrap();
    let ids: Vec<_> = refreshed.iter().map(|note| note.id).collect();
    assert_eq!(ids, vec![second, first]);

    store.create(&note_at("u2", "other owner", 3_000)).unwrap();
    assert!(subscription.try_recv().is_none());

    store.delete(first).unwrap();
    let after_delete = subscription.recv_timeout(WAIT).unwrap();
    assert_eq!(after_delete.len(), 1);
    assert_eq!(after_delete[0].id, second);
}

#[test]
fn observe_by_id_sees_changes_from_another_handle_and_deletion() {
    let store = store();
    let other_handle = store.clone();
    let id = store.create(&note_at("u1", "draft", 1_000)).unwrap();

    let subscription = store.observe_by_id(id).unwrap();
    let initial = subscription.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(initial.title, "draft");

    let mut changed = initial.clone();
    changed.title = "edited elsewhere".to_string();
    other_handle.update(id, &changed).unwrap();
    let pushed = subscription.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(pushed.title, "edited elsewhere");

    other_handle.delete(id).unwrap();
    assert_eq!(subscription.recv_timeout(WAIT), Some(None));
}

#[test]
fn dropping_subscription_releases_listener() {
    let store = store();
    let first = store.observe_by_owner("u1").unwrap();
    let second = store.observe_by_owner("u1").unwrap();
    assert_eq!(store.listener_count(), 2);

    drop(first);
    assert_eq!(store.listener_count(), 1);
    drop(second);
    assert_eq!(store.listener_count(), 0);

    store.create(&note_at("u1", "after teardown", 1)).unwrap();
}

#[test]
fn update_and_delete_of_missing_note_report_not_found() {
    let store = store();
    let id = store.create(&note_at("u1", "gone", 1)).unwrap();
    let note = store.get(id).unwrap().unwrap();
    store.delete(id).unwrap();

    assert!(matches!(store.update(id, &note), Err(RepoError::NotFound(_))));
    assert!(matches!(store.delete(id), Err(RepoError::NotFound(_))));
}
