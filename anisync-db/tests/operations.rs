use anisync_core::{Release, ReleaseDetails, ReleaseStatus, SyncState};
use anisync_db::*;

fn release(id: i64, updated_at: i64) -> Release {
    Release {
        id,
        title: format!("Release {id}"),
        status: ReleaseStatus::Ongoing,
        episode_count: 12,
        poster: Some(format!("/posters/{id}.jpg")),
        updated_at,
    }
}

#[test]
fn upsert_release_is_idempotent() {
    let conn = open_memory().unwrap();
    let r = release(1, 100);
    assert!(upsert_release(&conn, &r).unwrap());
    assert!(!upsert_release(&conn, &r).unwrap());

    let count: i32 = conn
        .query_row("SELECT COUNT(*) FROM releases", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(get_release(&conn, 1).unwrap(), Some(r));
}

#[test]
fn upsert_release_never_rolls_back() {
    let conn = open_memory().unwrap();
    let mut newer = release(1, 200);
    newer.title = "New title".to_string();
    upsert_release(&conn, &newer).unwrap();

    let older = release(1, 100);
    assert!(!upsert_release(&conn, &older).unwrap());
    assert_eq!(get_release(&conn, 1).unwrap().unwrap().title, "New title");
}

#[test]
fn upsert_release_rejects_bad_ids() {
    let conn = open_memory().unwrap();
    let err = upsert_release(&conn, &release(0, 1)).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
    let err = upsert_release(&conn, &release(-5, 1)).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn details_are_stored_alongside_release() {
    let conn = open_memory().unwrap();
    upsert_release(&conn, &release(3, 100)).unwrap();
    assert_eq!(get_release_details(&conn, 3).unwrap(), None);

    let details = ReleaseDetails {
        release: release(3, 100),
        description: Some("A long journey.".to_string()),
        genres: vec!["Fantasy".to_string(), "Adventure".to_string()],
        year: Some(2023),
    };
    store_release_details(&conn, &details, 5_000).unwrap();
    assert_eq!(get_release_details(&conn, 3).unwrap(), Some(details));
}

#[test]
fn details_for_unseen_release_insert_it() {
    let conn = open_memory().unwrap();
    let details = ReleaseDetails {
        release: release(9, 100),
        description: None,
        genres: vec![],
        year: None,
    };
    store_release_details(&conn, &details, 5_000).unwrap();
    assert_eq!(get_release(&conn, 9).unwrap(), Some(release(9, 100)));
    assert_eq!(get_release_details(&conn, 9).unwrap(), Some(details));
}

#[test]
fn record_watched_keeps_one_row_per_episode() {
    let conn = open_memory().unwrap();
    assert_eq!(record_watched(&conn, 1, 3, 10, 1_000).unwrap(), 1);
    assert_eq!(record_watched(&conn, 1, 3, 250, 2_000).unwrap(), 2);
    assert_eq!(record_watched(&conn, 1, 3, 90, 3_000).unwrap(), 3);

    let entries = history_for_release(&conn, 1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].position_secs, 90);
    assert_eq!(entries[0].watched_at, 3_000);
    assert_eq!(entries[0].sync_state, SyncState::Pending);
}

#[test]
fn record_watched_rejects_episode_zero() {
    let conn = open_memory().unwrap();
    let err = record_watched(&conn, 1, 0, 10, 1_000).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn mark_history_synced_requires_matching_revision() {
    let conn = open_memory().unwrap();
    let rev = record_watched(&conn, 1, 1, 10, 1_000).unwrap();
    // Edited after the upload snapshot was taken.
    record_watched(&conn, 1, 1, 20, 2_000).unwrap();

    assert!(!mark_history_synced(&conn, 1, 1, rev).unwrap());
    assert_eq!(pending_history(&conn).unwrap().len(), 1);

    assert!(mark_history_synced(&conn, 1, 1, rev + 1).unwrap());
    assert!(pending_history(&conn).unwrap().is_empty());
}

#[test]
fn editing_synced_history_makes_it_pending_again() {
    let conn = open_memory().unwrap();
    let rev = record_watched(&conn, 2, 1, 10, 1_000).unwrap();
    mark_history_synced(&conn, 2, 1, rev).unwrap();

    record_watched(&conn, 2, 1, 40, 2_000).unwrap();
    let entry = get_history_entry(&conn, 2, 1).unwrap().unwrap();
    assert_eq!(entry.sync_state, SyncState::Pending);
    assert_eq!(entry.position_secs, 40);
}

#[test]
fn toggle_favorite_is_a_set() {
    let conn = open_memory().unwrap();
    assert!(toggle_favorite(&conn, 5, 1_000).unwrap());
    assert!(is_favorite(&conn, 5).unwrap());
    assert_eq!(favorites(&conn).unwrap().len(), 1);

    assert!(!toggle_favorite(&conn, 5, 2_000).unwrap());
    assert!(!is_favorite(&conn, 5).unwrap());
    assert!(favorites(&conn).unwrap().is_empty());

    // The removal stays pending until acknowledged.
    let pending = pending_favorites(&conn).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].favorite);
}

#[test]
fn acknowledged_removal_deletes_row() {
    let conn = open_memory().unwrap();
    set_favorite(&conn, 8, true, 1_000).unwrap();
    let rev = set_favorite(&conn, 8, false, 2_000).unwrap();

    assert!(mark_favorite_synced(&conn, 8, rev).unwrap());
    assert!(pending_favorites(&conn).unwrap().is_empty());
    let rows: i32 = conn
        .query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn acknowledged_addition_is_kept_as_synced() {
    let conn = open_memory().unwrap();
    let rev = set_favorite(&conn, 9, true, 1_000).unwrap();
    assert!(mark_favorite_synced(&conn, 9, rev).unwrap());

    let favs = favorites(&conn).unwrap();
    assert_eq!(favs.len(), 1);
    assert_eq!(favs[0].sync_state, SyncState::Synced);
}

#[test]
fn values_round_trip() {
    let conn = open_memory().unwrap();
    assert_eq!(get_value(&conn, CURSOR_KEY).unwrap(), None);
    put_value(&conn, CURSOR_KEY, "p2").unwrap();
    put_value(&conn, CURSOR_KEY, "p3").unwrap();
    assert_eq!(get_value(&conn, CURSOR_KEY).unwrap(), Some("p3".to_string()));
    assert!(delete_value(&conn, CURSOR_KEY).unwrap());
    assert!(!delete_value(&conn, CURSOR_KEY).unwrap());
}

#[test]
fn empty_option_name_is_rejected() {
    let conn = open_memory().unwrap();
    assert!(matches!(
        put_value(&conn, "", "x").unwrap_err(),
        StoreError::Constraint(_)
    ));
}
