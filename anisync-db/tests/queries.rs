use anisync_core::{Release, ReleaseStatus, ViewMode};
use anisync_db::*;

fn release(id: i64, updated_at: i64) -> Release {
    Release {
        id,
        title: format!("Release {id}"),
        status: ReleaseStatus::Finished,
        episode_count: 24,
        poster: None,
        updated_at,
    }
}

fn seeded() -> rusqlite::Connection {
    let conn = open_memory().unwrap();
    for (id, ts) in [(1, 300), (2, 100), (3, 200), (4, 200), (5, 500)] {
        upsert_release(&conn, &release(id, ts)).unwrap();
    }
    conn
}

#[test]
fn range_scan_is_ordered_by_timestamp_then_id() {
    let conn = seeded();
    let ids: Vec<i64> = releases_updated_since(&conn, 100, 10)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![3, 4, 1, 5]);

    let ids: Vec<i64> = releases_updated_since(&conn, 0, 2)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn recently_updated_is_newest_first() {
    let conn = seeded();
    let ids: Vec<i64> = recently_updated(&conn, 3)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![5, 1, 4]);
}

#[test]
fn timestamps_only_cover_known_ids() {
    let conn = seeded();
    let ts = release_timestamps(&conn, &[1, 2, 99]).unwrap();
    assert_eq!(ts.len(), 2);
    assert_eq!(ts[&1], 300);
    assert_eq!(ts[&2], 100);
}

#[test]
fn watched_view_orders_by_last_watch() {
    let conn = seeded();
    record_watched(&conn, 2, 1, 60, 1_000).unwrap();
    record_watched(&conn, 3, 1, 60, 3_000).unwrap();
    record_watched(&conn, 2, 2, 60, 2_000).unwrap();
    // History for a release that was never synced is not listed.
    record_watched(&conn, 42, 1, 60, 9_000).unwrap();

    let ids: Vec<i64> = releases_for_view(&conn, ViewMode::WatchedReleaseCard, 10)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![3, 2]);

    let catalog = releases_for_view(&conn, ViewMode::ReleaseCard, 10).unwrap();
    assert_eq!(catalog.len(), 5);
}

#[test]
fn favorite_releases_join_catalog() {
    let conn = seeded();
    set_favorite(&conn, 1, true, 1_000).unwrap();
    set_favorite(&conn, 5, true, 2_000).unwrap();
    set_favorite(&conn, 3, false, 3_000).unwrap();

    let ids: Vec<i64> = favorite_releases(&conn).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![5, 1]);
}

#[test]
fn stats_count_pending_rows() {
    let conn = seeded();
    record_watched(&conn, 1, 1, 10, 1_000).unwrap();
    let rev = record_watched(&conn, 1, 2, 10, 1_000).unwrap();
    mark_history_synced(&conn, 1, 2, rev).unwrap();
    set_favorite(&conn, 1, true, 1_000).unwrap();

    let stats = store_stats(&conn).unwrap();
    assert_eq!(
        stats,
        StoreStats {
            releases: 5,
            history: 2,
            pending_history: 1,
            favorites: 1,
            pending_favorites: 1,
        }
    );
}

#[test]
fn corrupt_status_surfaces_as_model_error() {
    let conn = seeded();
    conn.execute("UPDATE releases SET status = 'lost' WHERE id = 1", [])
        .unwrap();
    assert!(matches!(
        get_release(&conn, 1).unwrap_err(),
        StoreError::Model(_)
    ));
}
