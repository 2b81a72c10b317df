//! Classification of fetched releases against the stored copies.

use std::collections::HashMap;

use anisync_core::{Release, ReleaseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Insert,
    Update,
    Unchanged,
}

/// A fetched page split by change kind.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedPage {
    /// Releases to write, in page order.
    pub changed: Vec<Release>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ClassifiedPage {
    pub fn is_all_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Compare one release with its stored `updated_at`, if any.
pub fn classify(release: &Release, stored_updated_at: Option<i64>) -> Change {
    match stored_updated_at {
        None => Change::Insert,
        Some(ts) if release.updated_at > ts => Change::Update,
        Some(_) => Change::Unchanged,
    }
}

/// Classify a page. `stored` maps release id to stored `updated_at`.
///
/// A release repeated within the page is classified against the copy
/// earlier in the same page.
pub fn classify_page(releases: Vec<Release>, stored: &HashMap<ReleaseId, i64>) -> ClassifiedPage {
    let mut seen: HashMap<ReleaseId, i64> = HashMap::new();
    let mut page = ClassifiedPage::default();
    for release in releases {
        let known = seen.get(&release.id).or_else(|| stored.get(&release.id)).copied();
        match classify(&release, known) {
            Change::Insert => page.inserted += 1,
            Change::Update => page.updated += 1,
            Change::Unchanged => {
                page.unchanged += 1;
                continue;
            }
        }
        seen.insert(release.id, release.updated_at);
        page.changed.push(release);
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use anisync_core::ReleaseStatus;

    fn release(id: ReleaseId, updated_at: i64) -> Release {
        Release {
            id,
            title: format!("Release {id}"),
            status: ReleaseStatus::Ongoing,
            episode_count: 12,
            poster: None,
            updated_at,
        }
    }

    #[test]
    fn absent_release_is_insert() {
        assert_eq!(classify(&release(1, 10), None), Change::Insert);
    }

    #[test]
    fn newer_timestamp_is_update_equal_or_older_unchanged() {
        assert_eq!(classify(&release(1, 11), Some(10)), Change::Update);
        assert_eq!(classify(&release(1, 10), Some(10)), Change::Unchanged);
        assert_eq!(classify(&release(1, 9), Some(10)), Change::Unchanged);
    }

    #[test]
    fn classify_page_counts_and_keeps_order() {
        let stored: HashMap<ReleaseId, i64> = [(2, 5), (3, 50)].into();
        let page = classify_page(vec![release(1, 1), release(2, 6), release(3, 40)], &stored);
        assert_eq!((page.inserted, page.updated, page.unchanged), (1, 1, 1));
        let ids: Vec<ReleaseId> = page.changed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn duplicate_in_page_uses_earlier_copy() {
        let page = classify_page(vec![release(7, 3), release(7, 3)], &HashMap::new());
        assert_eq!((page.inserted, page.unchanged), (1, 1));
        assert_eq!(page.changed.len(), 1);
    }

    #[test]
    fn all_unchanged_page_detected() {
        let stored: HashMap<ReleaseId, i64> = [(1, 10)].into();
        assert!(classify_page(vec![release(1, 10)], &stored).is_all_unchanged());
        assert!(!classify_page(vec![release(2, 10)], &stored).is_all_unchanged());
    }
}
