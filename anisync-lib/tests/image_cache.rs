mod common;

use std::sync::Arc;
use std::time::Duration;

use anisync_lib::{FetchError, ImageCache, ImageCacheConfig};

use common::FakeMedia;

const URL_A: &str = "https://static.wwnd.space/posters/a.jpg";
const URL_B: &str = "https://static.wwnd.space/posters/b.jpg";
const URL_C: &str = "https://static.wwnd.space/posters/c.jpg";
const URL_D: &str = "https://static.wwnd.space/posters/d.jpg";

fn open(dir: &std::path::Path, budget: u64, media: &Arc<FakeMedia>) -> ImageCache {
    ImageCache::open(ImageCacheConfig::new(dir, budget), media.clone()).unwrap()
}

#[tokio::test]
async fn miss_fetches_then_hit_serves_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let cache = open(dir.path(), 1_000, &media);

    let first = cache.get_or_fetch(URL_A).await.unwrap();
    let second = cache.get_or_fetch(URL_A).await.unwrap();

    assert_eq!(first.len(), 100);
    assert_eq!(first, second);
    assert_eq!(media.fetches(), 1);
    assert!(cache.contains(URL_A));
    let stats = cache.stats();
    assert_eq!((stats.entries, stats.total_bytes, stats.fetches), (1, 100, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia::with_delay(100, Some(Duration::from_millis(50))));
    let cache = open(dir.path(), 10_000, &media);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_fetch(URL_A).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().len(), 100);
    }

    assert_eq!(media.fetches(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn instant_downloads_are_still_shared() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(10);
    let cache = open(dir.path(), 1_000_000, &media);

    for round in 0..200 {
        let url = format!("https://static.wwnd.space/posters/round-{round}.jpg");
        let before = media.fetches();
        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let cache = cache.clone();
                let url = url.clone();
                tokio::spawn(async move { cache.get_or_fetch(&url).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 10);
        }
        assert_eq!(media.fetches() - before, 1, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn eviction_never_deletes_a_refetched_blob() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let cache = open(dir.path(), 100, &media);
    let urls = [URL_A, URL_B, URL_C];

    for _ in 0..100 {
        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_fetch(urls[i % urls.len()]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for url in urls {
            if cache.contains(url) {
                let blob = dir
                    .path()
                    .join(format!("{}.bin", anisync_lib::image_cache::cache_key(url)));
                assert!(blob.exists(), "indexed blob for {url} is missing");
            }
        }
        assert!(cache.stats().total_bytes <= 100);
    }
}

#[tokio::test]
async fn failure_reaches_every_waiter_and_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia::with_delay(100, Some(Duration::from_millis(20))));
    media.fail(URL_A);
    let cache = open(dir.path(), 10_000, &media);

    let (a, b) = tokio::join!(cache.get_or_fetch(URL_A), cache.get_or_fetch(URL_A));
    assert!(matches!(a, Err(FetchError::Remote(_))));
    assert!(matches!(b, Err(FetchError::Remote(_))));
    assert_eq!(media.fetches(), 1);
    assert!(!cache.contains(URL_A));

    media.heal(URL_A);
    cache.get_or_fetch(URL_A).await.unwrap();
    assert_eq!(media.fetches(), 2);
}

#[tokio::test]
async fn eviction_keeps_most_recently_accessed() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let cache = open(dir.path(), 300, &media);

    for url in [URL_A, URL_B, URL_C] {
        cache.get_or_fetch(url).await.unwrap();
    }
    cache.get_or_fetch(URL_A).await.unwrap();
    cache.get_or_fetch(URL_D).await.unwrap();

    assert!(cache.contains(URL_A));
    assert!(!cache.contains(URL_B));
    assert!(cache.contains(URL_C));
    assert!(cache.contains(URL_D));
    assert!(cache.stats().total_bytes <= 300);

    let blobs = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "bin"))
        .count();
    assert_eq!(blobs, 3);
}

#[tokio::test]
async fn total_size_never_exceeds_budget() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(70);
    let cache = open(dir.path(), 250, &media);

    for i in 0..20 {
        let url = format!("https://static.wwnd.space/posters/{}.jpg", i % 7);
        cache.get_or_fetch(&url).await.unwrap();
        assert!(cache.stats().total_bytes <= 250);
    }
}

#[tokio::test]
async fn oversized_blob_is_returned_but_not_kept() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    media.set_size(URL_B, 500);
    let cache = open(dir.path(), 300, &media);
    cache.get_or_fetch(URL_A).await.unwrap();

    let big = cache.get_or_fetch(URL_B).await.unwrap();

    assert_eq!(big.len(), 500);
    assert!(!cache.contains(URL_B));
    assert!(cache.contains(URL_A));
    assert_eq!(cache.stats().total_bytes, 100);
}

#[tokio::test]
async fn index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    {
        let cache = open(dir.path(), 1_000, &media);
        cache.get_or_fetch(URL_A).await.unwrap();
        cache.get_or_fetch(URL_B).await.unwrap();
    }

    let reopened = open(dir.path(), 1_000, &media);
    assert_eq!(reopened.stats().entries, 2);
    reopened.get_or_fetch(URL_A).await.unwrap();
    assert_eq!(media.fetches(), 2);
}

#[tokio::test]
async fn reopen_with_smaller_budget_trims() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    {
        let cache = open(dir.path(), 1_000, &media);
        for url in [URL_A, URL_B, URL_C] {
            cache.get_or_fetch(url).await.unwrap();
        }
    }

    let reopened = open(dir.path(), 200, &media);
    let stats = reopened.stats();
    assert_eq!(stats.entries, 2);
    assert!(!reopened.contains(URL_A));
}

#[tokio::test]
async fn missing_blob_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let cache = open(dir.path(), 1_000, &media);
    cache.get_or_fetch(URL_A).await.unwrap();

    let blob = dir
        .path()
        .join(format!("{}.bin", anisync_lib::image_cache::cache_key(URL_A)));
    std::fs::remove_file(blob).unwrap();

    assert_eq!(cache.get_or_fetch(URL_A).await.unwrap().len(), 100);
    assert_eq!(media.fetches(), 2);
}

#[tokio::test]
async fn expired_entries_are_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let config = ImageCacheConfig::new(dir.path(), 1_000).with_max_age(Duration::from_millis(10));
    let cache = ImageCache::open(config, media.clone()).unwrap();

    cache.get_or_fetch(URL_A).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    cache.get_or_fetch(URL_A).await.unwrap();

    assert_eq!(media.fetches(), 2);
    assert_eq!(cache.stats().entries, 1);
}

#[tokio::test]
async fn set_budget_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let media = FakeMedia::new(100);
    let cache = open(dir.path(), 1_000, &media);
    for url in [URL_A, URL_B, URL_C] {
        cache.get_or_fetch(url).await.unwrap();
    }

    cache.set_budget(150).await.unwrap();
    let stats = cache.stats();
    assert_eq!((stats.entries, stats.total_bytes, stats.budget_bytes), (1, 100, 150));
    assert!(cache.contains(URL_C));

    assert_eq!(cache.clear().await.unwrap(), 100);
    assert_eq!(cache.stats().entries, 0);
}
