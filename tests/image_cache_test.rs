//! 画像キャッシュテスト
//!
//! LRU追い出し・同時読み込みの集約・失敗時のプレースホルダー・先読みを検証

use futures::future::{BoxFuture, FutureExt};
use paperfold_common::Item;
use paperfold_runner::config::CacheConfig;
use paperfold_runner::error::{PaperfoldError, Result};
use paperfold_runner::image_cache::{ImageCache, ImageHandle, ImageSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn png_bytes() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::new_rgb8(2, 2)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("PNGの生成に失敗");
    buf.into_inner()
}

/// 取得回数を記録するテスト用の取得元
#[derive(Clone, Default)]
struct ScriptedSource {
    images: Arc<HashMap<String, Vec<u8>>>,
    fetches: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    fn with_paths(paths: &[&str]) -> Self {
        let bytes = png_bytes();
        Self {
            images: Arc::new(paths.iter().map(|p| (p.to_string(), bytes.clone())).collect()),
            ..Default::default()
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

impl ImageSource for ScriptedSource {
    fn fetch(&self, location: String) -> BoxFuture<'static, Result<Vec<u8>>> {
        self.fetches.lock().unwrap().push(location.clone());
        let found = self.images.get(&location).cloned();
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            found.ok_or_else(|| {
                PaperfoldError::from(std::io::Error::new(std::io::ErrorKind::NotFound, location))
            })
        }
        .boxed()
    }
}

fn cache_with(source: &ScriptedSource, max: usize) -> ImageCache {
    let config = CacheConfig {
        max_cache_size: max,
        preload_range: 5,
        batch_size: 3,
    };
    ImageCache::new(Arc::new(source.clone()), &config)
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item {
            id: Some(format!("q{}", i)),
            image: format!("{}.png", i),
            image_path: format!("img/{}.png", i),
            answer: None,
            shape: "circle".into(),
            steps: 3,
        })
        .collect()
}

/// 容量2: A, B を読み込み → A を参照 → C を読み込むと B が追い出される
#[tokio::test]
async fn test_lru_evicts_least_recently_used() {
    let source = ScriptedSource::with_paths(&["A", "B", "C"]);
    let cache = cache_with(&source, 2);

    cache.load("A").await;
    cache.load("B").await;
    assert!(cache.get("A").is_some());
    cache.load("C").await;

    assert!(cache.contains("A"));
    assert!(!cache.contains("B"));
    assert!(cache.contains("C"));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.status().access_order, vec!["A".to_string(), "C".to_string()]);
}

/// contains はアクセス順を変えない
#[tokio::test]
async fn test_contains_does_not_refresh_recency() {
    let source = ScriptedSource::with_paths(&["A", "B", "C"]);
    let cache = cache_with(&source, 2);

    cache.load("A").await;
    cache.load("B").await;
    assert!(cache.contains("A"));
    cache.load("C").await;

    assert!(!cache.contains("A"));
    assert!(cache.contains("B"));
}

/// キャッシュ済みの読み込みは再取得しない
#[tokio::test]
async fn test_hit_does_not_refetch() {
    let source = ScriptedSource::with_paths(&["A"]);
    let cache = cache_with(&source, 4);

    let first = cache.load("A").await;
    let second = cache.load("A").await;

    assert!(ImageHandle::ptr_eq(&first, &second));
    assert_eq!(source.fetch_count("A"), 1);
    assert_eq!(first.dimensions(), Some((2, 2)));
}

/// 読み込み中の同じパスは1回の取得にまとめる
#[tokio::test]
async fn test_concurrent_loads_are_deduplicated() {
    let source = ScriptedSource::with_paths(&["A"]).delayed(Duration::from_millis(50));
    let cache = cache_with(&source, 4);

    let (first, second) = tokio::join!(cache.load("A"), cache.load("A"));

    assert!(ImageHandle::ptr_eq(&first, &second));
    assert_eq!(source.fetch_count("A"), 1);
    assert_eq!(cache.status().in_flight, 0);
}

/// 取得失敗はプレースホルダーを返し、キャッシュしない
#[tokio::test]
async fn test_failure_returns_placeholder_without_caching() {
    let source = ScriptedSource::with_paths(&[]);
    let cache = cache_with(&source, 4);

    let first = cache.load("missing").await;
    let second = cache.load("missing").await;

    assert!(first.is_placeholder());
    assert!(ImageHandle::ptr_eq(&first, &second));
    assert!(ImageHandle::ptr_eq(&first, &cache.placeholder()));
    assert!(!cache.contains("missing"));
    assert_eq!(source.fetch_count("missing"), 2);
}

/// デコードできないデータもプレースホルダー
#[tokio::test]
async fn test_undecodable_bytes_return_placeholder() {
    let source = ScriptedSource {
        images: Arc::new(HashMap::from([("bad".to_string(), b"not an image".to_vec())])),
        ..Default::default()
    };
    let cache = cache_with(&source, 4);

    assert!(cache.load("bad").await.is_placeholder());
    assert!(cache.is_empty());
}

/// 前後の画像を先読みする（中心は含まない）
#[tokio::test]
async fn test_preload_range_loads_neighbours() {
    let list = items(10);
    let paths: Vec<&str> = list.iter().map(|i| i.image_path.as_str()).collect();
    let source = ScriptedSource::with_paths(&paths);
    let cache = cache_with(&source, 20);

    cache.preload_range(&list, 5, 2).join().await;

    for i in [3, 4, 6, 7] {
        assert!(cache.contains(&list[i].image_path), "{}が未読み込み", i);
    }
    assert!(!cache.contains(&list[5].image_path));
    assert!(!cache.contains(&list[2].image_path));
    assert!(!cache.contains(&list[8].image_path));
}

/// 先読みも容量を超えない
#[tokio::test]
async fn test_preload_respects_capacity() {
    let list = items(20);
    let paths: Vec<&str> = list.iter().map(|i| i.image_path.as_str()).collect();
    let source = ScriptedSource::with_paths(&paths);
    let cache = cache_with(&source, 3);

    cache.preload_range(&list, 10, 5).join().await;

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.status().usage_percentage, 100);
}

/// 先読み済みの範囲は何もしない
#[tokio::test]
async fn test_preload_skips_cached() {
    let list = items(3);
    let paths: Vec<&str> = list.iter().map(|i| i.image_path.as_str()).collect();
    let source = ScriptedSource::with_paths(&paths);
    let cache = cache_with(&source, 10);

    cache.preload_range(&list, 1, 1).join().await;
    let again = cache.preload_range(&list, 1, 1);

    assert!(again.is_noop());
    assert_eq!(source.fetch_count(&list[0].image_path), 1);
}

/// ランタイム外では先読みしない
#[test]
fn test_preload_outside_runtime_is_noop() {
    let list = items(5);
    let source = ScriptedSource::with_paths(&["img/1.png"]);
    let cache = cache_with(&source, 10);

    assert!(cache.preload_range(&list, 0, 2).is_noop());
    assert!(cache.is_empty());
}

/// clear で全件削除
#[tokio::test]
async fn test_clear() {
    let source = ScriptedSource::with_paths(&["A", "B"]);
    let cache = cache_with(&source, 4);
    cache.load("A").await;
    cache.load("B").await;

    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.get("A").is_none());
    assert!(cache.status().access_order.is_empty());
}
