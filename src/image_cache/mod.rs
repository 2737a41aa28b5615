//! 画像キャッシュモジュール
//!
//! 取得・デコード済みの画像を最大 `max_size` 枚まで保持する。
//! 満杯時は最後のアクセスが最も古いものから追い出す（厳密なLRU）。
//!
//! - 同じパスの同時読み込みは1回の取得にまとめる
//! - 取得失敗はプレースホルダーを返し、キャッシュには入れない
//! - 先読みはバックグラウンドタスクで行い、呼び出し元を待たせない

mod handle;
mod source;

pub use handle::ImageHandle;
pub use source::{image_source_for, FsImageSource, HttpImageSource, ImageSource};

use crate::config::CacheConfig;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use paperfold_common::Item;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type LoadFuture = Shared<BoxFuture<'static, Option<ImageHandle>>>;

/// キャッシュの状態（表示・診断用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub size: usize,
    pub max_size: usize,
    pub usage_percentage: usize,
    /// 古い順
    pub access_order: Vec<String>,
    pub in_flight: usize,
}

struct Entry {
    handle: ImageHandle,
    tick: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    /// アクセス時刻 → パス（先頭が最古）
    order: BTreeMap<u64, String>,
    tick: u64,
    in_flight: HashMap<String, LoadFuture>,
}

impl CacheState {
    fn touch(&mut self, path: &str) -> Option<ImageHandle> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(path)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, path.to_string());
        Some(entry.handle.clone())
    }

    fn insert(&mut self, path: &str, handle: ImageHandle, max_size: usize) {
        if self.touch(path).is_some() {
            return;
        }
        while self.entries.len() >= max_size {
            let Some((_, victim)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&victim);
            debug!(path = %victim, "キャッシュから追い出し");
        }
        self.tick += 1;
        self.order.insert(self.tick, path.to_string());
        self.entries.insert(
            path.to_string(),
            Entry {
                handle,
                tick: self.tick,
            },
        );
    }
}

struct Inner {
    source: Arc<dyn ImageSource>,
    max_size: usize,
    batch_size: usize,
    placeholder: ImageHandle,
    state: Mutex<CacheState>,
}

/// 画像キャッシュ（クローンは同じキャッシュを共有）
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("max_size", &self.inner.max_size)
            .field("len", &self.len())
            .finish()
    }
}

impl ImageCache {
    pub fn new(source: Arc<dyn ImageSource>, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                max_size: config.max_cache_size.max(1),
                batch_size: config.batch_size.max(1),
                placeholder: ImageHandle::placeholder(),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// キャッシュ済みなら返す（I/Oなし、アクセス順を更新）
    pub fn get(&self, path: &str) -> Option<ImageHandle> {
        self.state().touch(path)
    }

    /// キャッシュ済みか（アクセス順は変えない）
    pub fn contains(&self, path: &str) -> bool {
        self.state().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn placeholder(&self) -> ImageHandle {
        self.inner.placeholder.clone()
    }

    /// 画像を読み込む
    ///
    /// 読み込み中の同じパスがあればその完了を待つ。失敗時はプレースホルダー
    pub async fn load(&self, path: &str) -> ImageHandle {
        let pending = {
            let mut state = self.state();
            if let Some(handle) = state.touch(path) {
                return handle;
            }
            match state.in_flight.get(path) {
                Some(pending) => pending.clone(),
                None => {
                    let pending = fetch_and_decode(self.inner.source.clone(), path.to_string())
                        .boxed()
                        .shared();
                    state.in_flight.insert(path.to_string(), pending.clone());
                    pending
                }
            }
        };

        let loaded = pending.clone().await;

        let mut state = self.state();
        if state
            .in_flight
            .get(path)
            .map(|current| current.ptr_eq(&pending))
            .unwrap_or(false)
        {
            state.in_flight.remove(path);
        }

        match loaded {
            Some(handle) => {
                state.insert(path, handle.clone(), self.inner.max_size);
                handle
            }
            None => self.inner.placeholder.clone(),
        }
    }

    /// `center` の前後 `radius` 問を先読み
    ///
    /// 近い順に `batch_size` 枚ずつ取得する。tokioランタイム外では何もしない
    pub fn preload_range(&self, items: &[Item], center: usize, radius: usize) -> Prefetch {
        let paths = neighbour_indices(items.len(), center, radius)
            .into_iter()
            .map(|i| items[i].image_path.clone())
            .collect();
        self.preload(paths)
    }

    /// 指定順に先読み（キャッシュ済みは除く）
    pub fn preload(&self, paths: Vec<String>) -> Prefetch {
        let paths: Vec<String> = paths.into_iter().filter(|path| !self.contains(path)).collect();
        if paths.is_empty() {
            return Prefetch { task: None };
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("ランタイム外のため先読みをスキップ");
            return Prefetch { task: None };
        };

        let cache = self.clone();
        let batch_size = self.inner.batch_size;
        let task = runtime.spawn(async move {
            for batch in paths.chunks(batch_size) {
                join_all(batch.iter().map(|path| cache.load(path))).await;
            }
        });

        Prefetch { task: Some(task) }
    }

    pub fn status(&self) -> CacheStatus {
        let state = self.state();
        let size = state.entries.len();
        CacheStatus {
            size,
            max_size: self.inner.max_size,
            usage_percentage: (size * 100 + self.inner.max_size / 2) / self.inner.max_size,
            access_order: state.order.values().cloned().collect(),
            in_flight: state.in_flight.len(),
        }
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.order.clear();
    }
}

/// 先読みタスク
#[derive(Debug)]
pub struct Prefetch {
    task: Option<JoinHandle<()>>,
}

impl Prefetch {
    /// 先読み対象が無かった
    pub fn is_noop(&self) -> bool {
        self.task.is_none()
    }

    /// 先読み完了まで待つ
    pub async fn join(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                warn!(error = %e, "先読みタスクが異常終了");
            }
        }
    }
}

/// `center` を除く前後 `radius` 件のインデックス（近い順、前が先）
pub(crate) fn neighbour_indices(len: usize, center: usize, radius: usize) -> Vec<usize> {
    let mut indices = Vec::new();
    for distance in 1..=radius {
        if let Some(before) = center.checked_sub(distance) {
            if before < len {
                indices.push(before);
            }
        }
        if let Some(after) = center.checked_add(distance) {
            if after < len {
                indices.push(after);
            }
        }
    }
    indices
}

async fn fetch_and_decode(source: Arc<dyn ImageSource>, path: String) -> Option<ImageHandle> {
    let bytes = match source.fetch(path.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path, error = %e, "画像の取得に失敗");
            return None;
        }
    };

    match tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await {
        Ok(Ok(image)) => {
            debug!(path = %path, "画像を読み込みました");
            Some(ImageHandle::decoded(image))
        }
        Ok(Err(e)) => {
            warn!(path = %path, error = %e, "画像のデコードに失敗");
            None
        }
        Err(e) => {
            warn!(path = %path, error = %e, "デコードタスクが異常終了");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbour_indices_nearest_first() {
        assert_eq!(neighbour_indices(10, 5, 2), vec![4, 6, 3, 7]);
        assert_eq!(neighbour_indices(10, 0, 2), vec![1, 2]);
        assert_eq!(neighbour_indices(3, 2, 5), vec![1, 0]);
        assert!(neighbour_indices(0, 0, 5).is_empty());
        assert!(neighbour_indices(10, 5, 0).is_empty());
    }

    #[test]
    fn test_state_evicts_least_recent() {
        let mut state = CacheState::default();
        let handle = ImageHandle::placeholder();
        state.insert("a", handle.clone(), 2);
        state.insert("b", handle.clone(), 2);
        state.touch("a");
        state.insert("c", handle, 2);

        assert!(state.entries.contains_key("a"));
        assert!(!state.entries.contains_key("b"));
        assert_eq!(state.order.values().cloned().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
