//! 出題位置の管理
//!
//! 移動に成功するたびに現在の問題と前後の画像を先読みする。

use crate::image_cache::{neighbour_indices, ImageCache, Prefetch};
use paperfold_common::Item;

#[derive(Debug, Clone)]
pub struct Navigator {
    index: usize,
    len: usize,
    radius: usize,
    cache: ImageCache,
}

impl Navigator {
    pub fn new(cache: ImageCache, radius: usize) -> Self {
        Self {
            index: 0,
            len: 0,
            radius,
            cache,
        }
    }

    pub fn current(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.len == 0 || self.index + 1 == self.len
    }

    /// 出題リストが変わったら先頭に戻す
    pub fn reset(&mut self, items: &[Item]) -> Option<Prefetch> {
        self.index = 0;
        self.len = items.len();
        if items.is_empty() {
            return None;
        }
        Some(self.warm(items))
    }

    /// 指定位置へ移動（範囲外ならNone）
    pub fn goto(&mut self, items: &[Item], index: usize) -> Option<Prefetch> {
        self.len = items.len();
        if index >= self.len {
            return None;
        }
        self.index = index;
        Some(self.warm(items))
    }

    pub fn next(&mut self, items: &[Item]) -> Option<Prefetch> {
        self.goto(items, self.index.checked_add(1)?)
    }

    pub fn previous(&mut self, items: &[Item]) -> Option<Prefetch> {
        self.goto(items, self.index.checked_sub(1)?)
    }

    /// 現在の問題を先頭に、近い順で先読み
    fn warm(&self, items: &[Item]) -> Prefetch {
        let paths = std::iter::once(self.index)
            .chain(neighbour_indices(items.len(), self.index, self.radius))
            .map(|i| items[i].image_path.clone())
            .collect();
        self.cache.preload(paths)
    }
}
