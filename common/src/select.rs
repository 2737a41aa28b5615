//! 出題セット選択モジュール
//!
//! カタログから「折り回数 → 形状」の2段階で層別化し、
//! シード付きシャッフルで各層から均等に選ぶ。
//!
//! 形状の問題数が足りない場合はある分だけ取り、
//! 不足分を他の形状へ再配分しない（目標数を下回ることがある）。

use crate::random::shuffle;
use crate::types::{FilterKey, Item};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// 同一性キーで重複除去（先勝ち、順序維持）
pub fn dedup_items(items: &[Item]) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.key().to_string()))
        .cloned()
        .collect()
}

/// `total` を `parts` 個に分け、余りを先頭から1つずつ配る
fn split_evenly(total: usize, parts: usize, index: usize) -> usize {
    if parts == 0 {
        return 0;
    }
    total / parts + usize::from(index < total % parts)
}

/// 1つの折り回数区分から形状バランスを取って選ぶ
///
/// 形状はソート順に並べ、`seed + 形状インデックス` でシャッフルして先頭から取る
pub fn select_with_shape_balance(items: &[Item], target: usize, seed: u64) -> Vec<Item> {
    if items.is_empty() || target == 0 {
        return Vec::new();
    }

    let mut groups: BTreeMap<&str, Vec<Item>> = BTreeMap::new();
    for item in items {
        groups.entry(item.shape.as_str()).or_default().push(item.clone());
    }

    let shape_count = groups.len();
    let mut selected = Vec::with_capacity(target);

    for (index, group) in groups.values().enumerate() {
        let count = split_evenly(target, shape_count, index);
        let shuffled = shuffle(group, seed.wrapping_add(index as u64));
        selected.extend(shuffled.into_iter().take(count));
    }

    selected
}

/// 基本出題セットを生成
///
/// # Arguments
/// * `items` - カタログ全体（形状・折り回数は抽出済み）
/// * `seed` - シード
/// * `target` - 目標問題数
/// * `buckets` - 有効な折り回数区分
///
/// # Returns
/// 同じ入力なら常に同じ順序・同じ内容の問題列
pub fn build_base_set(items: &[Item], seed: u64, target: usize, buckets: &[u32]) -> Vec<Item> {
    let unique = dedup_items(items);

    let mut by_steps: BTreeMap<u32, Vec<Item>> = BTreeMap::new();
    for item in unique {
        if buckets.contains(&item.steps) {
            by_steps.entry(item.steps).or_default().push(item);
        }
    }

    let bucket_count = by_steps.len();
    let mut selected = Vec::with_capacity(target);

    for (index, bucket_items) in by_steps.values().enumerate() {
        let bucket_target = split_evenly(target, bucket_count, index);
        selected.extend(select_with_shape_balance(bucket_items, bucket_target, seed));
    }

    shuffle(&selected, seed)
}

/// 基本セットから絞り込み（基本セットの順序を維持）
pub fn filter_view(base: &[Item], key: FilterKey) -> Vec<Item> {
    match key {
        FilterKey::All => base.to_vec(),
        FilterKey::Steps(steps) => base.iter().filter(|i| i.steps == steps).cloned().collect(),
    }
}

/// カタログの指紋（保存済みセットが別カタログ由来でないか確認する）
pub fn catalog_fingerprint(items: &[Item]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.key().as_bytes());
        hasher.update([0u8]);
        hasher.update(item.image_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(item.answer.map(|c| c.as_str()).unwrap_or("-").as_bytes());
        hasher.update([b'\n']);
    }
    hex::encode(hasher.finalize())
}
