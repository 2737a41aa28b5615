//! 出題プールモジュール
//!
//! カタログから折り回数・形状のバランスを取った基本セットを作り、
//! シードと一緒に保存する。絞り込みは基本セットからの抽出のみで、
//! カタログから引き直すことはない。
//!
//! 状態遷移: `Empty → BasePersisted → Filtered`
//! （`regenerate` で作り直し、`apply_filter` は表示だけを差し替える）

use crate::config::TestConfig;
use crate::storage::{read_json, remove_quietly, storage_key, write_json, SharedStorage, StateKind};
use paperfold_common::{
    build_base_set, catalog_fingerprint, filter_view, FilterKey, Item, ItemSet, SessionMode,
    TaskVariant,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 新しいシード（0〜999999）
pub fn generate_seed() -> u64 {
    rand::rng().random_range(0..1_000_000)
}

/// 現在時刻（UNIXミリ秒）
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 保存形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPool {
    /// 絞り込み後の出題
    pub items: Vec<Item>,
    pub base_items: Vec<Item>,
    /// 招待コードの固定セットはNone
    pub seed: Option<u64>,
    #[serde(default)]
    pub filter: FilterKey,
    pub timestamp: i64,
    /// 元カタログの指紋（カタログ更新の検出用）
    #[serde(default)]
    pub fingerprint: String,
    /// 絞り込み操作を経たか（`All` への絞り込みも含む）
    #[serde(default)]
    pub filtered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Empty,
    BasePersisted,
    Filtered,
}

/// 出題セットの出どころ
///
/// `Rebuilt` のときは以前の回答が別の問題を指している可能性がある
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOrigin {
    /// 保存済みセットをそのまま使った
    Restored,
    /// 新しく作った（保存なし・破損・期限切れ・カタログ変更）
    Rebuilt,
}

/// 1課題分の出題プール
pub struct ItemPool {
    variant: TaskVariant,
    storage: SharedStorage,
    key: String,
    target: usize,
    freshness_ms: i64,
    base_items: Vec<Item>,
    items: Vec<Item>,
    seed: Option<u64>,
    filter: FilterKey,
    filtered: bool,
    fingerprint: String,
}

impl ItemPool {
    pub fn new(
        variant: TaskVariant,
        mode: &SessionMode,
        storage: SharedStorage,
        config: &TestConfig,
    ) -> Self {
        Self {
            variant,
            key: storage_key(StateKind::Questions, variant, mode),
            storage,
            target: config.max_questions,
            freshness_ms: config.freshness_ms(),
            base_items: Vec::new(),
            items: Vec::new(),
            seed: None,
            filter: FilterKey::All,
            filtered: false,
            fingerprint: String::new(),
        }
    }

    /// 保存済みセットがあればそれを、なければ新しいシードで作る
    ///
    /// 保存済みでも壊れている・期限切れ・カタログが変わった場合は作り直す
    pub fn initialize(&mut self, catalog: &[Item]) -> (ItemSet, PoolOrigin) {
        let fingerprint = catalog_fingerprint(catalog);

        if let Some(saved) = self.restore(&fingerprint) {
            debug!(
                variant = %self.variant,
                seed = ?saved.seed,
                count = saved.items.len(),
                "保存済みの出題セットを使用"
            );
            self.base_items = saved.base_items;
            self.items = saved.items;
            self.seed = saved.seed;
            self.filter = saved.filter;
            self.filtered = saved.filtered;
            self.fingerprint = saved.fingerprint;
            return (self.item_set(), PoolOrigin::Restored);
        }

        (self.regenerate(catalog), PoolOrigin::Rebuilt)
    }

    fn restore(&self, fingerprint: &str) -> Option<PersistedPool> {
        let saved: PersistedPool = match read_json(self.storage.as_ref(), &self.key)? {
            Ok(saved) => saved,
            Err(e) => {
                warn!(key = %self.key, error = %e, "保存済み出題セットが壊れているため破棄");
                remove_quietly(self.storage.as_ref(), &self.key);
                return None;
            }
        };

        let age = now_ms() - saved.timestamp;
        if age > self.freshness_ms {
            warn!(key = %self.key, age_ms = age, "保存済み出題セットの期限切れのため破棄");
            remove_quietly(self.storage.as_ref(), &self.key);
            return None;
        }
        if saved.fingerprint != fingerprint {
            warn!(key = %self.key, "カタログが変更されたため出題セットを作り直し");
            return None;
        }
        if saved.base_items.is_empty() {
            return None;
        }
        Some(saved)
    }

    /// 折り回数で絞り込む（基本セットは変えない）
    ///
    /// 未知の折り回数・該当なし・基本セットが空の場合は何もせずNone
    pub fn apply_filter(&mut self, key: FilterKey) -> Option<ItemSet> {
        if self.base_items.is_empty() {
            return None;
        }
        if let FilterKey::Steps(steps) = key {
            if !self.variant.stratifier().buckets().contains(&steps) {
                debug!(variant = %self.variant, steps, "未知の折り回数");
                return None;
            }
        }

        let view = filter_view(&self.base_items, key);
        if view.is_empty() {
            debug!(variant = %self.variant, filter = %key, "該当する問題がありません");
            return None;
        }

        self.items = view;
        self.filter = key;
        self.filtered = true;
        self.persist();
        Some(self.item_set())
    }

    /// 保存済みセットを捨てて新しいシードで作り直す
    pub fn regenerate(&mut self, catalog: &[Item]) -> ItemSet {
        self.regenerate_with_seed(catalog, generate_seed())
    }

    pub fn regenerate_with_seed(&mut self, catalog: &[Item], seed: u64) -> ItemSet {
        self.clear_persisted();

        let buckets = self.variant.stratifier().buckets();
        self.base_items = build_base_set(catalog, seed, self.target, buckets);
        self.items = self.base_items.clone();
        self.seed = Some(seed);
        self.filter = FilterKey::All;
        self.filtered = false;
        self.fingerprint = catalog_fingerprint(catalog);

        info!(
            variant = %self.variant,
            seed,
            count = self.base_items.len(),
            "出題セットを作成"
        );
        self.persist();
        self.item_set()
    }

    /// 招待コードの固定セットをそのまま採用（バランス調整・シャッフルなし）
    ///
    /// 保存済みの固定セットと内容が同じなら `Restored`
    pub fn adopt_fixed(&mut self, items: Vec<Item>) -> (ItemSet, PoolOrigin) {
        let fingerprint = catalog_fingerprint(&items);
        let origin = match read_json::<PersistedPool>(self.storage.as_ref(), &self.key) {
            Some(Ok(saved)) if saved.fingerprint == fingerprint => PoolOrigin::Restored,
            _ => PoolOrigin::Rebuilt,
        };

        self.fingerprint = fingerprint;
        self.base_items = items;
        self.items = self.base_items.clone();
        self.seed = None;
        self.filter = FilterKey::All;
        self.filtered = false;
        self.persist();
        (self.item_set(), origin)
    }

    /// 保存済みセットと表示中のセットを破棄
    pub fn clear_persisted(&mut self) {
        remove_quietly(self.storage.as_ref(), &self.key);
        self.base_items.clear();
        self.items.clear();
        self.seed = None;
        self.filter = FilterKey::All;
        self.filtered = false;
    }

    fn persist(&self) {
        let record = PersistedPool {
            items: self.items.clone(),
            base_items: self.base_items.clone(),
            seed: self.seed,
            filter: self.filter,
            timestamp: now_ms(),
            fingerprint: self.fingerprint.clone(),
            filtered: self.filtered,
        };
        write_json(self.storage.as_ref(), &self.key, &record);
    }

    pub fn variant(&self) -> TaskVariant {
        self.variant
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn base_items(&self) -> &[Item] {
        &self.base_items
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn filter(&self) -> FilterKey {
        self.filter
    }

    pub fn state(&self) -> PoolState {
        if self.base_items.is_empty() {
            PoolState::Empty
        } else if self.filtered {
            PoolState::Filtered
        } else {
            PoolState::BasePersisted
        }
    }

    pub fn item_set(&self) -> ItemSet {
        ItemSet {
            variant: self.variant,
            items: self.items.clone(),
            seed: self.seed,
            filter: self.filter,
        }
    }
}
