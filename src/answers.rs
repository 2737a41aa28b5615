//! 回答管理モジュール
//!
//! 課題ごとに「問題ID → 最初に選んだ選択肢」を保持する。
//! 一度記録した回答は上書きしない（書き換えは `clear` のみ）。
//! 記録のたびに同期的に保存する。

use crate::pool::now_ms;
use crate::storage::{read_json, remove_quietly, storage_key, write_json, SharedStorage, StateKind};
use paperfold_common::{Choice, Item, SessionMode, TaskVariant};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 保存形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAnswers {
    #[serde(default)]
    pub answers: BTreeMap<String, Choice>,
    pub start_time: i64,
    pub version: String,
    pub timestamp: i64,
}

/// 一括ランダム回答の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickFill {
    /// 新たに埋めた数
    pub selected: usize,
    pub total: usize,
}

pub struct AnswerStore {
    storage: SharedStorage,
    key: String,
    answers: BTreeMap<String, Choice>,
    start_time: i64,
    version: String,
}

impl std::fmt::Debug for AnswerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStore")
            .field("key", &self.key)
            .field("answers", &self.answers)
            .field("start_time", &self.start_time)
            .field("version", &self.version)
            .finish()
    }
}

impl AnswerStore {
    /// 課題・モードごとのキーで読み込む
    pub fn for_variant(
        storage: SharedStorage,
        variant: TaskVariant,
        mode: &SessionMode,
        version: &str,
    ) -> Self {
        let key = storage_key(StateKind::Answers, variant, mode);
        Self::load(storage, key, version)
    }

    /// 保存済みの回答を読み込む
    ///
    /// 無ければ新しい開始時刻で空のストアを返す。
    /// 壊れていればキーを削除してから空のストアを返す
    pub fn load(storage: SharedStorage, key: String, version: &str) -> Self {
        let mut store = Self {
            storage,
            key,
            answers: BTreeMap::new(),
            start_time: now_ms(),
            version: version.to_string(),
        };

        match read_json::<PersistedAnswers>(store.storage.as_ref(), &store.key) {
            None => {}
            Some(Ok(saved)) => {
                debug!(key = %store.key, count = saved.answers.len(), "保存済みの回答を読み込み");
                store.answers = saved.answers;
                store.start_time = saved.start_time;
                store.version = saved.version;
            }
            Some(Err(e)) => {
                warn!(key = %store.key, error = %e, "保存済み回答が壊れているため破棄");
                remove_quietly(store.storage.as_ref(), &store.key);
            }
        }

        store
    }

    /// 回答を記録（既に回答済みなら何もしない）
    pub fn record(&mut self, item_id: &str, choice: Choice) -> bool {
        if self.answers.contains_key(item_id) {
            return false;
        }
        self.answers.insert(item_id.to_string(), choice);
        self.save();
        true
    }

    pub fn get(&self, item_id: &str) -> Option<Choice> {
        self.answers.get(item_id).copied()
    }

    pub fn count(&self) -> usize {
        self.answers.len()
    }

    /// 指定した問題のうち回答済みの数
    pub fn count_for(&self, items: &[Item]) -> usize {
        items.iter().filter(|item| self.answers.contains_key(item.key())).count()
    }

    pub fn answers(&self) -> &BTreeMap<String, Choice> {
        &self.answers
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// メモリ上の回答のみ消去
    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// 保存済みの回答も削除
    pub fn clear_persisted(&mut self) {
        self.clear();
        remove_quietly(self.storage.as_ref(), &self.key);
    }

    /// 回答を消して開始時刻をリセット
    pub fn restart(&mut self) {
        self.clear_persisted();
        self.start_time = now_ms();
    }

    /// 版を切り替える（同じ版なら何もせずfalse）
    ///
    /// 版が変わると正答も変わるため、回答と開始時刻をリセットする
    pub fn switch_version(&mut self, version: &str) -> bool {
        if self.version == version {
            return false;
        }
        debug!(key = %self.key, from = %self.version, to = version, "版を切り替え");
        self.version = version.to_string();
        self.restart();
        self.save();
        true
    }

    pub fn save(&self) -> bool {
        let record = PersistedAnswers {
            answers: self.answers.clone(),
            start_time: self.start_time,
            version: self.version.clone(),
            timestamp: now_ms(),
        };
        write_json(self.storage.as_ref(), &self.key, &record)
    }

    /// 未回答の問題にランダムな選択肢を入れる
    pub fn quick_fill<R: Rng + ?Sized>(&mut self, items: &[Item], rng: &mut R) -> QuickFill {
        let mut selected = 0;
        for item in items {
            if self.answers.contains_key(item.key()) {
                continue;
            }
            let choice = Choice::ALL[rng.random_range(0..Choice::ALL.len())];
            self.answers.insert(item.key().to_string(), choice);
            selected += 1;
        }

        if selected > 0 {
            self.save();
        }

        QuickFill {
            selected,
            total: items.len(),
        }
    }
}
