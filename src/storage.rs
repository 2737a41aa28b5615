//! 永続化ストレージモジュール
//!
//! キー → JSON文字列 の単純な保存領域。課題・モードごとに
//! キーを分け、異なる課題の状態が混ざらないようにする。
//!
//! 書き込みは呼び出し元のメモリ更新と同期して行うが、
//! 失敗はログに残すだけで呼び出し元には返さない（`write_json`）。

use crate::error::{PaperfoldError, Result};
use paperfold_common::{SessionMode, TaskVariant};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use walkdir::WalkDir;

const KEY_PREFIX: &str = "paperfolding";
const FILE_EXTENSION: &str = "json";

/// キーと値の永続化領域
pub trait Storage: Send + Sync {
    /// 読み込み（無い・読めない場合はNone）
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 削除（存在しなくてもOk）
    fn remove(&self, key: &str) -> Result<()>;

    /// 保存済みキー一覧（ソート済み）
    fn keys(&self) -> Vec<String>;
}

pub type SharedStorage = Arc<dyn Storage>;

/// 保存する状態の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// 出題セット
    Questions,
    /// 回答
    Answers,
}

impl StateKind {
    fn as_str(&self) -> &'static str {
        match self {
            StateKind::Questions => "questions",
            StateKind::Answers => "answers",
        }
    }
}

/// 名前空間付きキー
///
/// - 通常: `paperfolding_answers_task1`
/// - 招待コード: `paperfolding_answers_task1_set7`
pub fn storage_key(kind: StateKind, variant: TaskVariant, mode: &SessionMode) -> String {
    let mut key = format!("{}_{}_{}", KEY_PREFIX, kind.as_str(), variant.as_str());
    if let Some(set_id) = mode.set_id() {
        key.push_str("_set");
        key.push_str(set_id);
    }
    key
}

/// JSONで保存（失敗はログのみ）
pub fn write_json<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(key, error = %e, "保存データのシリアライズに失敗");
            return false;
        }
    };

    match storage.set(key, &json) {
        Ok(()) => {
            debug!(key, bytes = json.len(), "保存しました");
            true
        }
        Err(e) => {
            warn!(key, error = %e, "保存に失敗");
            false
        }
    }
}

/// JSONで読み込み
///
/// - `None`: 保存されていない
/// - `Some(Err)`: 保存されているが壊れている
pub fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Option<std::result::Result<T, serde_json::Error>> {
    storage.get(key).map(|raw| serde_json::from_str(&raw))
}

/// 削除（失敗はログのみ）
pub fn remove_quietly(storage: &dyn Storage, key: &str) {
    if let Err(e) = storage.remove(key) {
        warn!(key, error = %e, "削除に失敗");
    }
}

/// 1キー1ファイルで保存するストレージ
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_file_stem(key), FILE_EXTENSION))
    }
}

/// 16進エンコードしたファイル名の目印（安全な文字集合に含まれない）
const ENCODED_MARKER: char = '~';

fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// キー → ファイル名（拡張子なし）
///
/// 安全な文字だけのキーはそのまま、それ以外は `~` + 16進。
/// 異なるキーが同じファイルになることはない
fn encode_file_stem(key: &str) -> String {
    if is_safe_key(key) {
        key.to_string()
    } else {
        format!("{}{}", ENCODED_MARKER, hex::encode(key.as_bytes()))
    }
}

fn decode_file_stem(stem: &str) -> Option<String> {
    match stem.strip_prefix(ENCODED_MARKER) {
        Some(encoded) => hex::decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok()),
        None if is_safe_key(stem) => Some(stem.to_string()),
        None => None,
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "読み込みに失敗");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // 書きかけのファイルを残さないよう一時ファイル経由で置き換える
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| PaperfoldError::Storage(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|x| x == FILE_EXTENSION).unwrap_or(false))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_file_stem)
            })
            .collect();
        keys.sort();
        keys
    }
}

/// プロセス内ストレージ（テスト・一時セッション用）
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}
