use crate::error::{PaperfoldError, Result};
use paperfold_common::{CompletionRule, TaskVariant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 画像キャッシュ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// 最大キャッシュ枚数
    pub max_cache_size: usize,
    /// 先読み範囲（前後n問）
    pub preload_range: usize,
    /// 先読みの同時取得数
    pub batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 100,
            preload_range: 5,
            batch_size: 3,
        }
    }
}

/// 出題設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestConfig {
    /// 基本セットの目標問題数
    pub max_questions: usize,
    /// 保存済み出題セットの有効期限（時間）
    pub freshness_hours: i64,
    /// テスト版
    pub version: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_questions: 30,
            freshness_hours: 24,
            version: "A".into(),
        }
    }
}

impl TestConfig {
    pub fn freshness_ms(&self) -> i64 {
        self.freshness_hours * 60 * 60 * 1000
    }
}

/// 課題ごとのデータ配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantConfig {
    /// 通常モードのJSONLカタログ
    pub catalog: String,
    /// 招待コードモードの問題セット
    pub question_sets: String,
    /// 画像ベースパス
    pub image_base: String,
    #[serde(default)]
    pub completion: CompletionRule,
}

impl VariantConfig {
    fn new(catalog: &str, question_sets: &str, image_base: &str) -> Self {
        Self {
            catalog: catalog.into(),
            question_sets: question_sets.into(),
            image_base: image_base.into(),
            completion: CompletionRule::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VariantsConfig {
    pub task1: VariantConfig,
    pub task2: VariantConfig,
    pub task3: VariantConfig,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            task1: VariantConfig::new(
                "task1/task1_selected_algorithm2.jsonl",
                "task1/all_question_sets.json",
                "task1/task1_selected_algorithm2/",
            ),
            task2: VariantConfig::new(
                "task2/task2_selected/merged_dataset_fixed_paths.jsonl",
                "task2/all_question_sets.json",
                "task2/task2_selected/",
            ),
            task3: VariantConfig::new(
                "task3/task3_selected.jsonl",
                "task3/all_question_sets.json",
                "task3/task3_selected/",
            ),
        }
    }
}

impl VariantsConfig {
    pub fn get(&self, variant: TaskVariant) -> &VariantConfig {
        match variant {
            TaskVariant::Task1 => &self.task1,
            TaskVariant::Task2 => &self.task2,
            TaskVariant::Task3 => &self.task3,
        }
    }

    pub fn get_mut(&mut self, variant: TaskVariant) -> &mut VariantConfig {
        match variant {
            TaskVariant::Task1 => &mut self.task1,
            TaskVariant::Task2 => &mut self.task2,
            TaskVariant::Task3 => &mut self.task3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// カタログと画像の取得元（ディレクトリ or http(s)のURL）
    pub data_root: String,
    /// 保存先（省略時はデータディレクトリ）
    pub storage_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub test: TestConfig,
    pub variants: VariantsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: ".".into(),
            storage_dir: None,
            cache: CacheConfig::default(),
            test: TestConfig::default(),
            variants: VariantsConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PaperfoldError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("paperfold").join("config.json"))
    }

    /// 保存先ディレクトリ
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| PaperfoldError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("paperfold"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_cache_size == 0 {
            return Err(PaperfoldError::Config("cache.max_cache_size は1以上にしてください".into()));
        }
        if self.cache.batch_size == 0 {
            return Err(PaperfoldError::Config("cache.batch_size は1以上にしてください".into()));
        }
        if self.test.freshness_hours <= 0 {
            return Err(PaperfoldError::Config("test.freshness_hours は1以上にしてください".into()));
        }
        Ok(())
    }

    /// `key=value` 形式で1項目を変更（不正な値なら変更しない）
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || PaperfoldError::Config(format!("{} の値が不正です: {}", key, value));
        let unknown = || PaperfoldError::Config(format!("不明な設定キー: {}", key));
        let mut next = self.clone();

        match key {
            "data_root" => next.data_root = value.to_string(),
            "storage_dir" => next.storage_dir = Some(PathBuf::from(value)),
            "cache.max_cache_size" => next.cache.max_cache_size = value.parse().map_err(|_| invalid())?,
            "cache.preload_range" => next.cache.preload_range = value.parse().map_err(|_| invalid())?,
            "cache.batch_size" => next.cache.batch_size = value.parse().map_err(|_| invalid())?,
            "test.max_questions" => next.test.max_questions = value.parse().map_err(|_| invalid())?,
            "test.freshness_hours" => next.test.freshness_hours = value.parse().map_err(|_| invalid())?,
            "test.version" => next.test.version = value.to_string(),
            other => {
                // task1.catalog / task2.image_base / task3.minimum など
                let (task, field) = other.split_once('.').ok_or_else(unknown)?;
                let variant: TaskVariant = task.parse().map_err(|_| unknown())?;
                let target = next.variants.get_mut(variant);
                match field {
                    "catalog" => target.catalog = value.to_string(),
                    "question_sets" => target.question_sets = value.to_string(),
                    "image_base" => target.image_base = value.to_string(),
                    "minimum" => target.completion = CompletionRule::Minimum(value.parse().map_err(|_| invalid())?),
                    "completion" if value == "all" => target.completion = CompletionRule::All,
                    _ => return Err(unknown()),
                }
            }
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}
