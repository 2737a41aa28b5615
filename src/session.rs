//! テストセッション
//!
//! カタログ・出題プール・回答・出題位置・画像キャッシュを1つにまとめる。
//!
//! ## 課題の切り替え
//! 1. 切り替え先のカタログを読み込む（失敗したら何も変えずにエラー）
//! 2. 現在の回答を保存
//! 3. 切り替え先の出題プールと回答を用意
//! 4. まとめて差し替えて先頭に戻る
//!
//! 途中で2つの課題の回答が混ざった状態は外から見えない。

use crate::answers::{AnswerStore, QuickFill};
use crate::catalog::{catalog_source_for, load_catalog, CatalogSource};
use crate::config::Config;
use crate::error::{PaperfoldError, Result};
use crate::events::{Event, EventBus};
use crate::image_cache::{image_source_for, ImageCache, ImageHandle, ImageSource, Prefetch};
use crate::navigation::Navigator;
use crate::pool::{generate_seed, now_ms, ItemPool, PoolOrigin};
use crate::storage::{FileStorage, SharedStorage};
use paperfold_common::{
    score, Choice, FilterKey, Item, ItemSet, SessionDescriptor, SessionMode, TaskVariant,
    TestResult,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// セッションが使う外部リソース
pub struct SessionDeps {
    pub config: Config,
    pub storage: SharedStorage,
    pub catalogs: Arc<dyn CatalogSource>,
    pub images: Arc<dyn ImageSource>,
    pub events: EventBus,
}

impl SessionDeps {
    pub fn new(
        config: Config,
        storage: SharedStorage,
        catalogs: Arc<dyn CatalogSource>,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            config,
            storage,
            catalogs,
            images,
            events: EventBus::new(),
        }
    }

    /// 設定に従ってファイルストレージとデータ取得元を用意
    pub fn from_config(config: Config) -> Result<Self> {
        let storage: SharedStorage = Arc::new(FileStorage::open(&config.storage_dir()?)?);
        let catalogs = catalog_source_for(&config.data_root);
        let images = image_source_for(&config.data_root);
        Ok(Self::new(config, storage, catalogs, images))
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }
}

/// 提出結果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 回答数が足りない
    Incomplete {
        remaining: usize,
        answered: usize,
        total: usize,
    },
    Complete(TestResult),
}

/// 出題と回答のスナップショット
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub task: TaskVariant,
    pub seed: Option<u64>,
    pub filter: FilterKey,
    pub items: Vec<Item>,
    pub answers: BTreeMap<String, Choice>,
    pub start_time: i64,
    pub version: String,
    pub exported_at: i64,
}

/// 有効な課題1つ分の状態
struct ActiveTask {
    variant: TaskVariant,
    catalog: Arc<Vec<Item>>,
    pool: ItemPool,
    answers: AnswerStore,
}

impl ActiveTask {
    fn open(
        variant: TaskVariant,
        catalog: Arc<Vec<Item>>,
        mode: &SessionMode,
        config: &Config,
        storage: &SharedStorage,
    ) -> Self {
        let mut pool = ItemPool::new(variant, mode, storage.clone(), &config.test);
        let (_, origin) = if mode.is_regular() {
            pool.initialize(&catalog)
        } else {
            pool.adopt_fixed(catalog.as_ref().clone())
        };

        let mut answers =
            AnswerStore::for_variant(storage.clone(), variant, mode, &config.test.version);
        // 作り直したセットでは問題IDが別の画像を指すため、以前の回答は使えない
        if origin == PoolOrigin::Rebuilt {
            if answers.count() > 0 {
                warn!(%variant, count = answers.count(), "出題セットを作り直したため回答を破棄");
            }
            answers.restart();
        }
        answers.switch_version(&config.test.version);

        Self {
            variant,
            catalog,
            pool,
            answers,
        }
    }
}

pub struct Session {
    mode: SessionMode,
    config: Config,
    storage: SharedStorage,
    catalogs: Arc<dyn CatalogSource>,
    catalog_memo: HashMap<TaskVariant, Arc<Vec<Item>>>,
    cache: ImageCache,
    active: ActiveTask,
    navigator: Navigator,
    events: EventBus,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("variant", &self.active.variant)
            .field("items", &self.active.pool.items().len())
            .field("answered", &self.active.answers.count())
            .field("index", &self.navigator.current())
            .finish()
    }
}

impl Session {
    /// セッション開始
    ///
    /// 招待コードモードでsetIdが無い、カタログが読めない場合はエラー
    pub async fn start(
        descriptor: &SessionDescriptor,
        variant: TaskVariant,
        deps: SessionDeps,
    ) -> Result<Self> {
        let mode = descriptor.mode().ok_or(PaperfoldError::MissingSetId)?;
        let SessionDeps {
            config,
            storage,
            catalogs,
            images,
            events,
        } = deps;

        let catalog = Arc::new(
            load_catalog(catalogs.as_ref(), config.variants.get(variant), variant, &mode).await?,
        );
        let active = ActiveTask::open(variant, catalog.clone(), &mode, &config, &storage);

        let cache = ImageCache::new(images, &config.cache);
        let mut navigator = Navigator::new(cache.clone(), config.cache.preload_range);
        navigator.reset(active.pool.items());

        let mut catalog_memo = HashMap::new();
        catalog_memo.insert(variant, catalog);

        let session = Self {
            mode,
            config,
            storage,
            catalogs,
            catalog_memo,
            cache,
            active,
            navigator,
            events,
        };

        info!(
            %variant,
            mode = %session.mode,
            items = session.active.pool.items().len(),
            answered = session.active.answers.count(),
            "セッションを開始"
        );
        session.events.emit(&Event::Initialized {
            variant,
            mode: session.mode.clone(),
            total: session.active.pool.items().len(),
            answered: session.answered_count(),
        });
        Ok(session)
    }

    async fn catalog_for(&mut self, variant: TaskVariant) -> Result<Arc<Vec<Item>>> {
        if let Some(catalog) = self.catalog_memo.get(&variant) {
            return Ok(catalog.clone());
        }
        let items = load_catalog(
            self.catalogs.as_ref(),
            self.config.variants.get(variant),
            variant,
            &self.mode,
        )
        .await?;
        let catalog = Arc::new(items);
        self.catalog_memo.insert(variant, catalog.clone());
        Ok(catalog)
    }

    /// 課題を切り替える（同じ課題なら何もせずfalse）
    ///
    /// 切り替え先のカタログが読めなければ現在の状態を保ったままエラー
    pub async fn switch_variant(&mut self, variant: TaskVariant) -> Result<bool> {
        let from = self.active.variant;
        if variant == from {
            return Ok(false);
        }

        let catalog = self.catalog_for(variant).await?;

        self.active.answers.save();
        let incoming = ActiveTask::open(variant, catalog, &self.mode, &self.config, &self.storage);
        let mut outgoing = std::mem::replace(&mut self.active, incoming);
        outgoing.answers.clear();

        self.navigator.reset(self.active.pool.items());

        info!(%from, to = %variant, "課題を切り替え");
        self.events.emit(&Event::VariantSwitched { from, to: variant });
        Ok(true)
    }

    /// 現在の問題に回答（回答済みなら何もしない）
    pub fn select(&mut self, choice: Choice) -> bool {
        let Some(item_id) = self.current_item().map(|item| item.key().to_string()) else {
            return false;
        };
        if !self.active.answers.record(&item_id, choice) {
            debug!(item_id = %item_id, "回答済みのため無視");
            return false;
        }
        self.events.emit(&Event::AnswerRecorded {
            variant: self.active.variant,
            item_id,
            choice,
        });
        true
    }

    pub fn goto(&mut self, index: usize) -> Option<Prefetch> {
        let prefetch = self.navigator.goto(self.active.pool.items(), index)?;
        self.emit_shown();
        Some(prefetch)
    }

    pub fn next(&mut self) -> Option<Prefetch> {
        let prefetch = self.navigator.next(self.active.pool.items())?;
        self.emit_shown();
        Some(prefetch)
    }

    pub fn previous(&mut self) -> Option<Prefetch> {
        let prefetch = self.navigator.previous(self.active.pool.items())?;
        self.emit_shown();
        Some(prefetch)
    }

    fn emit_shown(&self) {
        if let Some(item) = self.current_item() {
            self.events.emit(&Event::QuestionShown {
                variant: self.active.variant,
                index: self.navigator.current(),
                item_id: item.key().to_string(),
            });
        }
    }

    /// 絞り込み（先頭に戻る）。無効な条件なら何もしない
    pub fn apply_filter(&mut self, key: FilterKey) -> Option<ItemSet> {
        let set = self.active.pool.apply_filter(key)?;
        self.navigator.reset(self.active.pool.items());
        self.events.emit(&Event::FilterApplied {
            variant: self.active.variant,
            filter: key,
            count: set.len(),
        });
        Some(set)
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.active.pool.items().get(self.navigator.current())
    }

    /// 現在の問題の画像（失敗時はプレースホルダー）
    pub async fn current_image(&self) -> Option<ImageHandle> {
        let path = self.current_item()?.image_path.clone();
        Some(self.cache.load(&path).await)
    }

    /// 新しいシードで出題を作り直す（回答も破棄）
    pub fn regenerate(&mut self) -> Result<ItemSet> {
        self.regenerate_with_seed(generate_seed())
    }

    pub fn regenerate_with_seed(&mut self, seed: u64) -> Result<ItemSet> {
        self.ensure_regular("出題の再生成")?;

        let catalog = self.active.catalog.clone();
        let set = self.active.pool.regenerate_with_seed(&catalog, seed);
        self.active.answers.restart();
        self.navigator.reset(self.active.pool.items());

        self.events.emit(&Event::Regenerated {
            variant: self.active.variant,
            seed,
            count: set.len(),
        });
        Ok(set)
    }

    /// テストの版を切り替える（回答はリセット）
    ///
    /// 他の課題の回答は次にその課題を開いたときに切り替わる
    pub fn switch_version(&mut self, version: &str) -> bool {
        self.config.test.version = version.to_string();
        if !self.active.answers.switch_version(version) {
            return false;
        }
        info!(variant = %self.active.variant, version, "版を切り替え");
        self.navigator.reset(self.active.pool.items());
        true
    }

    /// 未回答の問題にランダムに回答
    pub fn quick_fill(&mut self) -> Result<QuickFill> {
        self.ensure_regular("一括回答")?;
        let filled = self
            .active
            .answers
            .quick_fill(self.active.pool.items(), &mut rand::rng());
        info!(selected = filled.selected, total = filled.total, "一括回答");
        Ok(filled)
    }

    /// 出題と回答を書き出す
    pub fn export(&self) -> Result<SessionExport> {
        self.ensure_regular("書き出し")?;
        Ok(SessionExport {
            task: self.active.variant,
            seed: self.active.pool.seed(),
            filter: self.active.pool.filter(),
            items: self.active.pool.items().to_vec(),
            answers: self.active.answers.answers().clone(),
            start_time: self.active.answers.start_time(),
            version: self.active.answers.version().to_string(),
            exported_at: now_ms(),
        })
    }

    /// 提出
    ///
    /// 課題の完了条件を満たしていなければ残り数を返す
    pub fn submit(&self) -> SubmitOutcome {
        let items = self.active.pool.items();
        let total = items.len();
        let answered = self.answered_count();
        let rule = self.config.variants.get(self.active.variant).completion;

        if !rule.is_met(answered, total) {
            return SubmitOutcome::Incomplete {
                remaining: rule.remaining(answered, total),
                answered,
                total,
            };
        }

        let result = score(
            items,
            self.active.answers.answers(),
            self.active.answers.start_time(),
            now_ms(),
            self.active.variant,
            self.active.answers.version(),
        );

        info!(
            variant = %self.active.variant,
            correct = result.correct_count,
            total = result.total_questions,
            "提出"
        );
        self.events.emit(&Event::Submitted {
            variant: self.active.variant,
            answered: result.answered_count,
            total: result.total_questions,
            correct: result.correct_count,
        });
        SubmitOutcome::Complete(result)
    }

    fn ensure_regular(&self, action: &str) -> Result<()> {
        if self.mode.is_regular() {
            Ok(())
        } else {
            Err(PaperfoldError::NotPermitted {
                action: action.to_string(),
                mode: self.mode.to_string(),
            })
        }
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn variant(&self) -> TaskVariant {
        self.active.variant
    }

    pub fn items(&self) -> &[Item] {
        self.active.pool.items()
    }

    pub fn item_set(&self) -> ItemSet {
        self.active.pool.item_set()
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.active.answers
    }

    /// 表示中の問題のうち回答済みの数
    pub fn answered_count(&self) -> usize {
        self.active.answers.count_for(self.active.pool.items())
    }

    pub fn current_index(&self) -> usize {
        self.navigator.current()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }
}
