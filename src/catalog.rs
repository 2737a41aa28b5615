//! カタログ読み込み
//!
//! 通常モードは課題のJSONLカタログ全体、招待コードモードは
//! 問題セットファイルから指定setIdの1セットだけを読み込む。

use crate::config::VariantConfig;
use crate::error::{PaperfoldError, Result};
use crate::location::{is_remote, join_url};
use futures::future::{BoxFuture, FutureExt};
use paperfold_common::catalog::find_set;
use paperfold_common::{build_items, parse_jsonl, parse_question_sets, Item, SessionMode, TaskVariant};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// カタログ本文の取得元
pub trait CatalogSource: Send + Sync {
    fn load_text(&self, location: String) -> BoxFuture<'static, Result<String>>;
}

#[derive(Debug, Clone)]
pub struct FsCatalogSource {
    root: PathBuf,
}

impl FsCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CatalogSource for FsCatalogSource {
    fn load_text(&self, location: String) -> BoxFuture<'static, Result<String>> {
        let path = self.root.join(&location);
        async move {
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| PaperfoldError::CatalogLoad {
                    location: path.display().to_string(),
                    reason: e.to_string(),
                })
        }
        .boxed()
    }
}

#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl CatalogSource for HttpCatalogSource {
    fn load_text(&self, location: String) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let url = join_url(&self.base_url, &location);
        async move {
            let fetch = async {
                client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await
            };
            fetch.await.map_err(|e: reqwest::Error| PaperfoldError::CatalogLoad {
                location: url.clone(),
                reason: e.to_string(),
            })
        }
        .boxed()
    }
}

/// `data_root` に応じた取得元
pub fn catalog_source_for(data_root: &str) -> Arc<dyn CatalogSource> {
    if is_remote(data_root) {
        Arc::new(HttpCatalogSource::new(data_root))
    } else {
        Arc::new(FsCatalogSource::new(data_root))
    }
}

/// 課題のカタログを読み込んで問題リストにする
///
/// 取得・解析の失敗と空のカタログはエラー（代わりのデータは作らない）
pub async fn load_catalog(
    source: &dyn CatalogSource,
    config: &VariantConfig,
    variant: TaskVariant,
    mode: &SessionMode,
) -> Result<Vec<Item>> {
    let (location, items) = match mode {
        SessionMode::Regular => {
            let text = source.load_text(config.catalog.clone()).await?;
            let records = parse_jsonl(&text).map_err(|e| PaperfoldError::CatalogLoad {
                location: config.catalog.clone(),
                reason: e.to_string(),
            })?;
            let items = build_items(&records, variant, &config.image_base, variant.as_str());
            (config.catalog.clone(), items)
        }
        SessionMode::InviteScoped { set_id } => {
            let text = source.load_text(config.question_sets.clone()).await?;
            let sets = parse_question_sets(&text).map_err(|e| PaperfoldError::CatalogLoad {
                location: config.question_sets.clone(),
                reason: e.to_string(),
            })?;
            let set = find_set(&sets, set_id)
                .map_err(|_| PaperfoldError::UnknownSet(set_id.clone()))?;
            let prefix = format!("{}_set{}", variant, set.set_id);
            let items = build_items(&set.questions, variant, &config.image_base, &prefix);
            (config.question_sets.clone(), items)
        }
    };

    if items.is_empty() {
        return Err(PaperfoldError::EmptyCatalog(location));
    }

    info!(%variant, %mode, count = items.len(), "カタログを読み込みました");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn variant_config() -> VariantConfig {
        VariantConfig {
            catalog: "task1/catalog.jsonl".into(),
            question_sets: "task1/sets.json".into(),
            image_base: "task1/images/".into(),
            completion: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_load_regular_catalog() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("task1")).unwrap();
        std::fs::write(
            dir.path().join("task1/catalog.jsonl"),
            "{\"image\": \"circle_3_001.png\", \"answer\": \"A\"}\n{\"image\": \"square_4_002.png\", \"answer\": \"B\"}\n",
        )
        .unwrap();

        let source = FsCatalogSource::new(dir.path());
        let items = load_catalog(&source, &variant_config(), TaskVariant::Task1, &SessionMode::Regular)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("task1_1"));
        assert_eq!(items[0].image_path, "task1/images/circle_3_001.png");
        assert_eq!(items[1].steps, 4);
    }

    #[tokio::test]
    async fn test_load_invite_set() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("task1")).unwrap();
        std::fs::write(
            dir.path().join("task1/sets.json"),
            r#"[{"setId": 1, "questions": [{"image": "a_3_1.png", "answer": "C"}]},
                {"setId": "2", "questions": [{"image": "b_4_1.png"}, {"image": "b_5_2.png"}]}]"#,
        )
        .unwrap();

        let source = FsCatalogSource::new(dir.path());
        let mode = SessionMode::InviteScoped { set_id: "2".into() };
        let items = load_catalog(&source, &variant_config(), TaskVariant::Task1, &mode)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("task1_set2_1"));

        let missing = SessionMode::InviteScoped { set_id: "9".into() };
        let err = load_catalog(&source, &variant_config(), TaskVariant::Task1, &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, PaperfoldError::UnknownSet(id) if id == "9"));
    }

    #[tokio::test]
    async fn test_missing_and_empty_catalogs_are_errors() {
        let dir = tempdir().unwrap();
        let source = FsCatalogSource::new(dir.path());
        let err = load_catalog(&source, &variant_config(), TaskVariant::Task1, &SessionMode::Regular)
            .await
            .unwrap_err();
        assert!(matches!(err, PaperfoldError::CatalogLoad { .. }));

        std::fs::create_dir_all(dir.path().join("task1")).unwrap();
        std::fs::write(dir.path().join("task1/catalog.jsonl"), "\n\n").unwrap();
        let err = load_catalog(&source, &variant_config(), TaskVariant::Task1, &SessionMode::Regular)
            .await
            .unwrap_err();
        assert!(matches!(err, PaperfoldError::EmptyCatalog(_)));
    }
}
