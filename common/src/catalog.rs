//! カタログパーサー
//!
//! - 通常モード: 1行1問のJSONL `{"image": "...", "answer": "A"}`
//! - 招待コードモード: 問題セット配列 `[{"setId": 1, "questions": [...]}]`

use crate::error::{Error, Result};
use crate::types::{Choice, Item, TaskVariant};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// カタログの1レコード
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(default)]
    pub id: Option<String>,

    pub image: String,

    /// 正答（無い問題もある）
    #[serde(default, alias = "correct_answer", alias = "correctAnswer")]
    pub answer: Option<String>,
}

/// 招待コードで割り当てられる問題セット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    #[serde(deserialize_with = "string_or_number")]
    pub set_id: String,

    #[serde(default)]
    pub questions: Vec<CatalogRecord>,
}

/// setIdは数値・文字列のどちらでも受け付ける
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("setIdが不正です: {}", other))),
    }
}

/// JSONLカタログをパース
///
/// 空行は無視する。不正な行があればその行番号付きでエラー
pub fn parse_jsonl(text: &str) -> Result<Vec<CatalogRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<CatalogRecord>(line.trim())
                .map_err(|e| Error::Parse(format!("{}行目: {}", index + 1, e)))
        })
        .collect()
}

/// 問題セット配列をパース
pub fn parse_question_sets(text: &str) -> Result<Vec<QuestionSet>> {
    serde_json::from_str(text).map_err(|e| Error::Parse(format!("問題セット: {}", e)))
}

/// setIdで問題セットを探す
pub fn find_set<'a>(sets: &'a [QuestionSet], set_id: &str) -> Result<&'a QuestionSet> {
    sets.iter()
        .find(|s| s.set_id == set_id.trim())
        .ok_or_else(|| Error::UnknownSet(set_id.to_string()))
}

/// 論理パスにベースパスを付ける
///
/// ベースが `/` で終わっていなければ補う
pub fn resolve_image_path(image_base: &str, image: &str) -> String {
    if image_base.is_empty() || image_base.ends_with('/') {
        format!("{}{}", image_base, image)
    } else {
        format!("{}/{}", image_base, image)
    }
}

/// レコードから問題を組み立てる
///
/// # Arguments
/// * `records` - パース済みレコード
/// * `variant` - 課題（形状・折り回数の抽出方法を決める）
/// * `image_base` - 課題ごとの画像ベースパス
/// * `id_prefix` - idの無いレコードに付ける接頭辞（`task1` → `task1_1`, `task1_2`, ...）
pub fn build_items(
    records: &[CatalogRecord],
    variant: TaskVariant,
    image_base: &str,
    id_prefix: &str,
) -> Vec<Item> {
    let stratifier = variant.stratifier();

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let image_path = resolve_image_path(image_base, &record.image);
            Item {
                id: Some(
                    record
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", id_prefix, index + 1)),
                ),
                answer: record.answer.as_deref().and_then(|a| a.parse::<Choice>().ok()),
                shape: stratifier.shape(&image_path),
                steps: stratifier.steps(&image_path),
                image: record.image.clone(),
                image_path,
            }
        })
        .collect()
}
