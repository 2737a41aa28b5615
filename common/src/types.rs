//! テストの型定義
//!
//! CLIと他のフロントエンドで共有される型:
//! - Item: 1問分（画像・正答・形状・折り回数）
//! - ItemSet: シードから導出された出題セット
//! - TaskVariant / SessionMode: 課題の種類とセッションモード

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 回答の選択肢
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    pub const ALL: [Choice; 4] = [Choice::A, Choice::B, Choice::C, Choice::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }
}

impl FromStr for Choice {
    type Err = String;

    /// `A`〜`D`（大文字小文字不問）とキーボード入力の `1`〜`4` を受け付ける
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" | "1" => Ok(Choice::A),
            "B" | "2" => Ok(Choice::B),
            "C" | "3" => Ok(Choice::C),
            "D" | "4" => Ok(Choice::D),
            _ => Err(format!("Unknown choice: {}. Use A, B, C or D", s)),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1問分のデータ。カタログ読み込み後は不変
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: Option<String>,

    /// カタログ上の論理パス
    pub image: String,

    /// 課題ごとのベースパスを付けた取得用パス
    pub image_path: String,

    #[serde(default)]
    pub answer: Option<Choice>,

    /// 形状（circle, square, ...）
    #[serde(default)]
    pub shape: String,

    /// 折り回数（難易度）
    #[serde(default)]
    pub steps: u32,
}

impl Item {
    /// 同一性キー: idがあればid、なければ画像パス
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.image_path)
    }
}

/// 課題の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskVariant {
    Task1,
    Task2,
    Task3,
}

impl TaskVariant {
    pub const ALL: [TaskVariant; 3] = [TaskVariant::Task1, TaskVariant::Task2, TaskVariant::Task3];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskVariant::Task1 => "task1",
            TaskVariant::Task2 => "task2",
            TaskVariant::Task3 => "task3",
        }
    }
}

impl FromStr for TaskVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "task1" | "1" => Ok(TaskVariant::Task1),
            "task2" | "2" => Ok(TaskVariant::Task2),
            "task3" | "3" => Ok(TaskVariant::Task3),
            _ => Err(format!("Unknown task: {}. Use task1, task2 or task3", s)),
        }
    }
}

impl fmt::Display for TaskVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 絞り込み条件: 全問 or 折り回数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterKey {
    #[default]
    All,
    Steps(u32),
}

impl FromStr for FilterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(FilterKey::All);
        }
        s.parse::<u32>()
            .map(FilterKey::Steps)
            .map_err(|_| format!("Unknown filter: {}. Use all or a step count", s))
    }
}

impl TryFrom<String> for FilterKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterKey> for String {
    fn from(key: FilterKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKey::All => f.write_str("all"),
            FilterKey::Steps(n) => write!(f, "{}", n),
        }
    }
}

/// 出題セット（順序付き・重複なし）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSet {
    pub variant: TaskVariant,
    pub items: Vec<Item>,
    /// 招待コードの固定セットはシード由来ではない
    pub seed: Option<u64>,
    pub filter: FilterKey,
}

impl ItemSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// セッションモード（セッション中は不変）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SessionMode {
    /// 共有カタログから出題。全機能が有効
    Regular,
    /// 割り当て済みの1セットのみ。再生成・一括回答・書き出しは無効
    InviteScoped { set_id: String },
}

impl SessionMode {
    pub fn is_regular(&self) -> bool {
        matches!(self, SessionMode::Regular)
    }

    pub fn set_id(&self) -> Option<&str> {
        match self {
            SessionMode::Regular => None,
            SessionMode::InviteScoped { set_id } => Some(set_id),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Regular => f.write_str("regular"),
            SessionMode::InviteScoped { set_id } => write!(f, "invite(set {})", set_id),
        }
    }
}

/// セッション開始時に呼び出し側が渡す記述子
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub is_regular_mode: bool,
    #[serde(default)]
    pub set_id: Option<String>,
}

impl SessionDescriptor {
    pub fn regular() -> Self {
        Self {
            is_regular_mode: true,
            set_id: None,
        }
    }

    pub fn invite(set_id: impl Into<String>) -> Self {
        Self {
            is_regular_mode: false,
            set_id: Some(set_id.into()),
        }
    }

    /// 招待コードモードでsetIdが無い場合はNone
    pub fn mode(&self) -> Option<SessionMode> {
        if self.is_regular_mode {
            return Some(SessionMode::Regular);
        }
        self.set_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| SessionMode::InviteScoped { set_id: id.trim().to_string() })
    }
}

/// 提出可能とみなす条件（課題ごと）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionRule {
    /// 全問回答必須
    #[default]
    All,
    /// 指定数以上で提出可（出題数が少なければ全問）
    Minimum(usize),
}

impl CompletionRule {
    /// 提出までに残っている回答数
    pub fn remaining(&self, answered: usize, total: usize) -> usize {
        let required = match self {
            CompletionRule::All => total,
            CompletionRule::Minimum(n) => (*n).min(total),
        };
        required.saturating_sub(answered)
    }

    pub fn is_met(&self, answered: usize, total: usize) -> bool {
        self.remaining(answered, total) == 0
    }
}
