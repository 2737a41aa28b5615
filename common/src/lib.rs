//! Paper Folding Common Library
//!
//! セッションエンジンと各フロントエンドで共有される型と純粋ロジック
//! （I/Oを含まない）

pub mod types;
pub mod error;
pub mod random;
pub mod stratify;
pub mod select;
pub mod catalog;
pub mod score;

pub use types::{
    Choice, CompletionRule, FilterKey, Item, ItemSet, SessionDescriptor, SessionMode, TaskVariant,
};
pub use error::{Error, Result};
pub use random::{next_from, shuffle, SeededRandom};
pub use stratify::{Stratifier, Task1Layout, Task2Layout, Task3Layout};
pub use select::{build_base_set, catalog_fingerprint, filter_view};
pub use catalog::{build_items, parse_jsonl, parse_question_sets, CatalogRecord, QuestionSet};
pub use score::{score, ItemOutcome, TestResult};
