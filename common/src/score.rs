//! 採点モジュール

use crate::types::{Choice, Item, TaskVariant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 1問ごとの採点結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    /// 1始まりの出題番号
    pub index: usize,
    pub item_id: String,
    pub image_path: String,
    pub user_answer: Option<Choice>,
    pub correct_answer: Option<Choice>,
    pub is_correct: bool,
}

/// テスト結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub task: TaskVariant,
    pub version: String,
    pub total_questions: usize,
    pub answered_count: usize,
    pub correct_count: usize,
    /// 正答が分かっている問題数
    pub questions_with_answers: usize,
    /// 0.0〜1.0（正答付き問題が無ければ0）
    pub accuracy: f64,
    /// 0.0〜1.0
    pub completion_rate: f64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub total_time_ms: i64,
    pub average_time_per_question_ms: i64,
    pub details: Vec<ItemOutcome>,
}

impl TestResult {
    /// 表示用の正答率（%、小数2桁）
    pub fn accuracy_percent(&self) -> f64 {
        (self.accuracy * 10000.0).round() / 100.0
    }

    pub fn completion_percent(&self) -> f64 {
        (self.completion_rate * 10000.0).round() / 100.0
    }
}

/// 採点
///
/// `answers` は問題の同一性キー → 回答
pub fn score(
    items: &[Item],
    answers: &BTreeMap<String, Choice>,
    start_time_ms: i64,
    end_time_ms: i64,
    task: TaskVariant,
    version: &str,
) -> TestResult {
    let details: Vec<ItemOutcome> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let user_answer = answers.get(item.key()).copied();
            ItemOutcome {
                index: index + 1,
                item_id: item.key().to_string(),
                image_path: item.image_path.clone(),
                user_answer,
                correct_answer: item.answer,
                is_correct: item.answer.is_some() && user_answer == item.answer,
            }
        })
        .collect();

    let total_questions = items.len();
    let answered_count = details.iter().filter(|d| d.user_answer.is_some()).count();
    let correct_count = details.iter().filter(|d| d.is_correct).count();
    let questions_with_answers = items.iter().filter(|i| i.answer.is_some()).count();

    let accuracy = if questions_with_answers > 0 {
        correct_count as f64 / questions_with_answers as f64
    } else {
        0.0
    };
    let completion_rate = if total_questions > 0 {
        answered_count as f64 / total_questions as f64
    } else {
        0.0
    };

    let total_time_ms = (end_time_ms - start_time_ms).max(0);
    let average_time_per_question_ms = if answered_count > 0 {
        total_time_ms / answered_count as i64
    } else {
        0
    };

    TestResult {
        task,
        version: version.to_string(),
        total_questions,
        answered_count,
        correct_count,
        questions_with_answers,
        accuracy,
        completion_rate,
        start_time_ms,
        end_time_ms,
        total_time_ms,
        average_time_per_question_ms,
        details,
    }
}
