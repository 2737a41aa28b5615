//! 対話式テスト
//!
//! 1問ずつ表示して回答を受け付ける。回答は選ぶたびに保存されるので、
//! 途中で終了しても次回は続きから再開できる。

use crate::error::{PaperfoldError, Result};
use crate::session::{Session, SubmitOutcome};
use dialoguer::Input;
use paperfold_common::{Choice, FilterKey, TaskVariant, TestResult};

/// 対話アクション
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAction {
    /// 回答
    Answer(Choice),
    Next,
    Previous,
    /// 1始まりの問題番号へ移動
    Jump(usize),
    Filter(FilterKey),
    Switch(TaskVariant),
    /// 版の切り替え
    Version(String),
    QuickFill,
    Regenerate,
    Export,
    Submit,
    Help,
    /// 保存して終了
    Quit,
    Unknown(String),
}

const HELP: &str = "操作: [A-D/1-4]回答 [Enter/n]次 [p]前 [g 番号]移動 [f all|3|4|5]絞り込み \
[t task1|task2|task3]課題切替 [v 版]版切替 [quick]一括回答 [regen]再生成 [export]書き出し [s]提出 [q]終了";

/// 入力文字列をアクションに変換
pub fn parse_action(input: &str) -> QuizAction {
    let trimmed = input.trim();
    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (trimmed, ""),
    };

    match (command, argument) {
        ("" | "n", "") => QuizAction::Next,
        ("p", "") => QuizAction::Previous,
        ("g", number) => match number.parse::<usize>() {
            Ok(n) if n > 0 => QuizAction::Jump(n),
            _ => QuizAction::Unknown(trimmed.to_string()),
        },
        ("f", key) => key
            .parse::<FilterKey>()
            .map(QuizAction::Filter)
            .unwrap_or_else(|_| QuizAction::Unknown(trimmed.to_string())),
        ("t", task) => task
            .parse::<TaskVariant>()
            .map(QuizAction::Switch)
            .unwrap_or_else(|_| QuizAction::Unknown(trimmed.to_string())),
        ("v", version) if !version.is_empty() => QuizAction::Version(version.to_string()),
        ("quick", "") => QuizAction::QuickFill,
        ("regen", "") => QuizAction::Regenerate,
        ("export", "") => QuizAction::Export,
        ("s", "") => QuizAction::Submit,
        ("h" | "?", "") => QuizAction::Help,
        ("q" | "Q", "") => QuizAction::Quit,
        (single, "") => single
            .parse::<Choice>()
            .map(QuizAction::Answer)
            .unwrap_or_else(|_| QuizAction::Unknown(trimmed.to_string())),
        _ => QuizAction::Unknown(trimmed.to_string()),
    }
}

/// 対話式でテストを実施
pub async fn run_interactive(session: &mut Session) -> Result<()> {
    println!("📝 {} / {}", session.variant(), session.mode());
    println!("{}", HELP);
    println!("---\n");

    loop {
        show_current(session).await;

        let input: String = Input::new()
            .with_prompt("操作")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| PaperfoldError::Prompt(e.to_string()))?;

        match parse_action(&input) {
            QuizAction::Answer(choice) => {
                if session.select(choice) {
                    println!("  → {}\n", choice);
                    session.next();
                } else if session.current_item().is_none() {
                    println!("  → 問題がありません\n");
                } else {
                    println!("  → 回答済みです（変更はできません）\n");
                }
            }
            QuizAction::Next => {
                if session.next().is_none() {
                    println!("  → 最後の問題です\n");
                }
            }
            QuizAction::Previous => {
                if session.previous().is_none() {
                    println!("  → 最初の問題です\n");
                }
            }
            QuizAction::Jump(number) => {
                if session.goto(number - 1).is_none() {
                    println!("  → 1〜{}で指定してください\n", session.items().len());
                }
            }
            QuizAction::Filter(key) => match session.apply_filter(key) {
                Some(set) => println!("  → 絞り込み: {}（{}問）\n", key, set.len()),
                None => println!("  → 該当する問題がありません\n"),
            },
            QuizAction::Switch(variant) => match session.switch_variant(variant).await {
                Ok(true) => println!("  → {}に切り替えました\n", variant),
                Ok(false) => println!("  → 既に{}です\n", variant),
                Err(e) => println!("  → 切り替えできません: {}\n", e),
            },
            QuizAction::Version(version) => {
                if session.switch_version(&version) {
                    println!("  → 版{}に切り替えました（回答をリセット）\n", version);
                } else {
                    println!("  → 既に版{}です\n", version);
                }
            }
            QuizAction::QuickFill => match session.quick_fill() {
                Ok(filled) => println!("  → {}/{}問に回答しました\n", filled.selected, filled.total),
                Err(e) => println!("  → {}\n", e),
            },
            QuizAction::Regenerate => match session.regenerate() {
                Ok(set) => println!("  → 出題を作り直しました（{}問、seed={:?}）\n", set.len(), set.seed),
                Err(e) => println!("  → {}\n", e),
            },
            QuizAction::Export => match session.export() {
                Ok(export) => println!("{}\n", serde_json::to_string_pretty(&export)?),
                Err(e) => println!("  → {}\n", e),
            },
            QuizAction::Submit => match session.submit() {
                SubmitOutcome::Incomplete { remaining, answered, total } => {
                    println!("  → あと{}問回答してください（{}/{}）\n", remaining, answered, total);
                }
                SubmitOutcome::Complete(result) => {
                    print_result(&result);
                    return Ok(());
                }
            },
            QuizAction::Help => println!("{}\n", HELP),
            QuizAction::Quit => {
                println!("保存して終了します...");
                return Ok(());
            }
            QuizAction::Unknown(text) => println!("  → 不明な操作: {}（hでヘルプ）\n", text),
        }
    }
}

async fn show_current(session: &Session) {
    let Some(item) = session.current_item().cloned() else {
        println!("問題がありません");
        return;
    };

    let image = match session.current_image().await {
        Some(handle) if handle.is_placeholder() => "（画像を読み込めませんでした）".to_string(),
        Some(handle) => handle
            .dimensions()
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_default(),
        None => String::new(),
    };

    let answered = session
        .answers()
        .get(item.key())
        .map(|c| format!(" 回答: {}", c))
        .unwrap_or_default();

    println!(
        "[{}/{}] {} {} (折り{}回){}",
        session.current_index() + 1,
        session.items().len(),
        item.image_path,
        image,
        item.steps,
        answered
    );
}

pub fn print_result(result: &TestResult) {
    println!("\n✅ 提出しました");
    println!("  課題: {} (版 {})", result.task, result.version);
    println!(
        "  正答: {}/{}（正答率 {:.2}%）",
        result.correct_count,
        result.questions_with_answers,
        result.accuracy_percent()
    );
    println!(
        "  回答: {}/{}（回答率 {:.2}%）",
        result.answered_count,
        result.total_questions,
        result.completion_percent()
    );
    println!(
        "  所要時間: {}秒（1問あたり {}秒）",
        result.total_time_ms / 1000,
        result.average_time_per_question_ms / 1000
    );
}
