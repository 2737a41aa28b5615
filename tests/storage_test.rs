//! 永続化テスト
//!
//! ファイルストレージでの保存・再読み込みと、回答ストアの復元を検証

use paperfold_common::{Choice, Item, SessionMode, TaskVariant};
use paperfold_runner::answers::{AnswerStore, PersistedAnswers};
use paperfold_runner::storage::{
    read_json, storage_key, write_json, FileStorage, SharedStorage, StateKind, Storage,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> SharedStorage {
    Arc::new(FileStorage::open(dir).expect("ストレージを開けない"))
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item {
            id: Some(format!("task1_{}", i + 1)),
            image: format!("circle_3_{:03}.png", i),
            image_path: format!("task1/circle_3_{:03}.png", i),
            answer: Some(Choice::A),
            shape: "circle".into(),
            steps: 3,
        })
        .collect()
}

/// 開き直しても同じ内容を読める
#[test]
fn test_file_storage_survives_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");

    open(dir.path()).set("paperfolding_answers_task1", "{\"x\":1}").unwrap();
    let reopened = open(dir.path());

    assert_eq!(
        reopened.get("paperfolding_answers_task1").as_deref(),
        Some("{\"x\":1}")
    );
    assert_eq!(reopened.keys(), vec!["paperfolding_answers_task1".to_string()]);
}

/// 一時ファイルはキー一覧に出ない
#[test]
fn test_file_storage_keys_ignore_other_files() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    storage.set("paperfolding_questions_task2", "{}").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "memo").unwrap();
    std::fs::write(dir.path().join("half.json.tmp"), "{").unwrap();

    assert_eq!(storage.keys(), vec!["paperfolding_questions_task2".to_string()]);
}

/// 存在しないキーの削除はエラーにしない
#[test]
fn test_remove_missing_key_is_ok() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());

    assert!(storage.remove("paperfolding_answers_task3").is_ok());
    assert!(storage.get("paperfolding_answers_task3").is_none());
}

/// 通常と招待コードの回答は別キーに保存される
#[test]
fn test_answers_isolated_by_mode_and_variant() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let invite = SessionMode::InviteScoped { set_id: "2".into() };

    let mut regular = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "A");
    let mut scoped = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &invite, "A");
    let mut other = AnswerStore::for_variant(storage.clone(), TaskVariant::Task2, &SessionMode::Regular, "A");
    regular.record("task1_1", Choice::B);
    scoped.record("task1_1", Choice::C);
    other.record("task2_1", Choice::D);

    assert_eq!(
        storage.keys(),
        vec![
            "paperfolding_answers_task1".to_string(),
            "paperfolding_answers_task1_set2".to_string(),
            "paperfolding_answers_task2".to_string(),
        ]
    );
    let reloaded = AnswerStore::for_variant(storage, TaskVariant::Task1, &invite, "A");
    assert_eq!(reloaded.get("task1_1"), Some(Choice::C));
}

/// 記号だけが違うsetIdでも別ファイルに保存される
#[test]
fn test_set_ids_differing_in_symbols_do_not_share_state() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let dotted = SessionMode::InviteScoped { set_id: "1.2".into() };
    let underscored = SessionMode::InviteScoped { set_id: "1_2".into() };

    let mut first = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &dotted, "A");
    first.record("q1", Choice::A);

    let second = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &underscored, "A");
    assert_eq!(second.get("q1"), None);
    assert_eq!(second.count(), 0);

    let reopened = open(dir.path());
    assert_eq!(
        reopened.keys(),
        vec!["paperfolding_answers_task1_set1.2".to_string()]
    );
    let again = AnswerStore::for_variant(reopened, TaskVariant::Task1, &dotted, "A");
    assert_eq!(again.get("q1"), Some(Choice::A));
}

/// 回答と開始時刻は再読み込みで復元される
#[test]
fn test_answers_reload_with_start_time() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());

    let mut first = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "B");
    first.record("task1_1", Choice::A);
    first.record("task1_2", Choice::D);

    let second = AnswerStore::for_variant(storage, TaskVariant::Task1, &SessionMode::Regular, "A");

    assert_eq!(second.count(), 2);
    assert_eq!(second.start_time(), first.start_time());
    assert_eq!(second.version(), "B");
    assert_eq!(second.count_for(&items(1)), 1);
}

/// 壊れた回答データは破棄して空から始める
#[test]
fn test_corrupt_answers_are_discarded() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let key = storage_key(StateKind::Answers, TaskVariant::Task1, &SessionMode::Regular);
    storage.set(&key, "[1, 2").unwrap();

    let store = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "A");

    assert_eq!(store.count(), 0);
    assert!(storage.get(&key).is_none());
}

/// clear はメモリのみ、clear_persisted は保存データも消す
#[test]
fn test_clear_versus_clear_persisted() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let mut store = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "A");
    store.record("task1_1", Choice::A);

    store.clear();
    assert_eq!(store.count(), 0);
    let saved: PersistedAnswers = read_json(storage.as_ref(), store.key()).unwrap().unwrap();
    assert_eq!(saved.answers.len(), 1);

    store.clear_persisted();
    assert!(storage.get(store.key()).is_none());
}

/// 一括回答は未回答だけを埋め、既存の回答は変えない
#[test]
fn test_quick_fill_keeps_existing() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let list = items(10);
    let mut store = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "A");
    store.record("task1_3", Choice::D);

    let filled = store.quick_fill(&list, &mut StdRng::seed_from_u64(1));

    assert_eq!(filled.selected, 9);
    assert_eq!(filled.total, 10);
    assert_eq!(store.get("task1_3"), Some(Choice::D));
    let saved: PersistedAnswers = read_json(storage.as_ref(), store.key()).unwrap().unwrap();
    assert_eq!(saved.answers.len(), 10);
}

/// 古い形式（answersなし）も読める
#[test]
fn test_answers_without_map_field() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = open(dir.path());
    let key = storage_key(StateKind::Answers, TaskVariant::Task2, &SessionMode::Regular);
    storage
        .set(&key, r#"{"startTime": 1700000000000, "version": "A", "timestamp": 1700000000000}"#)
        .unwrap();

    let store = AnswerStore::for_variant(storage, TaskVariant::Task2, &SessionMode::Regular, "B");

    assert_eq!(store.count(), 0);
    assert_eq!(store.start_time(), 1_700_000_000_000);
}

/// write_json はファイルに書けない場合falseを返す
#[test]
fn test_write_json_reports_failure() {
    let dir = tempdir().expect("Failed to create temp dir");
    let storage = FileStorage::open(&dir.path().join("state")).unwrap();
    std::fs::remove_dir_all(storage.dir()).unwrap();

    assert!(!write_json(&storage, "paperfolding_answers_task1", &BTreeMap::<String, u8>::new()));
}

proptest! {
    /// どの順序で記録しても、各問題の回答は最初の選択のまま
    #[test]
    fn prop_record_keeps_first_choice(
        picks in prop::collection::vec((0usize..6, 0usize..4), 0..40)
    ) {
        let storage: SharedStorage = Arc::new(paperfold_runner::storage::MemoryStorage::new());
        let mut store = AnswerStore::for_variant(storage.clone(), TaskVariant::Task1, &SessionMode::Regular, "A");
        let mut expected: BTreeMap<String, Choice> = BTreeMap::new();

        for (item, choice) in picks {
            let id = format!("task1_{}", item);
            let choice = Choice::ALL[choice];
            let recorded = store.record(&id, choice);
            prop_assert_eq!(recorded, !expected.contains_key(&id));
            expected.entry(id).or_insert(choice);
        }

        prop_assert_eq!(store.answers(), &expected);
        let reloaded = AnswerStore::for_variant(storage, TaskVariant::Task1, &SessionMode::Regular, "A");
        prop_assert_eq!(reloaded.answers(), &expected);
    }
}
