use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paperfold_common::{build_base_set, ItemSet, SessionDescriptor, SessionMode, TaskVariant};
use paperfold_runner::answers::PersistedAnswers;
use paperfold_runner::catalog::{catalog_source_for, load_catalog};
use paperfold_runner::cli::{Cli, Commands};
use paperfold_runner::config::Config;
use paperfold_runner::pool::PersistedPool;
use paperfold_runner::storage::{read_json, storage_key, FileStorage, StateKind, Storage};
use paperfold_runner::{logging, quiz, Session, SessionDeps};

const STATE_PREFIX: &str = "paperfolding_";

fn descriptor_for(set_id: Option<String>) -> SessionDescriptor {
    match set_id {
        Some(id) => SessionDescriptor::invite(id),
        None => SessionDescriptor::regular(),
    }
}

fn format_time(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load()?;
    if let Some(data_root) = cli.data_root.clone() {
        config.data_root = data_root;
    }

    match cli.command {
        Commands::Run { task, set_id } => {
            println!("🧩 paperfold - 紙折りテスト\n");

            let deps = SessionDeps::from_config(config)?;
            let mut session = Session::start(&descriptor_for(set_id), task, deps)
                .await
                .context("セッションを開始できません")?;
            println!(
                "✔ {}問（回答済み {}問）\n",
                session.items().len(),
                session.answered_count()
            );

            quiz::run_interactive(&mut session).await?;
        }

        Commands::Sample { task, seed, target } => {
            let source = catalog_source_for(&config.data_root);
            let catalog = load_catalog(
                source.as_ref(),
                config.variants.get(task),
                task,
                &SessionMode::Regular,
            )
            .await?;

            let target = target.unwrap_or(config.test.max_questions);
            let items = build_base_set(&catalog, seed, target, task.stratifier().buckets());
            let set = ItemSet {
                variant: task,
                items,
                seed: Some(seed),
                filter: Default::default(),
            };
            println!("{}", serde_json::to_string_pretty(&set)?);
        }

        Commands::Status => {
            let dir = config.storage_dir()?;
            let storage = FileStorage::open(&dir)?;
            println!("保存先: {}\n", dir.display());

            let keys: Vec<String> = storage
                .keys()
                .into_iter()
                .filter(|k| k.starts_with(STATE_PREFIX))
                .collect();
            if keys.is_empty() {
                println!("保存済みの状態はありません");
            }

            for key in keys {
                if key.starts_with("paperfolding_questions_") {
                    match read_json::<PersistedPool>(&storage, &key) {
                        Some(Ok(pool)) => println!(
                            "  {}: {}問 / 基本{}問 seed={} filter={} ({})",
                            key,
                            pool.items.len(),
                            pool.base_items.len(),
                            pool.seed.map(|s| s.to_string()).unwrap_or_else(|| "固定".into()),
                            pool.filter,
                            format_time(pool.timestamp)
                        ),
                        _ => println!("  {}: 読み込めません", key),
                    }
                } else if key.starts_with("paperfolding_answers_") {
                    match read_json::<PersistedAnswers>(&storage, &key) {
                        Some(Ok(answers)) => println!(
                            "  {}: 回答{}件 版{} 開始 {}",
                            key,
                            answers.answers.len(),
                            answers.version,
                            format_time(answers.start_time)
                        ),
                        _ => println!("  {}: 読み込めません", key),
                    }
                }
            }
        }

        Commands::Reset { task, set_id, all } => {
            let storage = FileStorage::open(&config.storage_dir()?)?;

            let keys: Vec<String> = if all {
                storage
                    .keys()
                    .into_iter()
                    .filter(|k| k.starts_with(STATE_PREFIX))
                    .collect()
            } else {
                let task: TaskVariant = task.context("--task か --all を指定してください")?;
                let mode = descriptor_for(set_id)
                    .mode()
                    .context("setIdが不正です")?;
                vec![
                    storage_key(StateKind::Questions, task, &mode),
                    storage_key(StateKind::Answers, task, &mode),
                ]
            };

            for key in &keys {
                storage.remove(key)?;
                println!("✔ 削除: {}", key);
            }
        }

        Commands::Check { task, set_id } => {
            println!("🔍 paperfold - 画像チェック\n");

            let deps = SessionDeps::from_config(config)?;
            let session = Session::start(&descriptor_for(set_id), task, deps).await?;
            let items = session.items().to_vec();

            let bar = ProgressBar::new(items.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
                bar.set_style(style.progress_chars("#>-"));
            }

            let mut failed = Vec::new();
            for item in &items {
                bar.set_message(item.image.clone());
                let handle = session.cache().load(&item.image_path).await;
                if handle.is_placeholder() {
                    failed.push(item.image_path.clone());
                }
                bar.inc(1);
            }
            bar.finish_and_clear();

            if failed.is_empty() {
                println!("✅ {}枚すべて読み込めました", items.len());
            } else {
                println!("⚠ {}/{}枚が読み込めません:", failed.len(), items.len());
                for path in &failed {
                    println!("  - {}", path);
                }
            }
        }

        Commands::Config { set, show } => {
            let mut config = config;

            if let Some(pair) = set {
                let (key, value) = pair
                    .split_once('=')
                    .context("key=value の形式で指定してください")?;
                config.set(key.trim(), value.trim())?;
                config.save()?;
                println!("✔ {} を設定しました", key.trim());
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
