use clap::{Parser, Subcommand};
use paperfold_common::TaskVariant;

#[derive(Parser)]
#[command(name = "paperfold")]
#[command(about = "紙折りテスト（メンタルペーパーフォールディング）実行ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// カタログと画像の取得元（設定ファイルの data_root を上書き）
    #[arg(long, global = true)]
    pub data_root: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 対話式でテストを実施
    Run {
        /// 課題 (task1/task2/task3)
        #[arg(short, long, default_value = "task1")]
        task: TaskVariant,

        /// 招待コードの問題セットID（指定時は招待コードモード）
        #[arg(short, long)]
        set_id: Option<String>,
    },

    /// シードから基本セットを作ってJSONで表示（保存しない）
    Sample {
        /// 課題 (task1/task2/task3)
        #[arg(short, long, default_value = "task1")]
        task: TaskVariant,

        /// シード
        #[arg(long, required = true)]
        seed: u64,

        /// 問題数（省略時は設定の max_questions）
        #[arg(long)]
        target: Option<usize>,
    },

    /// 保存済みの出題セットと回答を表示
    Status,

    /// 保存済みの状態を削除
    Reset {
        /// 課題（省略時は --all が必要）
        #[arg(short, long)]
        task: Option<TaskVariant>,

        /// 招待コードの問題セットID
        #[arg(short, long)]
        set_id: Option<String>,

        /// すべての課題・モードの状態を削除
        #[arg(long)]
        all: bool,
    },

    /// 出題セットの画像をすべて読み込んで確認
    Check {
        /// 課題 (task1/task2/task3)
        #[arg(short, long, default_value = "task1")]
        task: TaskVariant,

        /// 招待コードの問題セットID
        #[arg(short, long)]
        set_id: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を変更（key=value）
        #[arg(long)]
        set: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
