use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperfoldError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("カタログの読み込みに失敗: {location} ({reason})")]
    CatalogLoad { location: String, reason: String },

    #[error("問題データが空です: {0}")]
    EmptyCatalog(String),

    #[error("問題セットが見つかりません: setId={0}")]
    UnknownSet(String),

    #[error("現在のモード（{mode}）では「{action}」は使用できません")]
    NotPermitted { action: String, mode: String },

    #[error("招待コードモードにはsetIdが必要です")]
    MissingSetId,

    #[error("ストレージエラー: {0}")]
    Storage(String),

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] paperfold_common::Error),
}

pub type Result<T> = std::result::Result<T, PaperfoldError>;
