//! paperfold-runner
//!
//! 紙折りテストのセッションエンジン（保存・画像キャッシュ・出題プール・回答・課題切り替え）

pub mod answers;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod image_cache;
pub mod location;
pub mod logging;
pub mod navigation;
pub mod pool;
pub mod quiz;
pub mod session;
pub mod storage;

pub use error::{PaperfoldError, Result};
pub use session::{Session, SessionDeps, SubmitOutcome};
