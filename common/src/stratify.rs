//! 層別化モジュール
//!
//! 画像パスから「折り回数（難易度）」と「形状」を取り出す。
//! 課題ごとにファイル配置が異なるため、抽出方法だけを差し替える。
//!
//! - task1: `circle_3_001.png` のようにファイル名に折り回数
//! - task2: `fold_1/`, `fold_2/`, `other/` のディレクトリで区分
//! - task3: `fold_<n>` ディレクトリ（n + 2 が折り回数）

use crate::types::TaskVariant;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FILE_STEPS: Regex = Regex::new(r"_([345])_").unwrap();
    static ref LEADING_SHAPE: Regex = Regex::new(r"^([a-zA-Z]+)_").unwrap();
    static ref FOLD_DIR: Regex = Regex::new(r"fold_(\d+)").unwrap();
}

/// 全課題共通の折り回数区分
const STEP_BUCKETS: &[u32] = &[3, 4, 5];

/// 層別化の次元を取り出す
pub trait Stratifier: Send + Sync {
    /// 折り回数。区分外は `buckets()` に含まれない値を返す
    fn steps(&self, image_path: &str) -> u32;

    /// 形状カテゴリ
    fn shape(&self, image_path: &str) -> String;

    /// 有効な折り回数区分（昇順）
    fn buckets(&self) -> &'static [u32] {
        STEP_BUCKETS
    }

    /// 表示用の区分名
    fn bucket_label(&self, steps: u32) -> String {
        format!("{}-step", steps)
    }
}

fn file_name(image_path: &str) -> &str {
    image_path.rsplit('/').next().unwrap_or("")
}

fn leading_shape(image_path: &str) -> String {
    LEADING_SHAPE
        .captures(file_name(image_path))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// task1: ファイル名の `_3_` / `_4_` / `_5_`
#[derive(Debug, Clone, Copy, Default)]
pub struct Task1Layout;

impl Stratifier for Task1Layout {
    fn steps(&self, image_path: &str) -> u32 {
        FILE_STEPS
            .captures(file_name(image_path))
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(3)
    }

    fn shape(&self, image_path: &str) -> String {
        leading_shape(image_path)
    }
}

/// task2: 折り種別ディレクトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct Task2Layout;

const TASK2_SHAPES: &[&str] = &["circle", "Hexagon", "House", "Rectangle", "square"];

impl Stratifier for Task2Layout {
    fn steps(&self, image_path: &str) -> u32 {
        if image_path.contains("fold_1/") {
            3
        } else if image_path.contains("fold_2/") {
            4
        } else if image_path.contains("other/") {
            5
        } else if image_path.contains("circle-id_") && image_path.contains("-fold_2-") {
            4
        } else {
            // `circle-id_*-fold_1-*` も含め既定はfold_1
            3
        }
    }

    fn shape(&self, image_path: &str) -> String {
        let name = file_name(image_path);
        TASK2_SHAPES
            .iter()
            .find(|s| name.starts_with(&format!("{}_", s)))
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn bucket_label(&self, steps: u32) -> String {
        match steps {
            3 => "fold_1".to_string(),
            4 => "fold_2".to_string(),
            5 => "other".to_string(),
            n => format!("{}-step", n),
        }
    }
}

/// task3: `fold_<n>` ディレクトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct Task3Layout;

impl Stratifier for Task3Layout {
    fn steps(&self, image_path: &str) -> u32 {
        FOLD_DIR
            .captures(image_path)
            .and_then(|c| c[1].parse::<u32>().ok())
            .map(|n| n + 2)
            .unwrap_or(0)
    }

    fn shape(&self, image_path: &str) -> String {
        leading_shape(image_path)
    }
}

static TASK1: Task1Layout = Task1Layout;
static TASK2: Task2Layout = Task2Layout;
static TASK3: Task3Layout = Task3Layout;

impl TaskVariant {
    /// 課題に対応する層別化
    pub fn stratifier(&self) -> &'static dyn Stratifier {
        match self {
            TaskVariant::Task1 => &TASK1,
            TaskVariant::Task2 => &TASK2,
            TaskVariant::Task3 => &TASK3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task1_steps_from_file_name() {
        let s = Task1Layout;
        assert_eq!(s.steps("task1/sel/circle_3_001.png"), 3);
        assert_eq!(s.steps("task1/sel/square_4_010.png"), 4);
        assert_eq!(s.steps("task1/sel/House_5_002.png"), 5);
        // ディレクトリ名の数字は見ない
        assert_eq!(s.steps("dir_4_x/circle_001.png"), 3);
    }

    #[test]
    fn test_task1_shape() {
        let s = Task1Layout;
        assert_eq!(s.shape("a/b/circle_3_001.png"), "circle");
        assert_eq!(s.shape("a/b/001.png"), "unknown");
    }

    #[test]
    fn test_task2_fold_directories() {
        let s = Task2Layout;
        assert_eq!(s.steps("task2/sel/fold_1/circle_036.png"), 3);
        assert_eq!(s.steps("task2/sel/fold_2/square_001.png"), 4);
        assert_eq!(s.steps("task2/sel/other/House_002.png"), 5);
        assert_eq!(s.steps("circle-id_3-fold_2-007.png"), 4);
        assert_eq!(s.steps("misc/circle_1.png"), 3);
        assert_eq!(s.bucket_label(5), "other");
    }

    #[test]
    fn test_task2_shape_prefixes() {
        let s = Task2Layout;
        assert_eq!(s.shape("fold_1/Hexagon_003.png"), "Hexagon");
        assert_eq!(s.shape("fold_1/Rectangle_003.png"), "Rectangle");
        assert_eq!(s.shape("fold_1/triangle_003.png"), "unknown");
    }

    #[test]
    fn test_task3_fold_number() {
        let s = Task3Layout;
        assert_eq!(s.steps("task3/sel/fold_1/circle_001.png"), 3);
        assert_eq!(s.steps("task3/sel/fold_3/circle_001.png"), 5);
        assert_eq!(s.steps("task3/sel/circle_001.png"), 0);
        assert!(!s.buckets().contains(&0));
    }

    #[test]
    fn test_variant_dispatch() {
        let path = "x/fold_2/circle_4_001.png";
        assert_eq!(TaskVariant::Task1.stratifier().steps(path), 4);
        assert_eq!(TaskVariant::Task2.stratifier().steps(path), 4);
        assert_eq!(TaskVariant::Task3.stratifier().steps(path), 4);
    }
}
