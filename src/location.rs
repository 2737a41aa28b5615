//! データ取得元の判定
//!
//! `data_root` はローカルディレクトリか `http(s)://` のベースURL

/// HTTP(S)のURLか
pub fn is_remote(data_root: &str) -> bool {
    let lower = data_root.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// ベースURLと相対パスを `/` 1つで連結
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
