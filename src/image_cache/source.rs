//! 画像の取得元

use crate::error::{PaperfoldError, Result};
use crate::location::{is_remote, join_url};
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;

/// 画像バイト列の取得
pub trait ImageSource: Send + Sync {
    fn fetch(&self, location: String) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// ローカルディレクトリから読む
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for FsImageSource {
    fn fetch(&self, location: String) -> BoxFuture<'static, Result<Vec<u8>>> {
        let path = self.root.join(location.trim_start_matches('/'));
        async move { tokio::fs::read(path).await.map_err(PaperfoldError::from) }.boxed()
    }
}

/// HTTP(S)で取得する
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, location: String) -> BoxFuture<'static, Result<Vec<u8>>> {
        let client = self.client.clone();
        let url = join_url(&self.base_url, &location);
        async move {
            let response = client.get(&url).send().await?.error_for_status()?;
            Ok::<_, PaperfoldError>(response.bytes().await?.to_vec())
        }
        .boxed()
    }
}

/// `data_root` に応じた取得元
pub fn image_source_for(data_root: &str) -> Arc<dyn ImageSource> {
    if is_remote(data_root) {
        Arc::new(HttpImageSource::new(data_root))
    } else {
        Arc::new(FsImageSource::new(data_root))
    }
}
