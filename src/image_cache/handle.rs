//! デコード済み画像のハンドル

use base64::Engine;
use image::DynamicImage;
use std::sync::Arc;

/// 読み込み失敗時に表示するSVG
const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg width="200" height="200" xmlns="http://www.w3.org/2000/svg">"##,
    r##"<rect width="100%" height="100%" fill="#f0f0f0"/>"##,
    r##"<text x="50%" y="50%" font-family="sans-serif" font-size="14" fill="#999" "##,
    r##"text-anchor="middle" dy=".3em">画像を読み込めませんでした</text></svg>"##,
);

#[derive(Debug)]
enum ImageData {
    Decoded(DynamicImage),
    Placeholder { data_uri: String },
}

/// 画像ハンドル（クローンは参照カウントのみ）
#[derive(Debug, Clone)]
pub struct ImageHandle {
    data: Arc<ImageData>,
}

impl ImageHandle {
    pub(crate) fn decoded(image: DynamicImage) -> Self {
        Self {
            data: Arc::new(ImageData::Decoded(image)),
        }
    }

    /// プレースホルダー（キャッシュごとに1つだけ作る）
    pub(crate) fn placeholder() -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(PLACEHOLDER_SVG);
        Self {
            data: Arc::new(ImageData::Placeholder {
                data_uri: format!("data:image/svg+xml;base64,{}", encoded),
            }),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(*self.data, ImageData::Placeholder { .. })
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        match &*self.data {
            ImageData::Decoded(image) => Some(image),
            ImageData::Placeholder { .. } => None,
        }
    }

    /// (幅, 高さ)。プレースホルダーはNone
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image().map(|img| (img.width(), img.height()))
    }

    /// プレースホルダーのdata URI
    pub fn data_uri(&self) -> Option<&str> {
        match &*self.data {
            ImageData::Placeholder { data_uri } => Some(data_uri),
            ImageData::Decoded(_) => None,
        }
    }

    /// 同じ画像を指しているか
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_data_uri() {
        let handle = ImageHandle::placeholder();
        assert!(handle.is_placeholder());
        assert!(handle.dimensions().is_none());
        let uri = handle.data_uri().unwrap();
        assert!(uri.starts_with("data:image/svg+xml;base64,"));

        let payload = uri.trim_start_matches("data:image/svg+xml;base64,");
        let svg = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(String::from_utf8(svg).unwrap(), PLACEHOLDER_SVG);
    }

    #[test]
    fn test_decoded_handle() {
        let handle = ImageHandle::decoded(DynamicImage::new_rgb8(4, 3));
        assert!(!handle.is_placeholder());
        assert_eq!(handle.dimensions(), Some((4, 3)));
        assert!(ImageHandle::ptr_eq(&handle, &handle.clone()));
        assert!(!ImageHandle::ptr_eq(&handle, &ImageHandle::placeholder()));
    }
}
