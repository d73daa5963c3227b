use std::sync::Arc;

use image::RgbImage;
use tracing::debug;

use crate::error::{AssetError, Result};
use crate::video::types::ImageSource;

/// Decodes scene images (PNG/JPEG) into RGB buffers
pub struct ImageLoader;

impl ImageLoader {
    /// Decode one image on the blocking pool
    pub async fn load(scene: usize, source: ImageSource) -> Result<Arc<RgbImage>> {
        tokio::task::spawn_blocking(move || Self::decode(scene, &source))
            .await
            .map_err(|e| AssetError::ImageLoadFailed {
                scene,
                reason: e.to_string(),
            })?
    }

    /// Decode every source concurrently, keeping input order.
    ///
    /// All decodes are started before any is awaited; the first failure (in
    /// scene order) is returned.
    pub async fn load_all(sources: Vec<ImageSource>) -> Result<Vec<Arc<RgbImage>>> {
        let handles: Vec<_> = sources
            .into_iter()
            .enumerate()
            .map(|(scene, source)| tokio::spawn(Self::load(scene, source)))
            .collect();

        let mut images = Vec::with_capacity(handles.len());
        for (scene, handle) in handles.into_iter().enumerate() {
            let image = handle.await.map_err(|e| AssetError::ImageLoadFailed {
                scene,
                reason: e.to_string(),
            })??;
            images.push(image);
        }
        Ok(images)
    }

    /// Decode synchronously
    pub fn decode(scene: usize, source: &ImageSource) -> Result<Arc<RgbImage>> {
        let decoded = match source {
            ImageSource::File(path) => image::open(path),
            ImageSource::Encoded(bytes) => image::load_from_memory(bytes),
        }
        .map_err(|e| AssetError::ImageLoadFailed {
            scene,
            reason: format!("{}: {}", source.describe(), e),
        })?;

        let rgb = decoded.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(AssetError::ImageLoadFailed {
                scene,
                reason: format!("{}: image has no pixels", source.describe()),
            }
            .into());
        }

        debug!("Decoded scene {} image {}x{}", scene, rgb.width(), rgb.height());
        Ok(Arc::new(rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_load_all_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene_1.png");
        std::fs::write(&path, png_bytes(3, 5, [0, 255, 0])).unwrap();

        let images = ImageLoader::load_all(vec![
            ImageSource::from(png_bytes(2, 2, [255, 0, 0])),
            ImageSource::File(path),
        ])
        .await
        .unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(images[1].dimensions(), (3, 5));
    }

    #[tokio::test]
    async fn test_one_bad_image_fails_all() {
        let result = ImageLoader::load_all(vec![
            ImageSource::from(png_bytes(2, 2, [255, 0, 0])),
            ImageSource::from(b"definitely not a png".to_vec()),
        ])
        .await;

        match result {
            Err(crate::error::CompositorError::Asset(AssetError::ImageLoadFailed { scene, .. })) => {
                assert_eq!(scene, 1)
            }
            other => panic!("expected image load failure, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_missing_file() {
        let source = ImageSource::File("/nonexistent/scene.png".into());
        assert!(ImageLoader::decode(0, &source).is_err());
    }
}
