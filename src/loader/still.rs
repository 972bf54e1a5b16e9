use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::info;

use crate::error::SourceError;

// Decode an image from disk into an RGBA buffer, ready to be sampled
pub fn load(path: &Path) -> Result<Arc<RgbaImage>, SourceError> {
    let decoded = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(source) => SourceError::Io { path: path.to_path_buf(), source },
        source => SourceError::Decode { path: path.to_path_buf(), source },
    })?;
    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(SourceError::Empty);
    }
    info!(path = %path.display(), width = rgba.width(), height = rgba.height(), "image loaded");
    Ok(Arc::new(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_png_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30])).save(&path).unwrap();

        let img = load(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load(&path).unwrap_err(), SourceError::Decode { .. }));
    }
}
