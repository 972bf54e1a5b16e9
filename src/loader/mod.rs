// Media acquisition: turns an input mode into a frame source.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SourceError;
use crate::pipeline::source::{Frame, FrameSource, LiveFeed};

pub mod still;
pub mod video;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    Image,
    Video,
    Webcam,
    Screen,
}

impl MediaMode {
    pub fn label(self) -> &'static str {
        match self {
            MediaMode::Image => "image",
            MediaMode::Video => "video",
            MediaMode::Webcam => "webcam",
            MediaMode::Screen => "screen",
        }
    }
}

/// A live capture device (camera, screen grabber). Opening may be refused.
pub trait CaptureDevice: Send {
    fn open(&mut self) -> Result<LiveFeed, SourceError>;
}

pub trait MediaAcquire {
    fn acquire(&mut self, mode: MediaMode) -> Result<FrameSource, SourceError>;
}

/// Everything the instrument knows how to open. Still images are decoded once
/// and cached, so switching back to the image mode is immediate.
#[derive(Default)]
pub struct MediaLibrary {
    image_path: Option<PathBuf>,
    image: Option<Arc<RgbaImage>>,
    video_path: Option<PathBuf>,
    webcam: Option<Box<dyn CaptureDevice>>,
    screen: Option<Box<dyn CaptureDevice>>,
}

impl MediaLibrary {
    pub fn new(image_path: Option<PathBuf>, video_path: Option<PathBuf>) -> Self {
        Self { image_path, video_path, ..Default::default() }
    }

    /// Seed with an already decoded still (tests, or a buffer from elsewhere).
    pub fn with_image(mut self, image: Arc<RgbaImage>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_capture(mut self, mode: MediaMode, device: Box<dyn CaptureDevice>) -> Self {
        match mode {
            MediaMode::Webcam => self.webcam = Some(device),
            MediaMode::Screen => self.screen = Some(device),
            MediaMode::Image | MediaMode::Video => {}
        }
        self
    }

    fn still(&mut self) -> Result<Arc<RgbaImage>, SourceError> {
        if let Some(image) = &self.image {
            return Ok(image.clone());
        }
        let path = self.image_path.as_ref().ok_or(SourceError::NotConfigured("image"))?;
        let image = still::load(path)?;
        self.image = Some(image.clone());
        Ok(image)
    }
}

impl MediaAcquire for MediaLibrary {
    fn acquire(&mut self, mode: MediaMode) -> Result<FrameSource, SourceError> {
        info!(mode = mode.label(), "acquiring source");
        match mode {
            MediaMode::Image => Ok(FrameSource::Static(Frame::new(self.still()?)?)),
            MediaMode::Video => {
                let path = self.video_path.as_ref().ok_or(SourceError::NotConfigured("video"))?;
                Ok(FrameSource::live(video::open(path)?))
            }
            MediaMode::Webcam | MediaMode::Screen => {
                let device = match mode {
                    MediaMode::Webcam => self.webcam.as_mut(),
                    _ => self.screen.as_mut(),
                };
                match device {
                    Some(device) => Ok(FrameSource::live(device.open()?)),
                    None => Err(SourceError::Unavailable(mode.label(), "no capture backend".into())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Denied;
    impl CaptureDevice for Denied {
        fn open(&mut self) -> Result<LiveFeed, SourceError> {
            Err(SourceError::Unavailable("webcam", "permission denied".into()))
        }
    }

    #[test]
    fn image_is_cached_after_first_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbaImage::new(4, 4).save(&path).unwrap();

        let mut lib = MediaLibrary::new(Some(path.clone()), None);
        assert!(lib.acquire(MediaMode::Image).is_ok());
        std::fs::remove_file(&path).unwrap();
        // second acquire never touches the disk
        assert!(lib.acquire(MediaMode::Image).is_ok());
    }

    #[test]
    fn missing_inputs_are_reported_not_panicked() {
        let mut lib = MediaLibrary::new(None, None).with_capture(MediaMode::Webcam, Box::new(Denied));
        assert!(matches!(lib.acquire(MediaMode::Image), Err(SourceError::NotConfigured("image"))));
        assert!(matches!(lib.acquire(MediaMode::Video), Err(SourceError::NotConfigured("video"))));
        assert!(matches!(lib.acquire(MediaMode::Webcam), Err(SourceError::Unavailable("webcam", _))));
        assert!(matches!(lib.acquire(MediaMode::Screen), Err(SourceError::Unavailable("screen", _))));
    }
}
