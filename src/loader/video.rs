// Animated GIFs stand in for a video element: decoded on a worker thread,
// looped forever, paced by each frame's own delay.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::pipeline::source::{FeedSender, LiveFeed};

// browsers clamp tiny GIF delays the same way
const MIN_DELAY: Duration = Duration::from_millis(20);
const STOP_POLL: Duration = Duration::from_millis(10);

fn open_decoder(path: &Path) -> Result<GifDecoder<BufReader<File>>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Io { path: path.to_path_buf(), source })?;
    GifDecoder::new(BufReader::new(file))
        .map_err(|source| SourceError::Decode { path: path.to_path_buf(), source })
}

/// Validate the file up front, then stream it from a worker thread.
pub fn open(path: &Path) -> Result<LiveFeed, SourceError> {
    open_decoder(path)?;
    let path = path.to_path_buf();
    info!(path = %path.display(), "video feed starting");
    LiveFeed::spawn("video", move |tx| play_looped(&path, &tx))
        .map_err(|source| SourceError::Unavailable("video", source.to_string()))
}

fn play_looped(path: &Path, tx: &FeedSender) {
    loop {
        let decoder = match open_decoder(path) {
            Ok(d) => d,
            Err(e) => {
                warn!("video feed stopped: {e}");
                return;
            }
        };
        let mut delivered = 0usize;
        for frame in decoder.into_frames() {
            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    warn!("video frame decode failed: {e}");
                    return;
                }
            };
            let (num, den) = frame.delay().numer_denom_ms();
            let delay = Duration::from_millis((num / den.max(1)) as u64).max(MIN_DELAY);
            if !tx.push(frame.into_buffer()) {
                return;
            }
            delivered += 1;
            if !sleep_unless_stopped(delay, tx) {
                return;
            }
        }
        if delivered == 0 {
            warn!(path = %path.display(), "video has no frames");
            return;
        }
    }
}

// sleep in short slices so closing the feed never waits a whole frame delay
fn sleep_unless_stopped(delay: Duration, tx: &FeedSender) -> bool {
    let until = Instant::now() + delay;
    while Instant::now() < until {
        if tx.is_stopped() {
            return false;
        }
        std::thread::sleep(STOP_POLL.min(until.saturating_duration_since(Instant::now())));
    }
    !tx.is_stopped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::FrameSource;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame as GifFrame, Rgba, RgbaImage};

    fn write_gif(path: &Path, frames: &[(u32, u32)]) {
        let file = File::create(path).unwrap();
        let mut enc = GifEncoder::new(file);
        for &(w, h) in frames {
            let buf = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255]));
            enc.encode_frame(GifFrame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(20, 1)))
                .unwrap();
        }
    }

    #[test]
    fn streams_frames_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        write_gif(&path, &[(5, 4), (5, 4)]);

        let mut src = FrameSource::live(open(&path).unwrap());
        let deadline = Instant::now() + Duration::from_secs(5);
        let frame = loop {
            if let Some(f) = src.current_frame().unwrap() {
                break f;
            }
            assert!(Instant::now() < deadline, "no frame arrived");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!((frame.width(), frame.height()), (5, 4));
        src.close();
    }

    #[test]
    fn bad_file_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gif");
        std::fs::write(&path, b"GIF? no").unwrap();
        assert!(matches!(open(&path), Err(SourceError::Decode { .. })));
        assert!(matches!(open(&dir.path().join("missing.gif")), Err(SourceError::Io { .. })));
    }
}
