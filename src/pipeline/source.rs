// The pixel side of the loop. A frame is an immutable RGBA buffer behind an
// Arc, so the renderer and the loop can hold the same frame without copying.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use image::RgbaImage;
use tracing::debug;

use crate::error::SourceError;

#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbaImage>,
}

impl Frame {
    /// Zero-sized images are rejected here so sampling never sees them.
    pub fn new(image: Arc<RgbaImage>) -> Result<Self, SourceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SourceError::Empty);
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    /// Normalised (r, g, b, a), coordinates clamped to the frame.
    pub fn pixel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width() as i64 - 1) as u32;
        let y = y.clamp(0, self.height() as i64 - 1) as u32;
        let image::Rgba(p) = *self.image.get_pixel(x, y);
        p.map(|c| c as f32 / 255.0)
    }

    pub fn brightness(&self, x: i64, y: i64) -> f32 {
        let [r, g, b, _] = self.pixel(x, y);
        (r + g + b) / 3.0
    }

    /// max - min brightness over the (2r+1)² window around (x, y), clipped to the frame.
    pub fn local_contrast(&self, x: i64, y: i64, radius: u32) -> f32 {
        let r = radius as i64;
        let x0 = (x - r).max(0);
        let x1 = (x + r).min(self.width() as i64 - 1);
        let y0 = (y - r).max(0);
        let y1 = (y + r).min(self.height() as i64 - 1);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for yy in y0..=y1 {
            for xx in x0..=x1 {
                let b = self.brightness(xx, yy);
                lo = lo.min(b);
                hi = hi.max(b);
            }
        }
        if hi < lo { 0.0 } else { hi - lo }
    }
}

/// Producer half of a live feed, handed to the capture/decoder thread.
pub struct FeedSender {
    tx: Sender<Arc<RgbaImage>>,
    stop: Arc<AtomicBool>,
}

impl FeedSender {
    /// Push a frame. A full channel drops the frame (the consumer only wants
    /// the latest one). Returns false once the consumer is gone or stopped.
    pub fn push(&self, frame: RgbaImage) -> bool {
        if self.is_stopped() {
            return false;
        }
        match self.tx.try_send(Arc::new(frame)) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Consumer half of a continuously updating frame source.
pub struct LiveFeed {
    rx: Receiver<Arc<RgbaImage>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    name: &'static str,
}

impl LiveFeed {
    pub fn channel(name: &'static str) -> (FeedSender, LiveFeed) {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let stop = Arc::new(AtomicBool::new(false));
        let sender = FeedSender { tx, stop: stop.clone() };
        (sender, LiveFeed { rx, stop, worker: None, name })
    }

    /// Run `produce` on its own thread; it should return once `push` fails.
    pub fn spawn<F>(name: &'static str, produce: F) -> std::io::Result<LiveFeed>
    where
        F: FnOnce(FeedSender) + Send + 'static,
    {
        let (sender, mut feed) = Self::channel(name);
        let worker = std::thread::Builder::new()
            .name(format!("feed-{name}"))
            .spawn(move || produce(sender))?;
        feed.worker = Some(worker);
        Ok(feed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Drain to the most recent frame. `Err` means the producer is gone.
    fn latest(&self) -> Result<Option<Arc<RgbaImage>>, ()> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return if latest.is_some() { Ok(latest) } else { Err(()) };
                }
            }
        }
    }

    /// Stop the producer and wait for it, releasing whatever device it held.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // unblock a producer parked on a full channel
        while self.rx.try_recv().is_ok() {}
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!(feed = self.name, "feed thread panicked");
            }
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.close();
    }
}

pub enum FrameSource {
    Static(Frame),
    Live { feed: LiveFeed, current: Option<Frame> },
}

impl FrameSource {
    pub fn live(feed: LiveFeed) -> Self {
        FrameSource::Live { feed, current: None }
    }

    /// The frame to sample this tick. `Ok(None)` is "not ready yet".
    pub fn current_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self {
            FrameSource::Static(frame) => Ok(Some(frame.clone())),
            FrameSource::Live { feed, current } => {
                match feed.latest() {
                    Ok(Some(image)) => match Frame::new(image) {
                        Ok(frame) => *current = Some(frame),
                        // an empty frame from a device is skipped, the last good one stays
                        Err(_) => debug!(feed = feed.name(), "skipped empty live frame"),
                    },
                    Ok(None) => {}
                    Err(()) if current.is_none() => return Err(SourceError::FeedEnded),
                    // ended after delivering frames: hold the last one
                    Err(()) => {}
                }
                Ok(current.clone())
            }
        }
    }

    pub fn close(&mut self) {
        if let FrameSource::Live { feed, .. } = self {
            feed.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_fn(w, h, |x, _| {
            let v = (x * 255 / (w - 1).max(1)) as u8;
            image::Rgba([v, v, v, 255])
        }))
    }

    #[test]
    fn empty_images_are_rejected() {
        assert!(matches!(Frame::new(Arc::new(RgbaImage::new(0, 4))), Err(SourceError::Empty)));
    }

    #[test]
    fn pixel_lookup_clamps_to_bounds() {
        let f = Frame::new(gradient(10, 4)).unwrap();
        assert_eq!(f.pixel(-5, -5), f.pixel(0, 0));
        assert_eq!(f.pixel(100, 100), f.pixel(9, 3));
        assert_eq!(f.brightness(9, 0), 1.0);
        assert_eq!(f.brightness(0, 0), 0.0);
    }

    #[test]
    fn contrast_on_flat_and_edge() {
        let flat = Frame::new(Arc::new(RgbaImage::from_pixel(8, 8, image::Rgba([90, 90, 90, 255])))).unwrap();
        assert_eq!(flat.local_contrast(4, 4, 5), 0.0);

        let edge = Frame::new(Arc::new(RgbaImage::from_fn(20, 20, |x, _| {
            if x < 10 { image::Rgba([0, 0, 0, 255]) } else { image::Rgba([255, 255, 255, 255]) }
        })))
        .unwrap();
        assert_eq!(edge.local_contrast(9, 0, 5), 1.0);
        assert_eq!(edge.local_contrast(2, 0, 5), 0.0);
        // window clipped at the corner
        assert_eq!(edge.local_contrast(19, 19, 5), 0.0);
    }

    #[test]
    fn live_feed_not_ready_then_latest_wins() {
        let (tx, feed) = LiveFeed::channel("test");
        let mut src = FrameSource::live(feed);
        assert!(matches!(src.current_frame(), Ok(None)));

        assert!(tx.push(RgbaImage::new(4, 4)));
        assert!(tx.push(RgbaImage::new(6, 3)));
        let frame = src.current_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (6, 3));

        // nothing new: the last frame stays current
        let frame = src.current_frame().unwrap().unwrap();
        assert_eq!(frame.width(), 6);

        drop(tx);
        assert!(src.current_frame().unwrap().is_some());
    }

    #[test]
    fn live_feed_that_never_delivers_reports_end() {
        let (tx, feed) = LiveFeed::channel("test");
        drop(tx);
        let mut src = FrameSource::live(feed);
        assert!(matches!(src.current_frame(), Err(SourceError::FeedEnded)));
    }

    #[test]
    fn closing_stops_the_producer_thread() {
        let feed = LiveFeed::spawn("loop", |tx| {
            while tx.push(RgbaImage::new(2, 2)) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        })
        .unwrap();
        let mut src = FrameSource::live(feed);
        src.close();
        // join returned, so the producer saw the stop flag
        if let FrameSource::Live { feed, .. } = &src {
            assert!(feed.worker.is_none());
        }
    }
}
