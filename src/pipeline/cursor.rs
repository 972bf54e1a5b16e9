// Scan cursor: position along the scan axis, its boundary policy, and the
// sample points laid out on the perpendicular axis.

use serde::{Deserialize, Serialize};

/// Which way the scan line travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAxis {
    /// A vertical line moving left/right; voices sit along y.
    Horizontal,
    /// A horizontal line moving up/down; voices sit along x.
    Vertical,
}

impl ScanAxis {
    /// (scan axis length, perpendicular axis length) for a frame.
    pub fn lengths(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            ScanAxis::Horizontal => (width, height),
            ScanAxis::Vertical => (height, width),
        }
    }

    /// Pixel coordinate of a sample point given its scan and perpendicular coordinates.
    pub fn to_xy(self, scan: u32, across: u32) -> (u32, u32) {
        match self {
            ScanAxis::Horizontal => (scan, across),
            ScanAxis::Vertical => (across, scan),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    Wrap,
    Bounce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLayout {
    /// Points at the centres of `v` equal bands.
    Centered,
    /// First and last points on the frame edges.
    Edge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Running,
}

/// `v` coordinates along an axis of length `len`, all within `[0, len-1]`.
pub fn sample_points(voices: usize, len: u32, layout: PointLayout) -> Vec<u32> {
    if voices == 0 || len == 0 {
        return Vec::new();
    }
    let last = (len - 1) as u64;
    let v = voices as u64;
    (0..v)
        .map(|i| {
            let p = match layout {
                // floor((i + 1/2) * len / v) without going through floats
                PointLayout::Centered => ((2 * i + 1) * len as u64) / (2 * v),
                PointLayout::Edge if v == 1 => len as u64 / 2,
                PointLayout::Edge => i * last / (v - 1),
            };
            p.min(last) as u32
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct CursorScanner {
    position: f64,
    direction: i8,
    state: PlayState,
}

impl CursorScanner {
    pub fn new(direction: i8) -> Self {
        Self {
            position: 0.0,
            direction: if direction < 0 { -1 } else { 1 },
            state: PlayState::Stopped,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlayState::Running
    }

    pub fn start(&mut self) {
        self.state = PlayState::Running;
    }

    /// Pause: the position is kept, so `start` resumes where it left off.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
    }

    pub fn set_direction(&mut self, direction: i8) {
        self.direction = if direction < 0 { -1 } else { 1 };
    }

    /// Back to the start of the axis without touching the play state.
    pub fn rewind(&mut self) {
        self.position = 0.0;
    }

    /// Called when the input source changes.
    pub fn reset(&mut self, direction: i8) {
        self.position = 0.0;
        self.set_direction(direction);
    }

    /// Move by `delta` pixels without changing the play state.
    pub fn jump(&mut self, delta: f64, len: u32, policy: BoundaryPolicy) {
        if len == 0 || !delta.is_finite() {
            return;
        }
        let len = len as f64;
        self.position = match policy {
            BoundaryPolicy::Wrap => (self.position + delta).rem_euclid(len),
            BoundaryPolicy::Bounce => (self.position + delta).clamp(0.0, len - 1.0),
        };
    }

    /// Integer pixel index of the cursor on an axis of length `len`.
    pub fn pixel(&self, len: u32) -> u32 {
        if len == 0 {
            return 0;
        }
        (self.position.max(0.0).floor() as u64).min(len as u64 - 1) as u32
    }

    /// One tick: `position += direction * speed`, then apply the boundary policy.
    pub fn advance(&mut self, speed: f64, len: u32, policy: BoundaryPolicy) {
        if len == 0 {
            return;
        }
        let len = len as f64;
        let next = self.position + self.direction as f64 * speed;
        match policy {
            BoundaryPolicy::Wrap => {
                let mut p = next.rem_euclid(len);
                // rem_euclid can round up to `len` for tiny negative inputs
                if p >= len {
                    p = 0.0;
                }
                self.position = p;
            }
            BoundaryPolicy::Bounce => {
                let max = len - 1.0;
                if max <= 0.0 {
                    self.position = 0.0;
                    return;
                }
                let mut p = next;
                while p > max || p < 0.0 {
                    p = if p > max { 2.0 * max - p } else { -p };
                    self.direction = -self.direction;
                }
                self.position = p;
            }
        }
    }
}

/// Rate limit for discrete onsets.
#[derive(Clone, Debug)]
pub struct OnsetGate {
    last: Option<f64>,
}

impl OnsetGate {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// True (and remembers `now`) when at least `min_interval` passed since
    /// the last accepted onset.
    pub fn try_fire(&mut self, now: f64, min_interval: f64) -> bool {
        match self.last {
            Some(last) if now - last < min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
