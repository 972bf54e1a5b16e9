// The sonification loop. Owns the config, the current frame source, the scan
// cursor and the voice pool; the TUI and MIDI only ever talk to it through
// `handle_control`, and the main loop calls `tick` once per display refresh.
// Both return the audio commands to forward to the engine.

use tracing::{debug, info, warn};

use crate::audio_api::{AudioCommand, Envelope};
use crate::error::SourceError;
use crate::loader::{MediaAcquire, MediaMode};
use crate::pipeline::config::{Config, TriggerMode};
use crate::pipeline::cursor::{
    sample_points, BoundaryPolicy, CursorScanner, OnsetGate, PointLayout, ScanAxis,
};
use crate::pipeline::pitch::{self, PitchClass, PitchPolicy, ScaleKind};
use crate::pipeline::source::FrameSource;
use crate::pipeline::voice_pool::VoicePool;
use crate::shared::{ControlEvent, DisplayState, Overlay, PanelField, VoiceReading};

const CONTRAST_RADIUS: u32 = 5;
const VOLUME_STEP_DB: f32 = 3.0;
const SPEED_STEP: f32 = 1.25;

/// Higher contrast → snappier attack and a longer ring.
pub fn contrast_envelope(contrast: f32) -> Envelope {
    let c = if contrast.is_nan() { 0.0 } else { contrast.clamp(0.0, 1.0) };
    Envelope {
        attack: 0.08 - 0.075 * c,
        release: 0.15 + 0.85 * c,
    }
}

// what the sample layout was last computed from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LayoutKey {
    voices: usize,
    axis: ScanAxis,
    scan_len: u32,
    across: u32,
    layout: PointLayout,
}

pub struct Middle {
    config: Config,
    media: Box<dyn MediaAcquire>,
    mode: MediaMode,
    source: Option<FrameSource>,
    cursor: CursorScanner,
    pool: VoicePool,
    layout_key: Option<LayoutKey>,
    points: Vec<u32>,
    frame_size: Option<(u32, u32)>,
    gate: OnsetGate,
    last_pixel: Option<u32>,
    clock: f64,
    display: DisplayState,
}

impl Middle {
    pub fn new(config: Config, media: Box<dyn MediaAcquire>, mode: MediaMode) -> Self {
        let display = DisplayState {
            playing: false,
            source: mode,
            ready: false,
            status: String::new(),
            config: config.clone(),
            readings: Vec::new(),
            overlay: Overlay::default(),
            midi_input: None,
        };
        let mut middle = Self {
            cursor: CursorScanner::new(config.direction()),
            pool: VoicePool::new(config.waveform(), config.volume_db()),
            config,
            media,
            mode,
            source: None,
            layout_key: None,
            points: Vec::new(),
            frame_size: None,
            gate: OnsetGate::new(),
            last_pixel: None,
            clock: 0.0,
            display,
        };
        middle.select_source(mode);
        middle
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.display
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn cursor(&self) -> &CursorScanner {
        &self.cursor
    }

    pub fn set_midi_input(&mut self, name: Option<String>) {
        self.display.midi_input = name;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.display.status = status.into();
    }

    // ── control ──────────────────────────────────────────────────────

    pub fn handle_control(&mut self, event: ControlEvent) -> Vec<AudioCommand> {
        match event {
            ControlEvent::TogglePlay => {
                if self.cursor.is_running() {
                    self.pause();
                } else {
                    self.cursor.start();
                }
            }
            ControlEvent::Play => self.cursor.start(),
            ControlEvent::Pause | ControlEvent::Hidden => self.pause(),
            ControlEvent::Stop => {
                self.pause();
                self.rewind();
            }
            ControlEvent::Rewind => self.rewind(),
            ControlEvent::Jump(delta) => {
                if let Some((w, h)) = self.frame_size {
                    let (len, _) = self.config.axis().lengths(w, h);
                    self.cursor.jump(delta, len, self.config.boundary());
                }
            }
            ControlEvent::Adjust(field, steps) => self.adjust(field, steps),
            ControlEvent::SetVolume(db) => self.config.set_volume_db(db),
            ControlEvent::SetOctave(o) => self.config.set_octave(o),
            ControlEvent::SetBaseNote(pc) => self.config.set_base_note(pc),
            ControlEvent::SetWaveform(w) => self.config.set_waveform(w),
            ControlEvent::SetVoices(n) => self.config.set_voices(n),
            ControlEvent::SetSpeed(s) => self.config.set_speed(s),
            ControlEvent::SelectSource(mode) => self.select_source(mode),
            // owned by the MIDI handler and main loop
            ControlEvent::NextMidiInput | ControlEvent::Quit => {}
        }
        self.refresh_display();
        self.pool.drain_commands()
    }

    fn pause(&mut self) {
        // idempotent: a second pause just re-sends the release
        self.cursor.stop();
        self.pool.release_all();
    }

    fn rewind(&mut self) {
        self.cursor.rewind();
        self.last_pixel = None;
    }

    fn adjust(&mut self, field: PanelField, steps: i32) {
        let c = &mut self.config;
        let toggle = steps % 2 != 0;
        match field {
            PanelField::Volume => c.set_volume_db(c.volume_db() + steps as f32 * VOLUME_STEP_DB),
            PanelField::Octave => c.set_octave(c.octave() + steps),
            PanelField::BaseNote => {
                c.set_base_note(PitchClass::wrapping(c.base_note().index() as i32 + steps))
            }
            PanelField::Scale => {
                let kind = c.scale_kind().unwrap_or(ScaleKind::Chromatic);
                c.set_scale_kind(kind.step(steps));
            }
            PanelField::Waveform => c.set_waveform(c.waveform().step(steps)),
            PanelField::Voices => c.set_voices(c.voices() as i64 + steps as i64),
            PanelField::Speed => c.set_speed(c.speed() * SPEED_STEP.powi(steps)),
            PanelField::Direction if toggle => {
                let dir = -self.cursor.direction();
                c.set_direction(dir as i32);
                self.cursor.set_direction(dir);
            }
            PanelField::Axis if toggle => {
                c.set_axis(match c.axis() {
                    ScanAxis::Horizontal => ScanAxis::Vertical,
                    ScanAxis::Vertical => ScanAxis::Horizontal,
                });
                self.cursor.rewind();
                self.last_pixel = None;
            }
            PanelField::Boundary if toggle => c.set_boundary(match c.boundary() {
                BoundaryPolicy::Wrap => BoundaryPolicy::Bounce,
                BoundaryPolicy::Bounce => BoundaryPolicy::Wrap,
            }),
            PanelField::Layout if toggle => c.set_layout(match c.layout() {
                PointLayout::Centered => PointLayout::Edge,
                PointLayout::Edge => PointLayout::Centered,
            }),
            PanelField::Trigger if toggle => {
                c.set_trigger(match c.trigger() {
                    TriggerMode::Continuous => TriggerMode::Discrete,
                    TriggerMode::Discrete => TriggerMode::Continuous,
                });
                // held tones from continuous mode must not linger under pulses
                self.pool.release_all();
                self.gate.reset();
            }
            PanelField::Pitch if toggle => c.set_pitch_policy(match c.pitch_policy() {
                PitchPolicy::Continuous => PitchPolicy::Quantized,
                PitchPolicy::Quantized => PitchPolicy::Continuous,
            }),
            PanelField::Glide => c.set_glide_secs(c.glide_secs() + steps as f32 * 0.01),
            PanelField::OnsetGap => c.set_min_onset_secs(c.min_onset_secs() + steps as f32 * 0.01),
            PanelField::NoteLength => c.set_note_secs(c.note_secs() + steps as f32 * 0.02),
            _ => {}
        }
    }

    /// Stop the old capture, silence the voices and reset the cursor, then
    /// acquire. A failed acquire leaves the mode selected but not ready.
    fn select_source(&mut self, mode: MediaMode) {
        if let Some(mut old) = self.source.take() {
            old.close();
        }
        self.pool.release_all();
        self.cursor.reset(self.config.direction());
        self.last_pixel = None;
        self.gate.reset();
        self.layout_key = None;
        self.frame_size = None;
        self.display.overlay = Overlay::default();
        self.display.readings.clear();

        self.display.ready = false;

        self.mode = mode;
        match self.media.acquire(mode) {
            Ok(mut source) => {
                info!(mode = mode.label(), "source ready");
                // show the picture before play is pressed
                if let Ok(Some(frame)) = source.current_frame() {
                    self.frame_size = Some((frame.width(), frame.height()));
                    self.display.overlay.frame = Some(frame.image().clone());
                    self.display.ready = true;
                }
                self.source = Some(source);
                self.display.status = format!("{} selected", mode.label());
            }
            Err(e) => {
                warn!(mode = mode.label(), "source unavailable: {e}");
                self.display.status = e.to_string();
            }
        }
        self.refresh_display();
    }

    // ── tick ─────────────────────────────────────────────────────────

    /// One display-refresh tick. Never fails: a bad tick is logged and the
    /// next one runs as usual.
    pub fn tick(&mut self, elapsed: f64) -> Vec<AudioCommand> {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.clock += elapsed;
        }
        if let Err(e) = self.step() {
            warn!("tick skipped: {e}");
            self.display.status = e.to_string();
        }
        self.refresh_display();
        self.pool.drain_commands()
    }

    fn step(&mut self) -> Result<(), SourceError> {
        if !self.cursor.is_running() {
            return Ok(());
        }

        // the tick is the only place config turns into pool state
        self.pool.set_timbre(self.config.waveform());
        self.pool.set_volume(self.config.volume_db());
        self.pool.resize(self.config.voices());

        let Some(source) = self.source.as_mut() else {
            self.display.ready = false;
            return Ok(());
        };
        let frame = match source.current_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.display.ready = false;
                return Ok(());
            }
            Err(e) => {
                if let Some(mut dead) = self.source.take() {
                    dead.close();
                }
                self.display.ready = false;
                return Err(e);
            }
        };
        self.display.ready = true;

        let axis = self.config.axis();
        self.frame_size = Some((frame.width(), frame.height()));
        let (scan_len, across) = axis.lengths(frame.width(), frame.height());
        let key = LayoutKey {
            voices: self.pool.len(),
            axis,
            scan_len,
            across,
            layout: self.config.layout(),
        };
        if self.layout_key != Some(key) {
            self.points = sample_points(key.voices, across, key.layout);
            self.layout_key = Some(key);
            debug!(voices = key.voices, across, "sample layout recomputed");
        }

        let scan = self.cursor.pixel(scan_len);
        let trigger = self.config.trigger();
        let onset = trigger == TriggerMode::Discrete
            && self.last_pixel != Some(scan)
            && self.gate.try_fire(self.clock, self.config.min_onset_secs() as f64);
        self.last_pixel = Some(scan);

        let mut readings = Vec::with_capacity(self.pool.len());
        let mut points = Vec::with_capacity(self.pool.len());
        for i in 0..self.pool.len() {
            let Some(&across_px) = self.points.get(i) else { break };
            let (x, y) = axis.to_xy(scan, across_px);
            let brightness = frame.brightness(x as i64, y as i64);
            let hz = pitch::frequency(
                self.config.pitch_policy(),
                self.config.base_note(),
                self.config.octave(),
                self.config.scale(),
                brightness,
            );
            match trigger {
                TriggerMode::Continuous => {
                    self.pool.ramp_frequency(i, hz, self.config.glide_secs());
                }
                TriggerMode::Discrete if onset => {
                    let contrast = frame.local_contrast(x as i64, y as i64, CONTRAST_RADIUS);
                    self.pool.trigger_pulse(i, hz, contrast_envelope(contrast), self.config.note_secs());
                }
                TriggerMode::Discrete => {}
            }
            readings.push(VoiceReading { x, y, brightness, frequency: hz });
            points.push((x, y));
        }

        self.display.readings = readings;
        self.display.overlay = Overlay {
            frame: Some(frame.image().clone()),
            axis: Some(axis),
            scan,
            points,
        };

        self.cursor.advance(self.config.speed() as f64, scan_len, self.config.boundary());
        Ok(())
    }

    fn refresh_display(&mut self) {
        self.display.playing = self.cursor.is_running();
        self.display.source = self.mode;
        self.display.config = self.config.clone();
    }
}
