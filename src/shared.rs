// Types shared between the control side (TUI, MIDI), the loop, and the view.
//
// Every external input is normalised into a `ControlEvent` before it reaches
// the loop: the TUI resolves keys, the MIDI surface resolves messages. The
// loop applies events between ticks, and the view only ever reads a
// `DisplayState` snapshot.

use std::sync::Arc;

use image::RgbaImage;

use crate::audio_api::Waveform;
use crate::loader::MediaMode;
use crate::pipeline::config::{Config, TriggerMode};
use crate::pipeline::cursor::{BoundaryPolicy, PointLayout, ScanAxis};
use crate::pipeline::pitch::{PitchClass, PitchPolicy, ScaleKind};

pub const MAX_VOICES: usize = 12;

// Panel rows, in display order. Left/right on a row steps its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelField {
    Volume,
    Octave,
    BaseNote,
    Scale,
    Waveform,
    Voices,
    Speed,
    Direction,
    Axis,
    Boundary,
    Layout,
    Trigger,
    Pitch,
    Glide,
    OnsetGap,
    NoteLength,
}

impl PanelField {
    pub const ALL: [PanelField; 16] = [
        PanelField::Volume,
        PanelField::Octave,
        PanelField::BaseNote,
        PanelField::Scale,
        PanelField::Waveform,
        PanelField::Voices,
        PanelField::Speed,
        PanelField::Direction,
        PanelField::Axis,
        PanelField::Boundary,
        PanelField::Layout,
        PanelField::Trigger,
        PanelField::Pitch,
        PanelField::Glide,
        PanelField::OnsetGap,
        PanelField::NoteLength,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PanelField::Volume => "VOLUME",
            PanelField::Octave => "OCTAVE",
            PanelField::BaseNote => "ROOT",
            PanelField::Scale => "SCALE",
            PanelField::Waveform => "WAVE",
            PanelField::Voices => "VOICES",
            PanelField::Speed => "SPEED",
            PanelField::Direction => "DIR",
            PanelField::Axis => "AXIS",
            PanelField::Boundary => "EDGE",
            PanelField::Layout => "POINTS",
            PanelField::Trigger => "TRIGGER",
            PanelField::Pitch => "PITCH",
            PanelField::Glide => "GLIDE",
            PanelField::OnsetGap => "GAP",
            PanelField::NoteLength => "NOTE",
        }
    }

    pub fn step(self, steps: i32) -> Self {
        let i = Self::ALL.iter().position(|f| *f == self).unwrap_or(0) as i32;
        Self::ALL[(i + steps).rem_euclid(Self::ALL.len() as i32) as usize]
    }

    /// Current value of this field, formatted for the panel.
    pub fn value(self, c: &Config) -> String {
        match self {
            PanelField::Volume => format!("{:.0} dB", c.volume_db()),
            PanelField::Octave => c.octave().to_string(),
            PanelField::BaseNote => c.base_note().name().to_string(),
            PanelField::Scale => c.scale_kind().map_or("custom", ScaleKind::label).to_string(),
            PanelField::Waveform => c.waveform().label().to_string(),
            PanelField::Voices => c.voices().to_string(),
            PanelField::Speed => format!("{:.1} px", c.speed()),
            PanelField::Direction => if c.direction() < 0 { "<-" } else { "->" }.to_string(),
            PanelField::Axis => match c.axis() {
                ScanAxis::Horizontal => "horizontal",
                ScanAxis::Vertical => "vertical",
            }
            .to_string(),
            PanelField::Boundary => match c.boundary() {
                BoundaryPolicy::Wrap => "wrap",
                BoundaryPolicy::Bounce => "bounce",
            }
            .to_string(),
            PanelField::Layout => match c.layout() {
                PointLayout::Centered => "centered",
                PointLayout::Edge => "edge",
            }
            .to_string(),
            PanelField::Trigger => match c.trigger() {
                TriggerMode::Continuous => "continuous",
                TriggerMode::Discrete => "discrete",
            }
            .to_string(),
            PanelField::Pitch => match c.pitch_policy() {
                PitchPolicy::Continuous => "continuous",
                PitchPolicy::Quantized => "scale",
            }
            .to_string(),
            PanelField::Glide => format!("{:.0} ms", c.glide_secs() * 1000.0),
            PanelField::OnsetGap => format!("{:.0} ms", c.min_onset_secs() * 1000.0),
            PanelField::NoteLength => format!("{:.0} ms", c.note_secs() * 1000.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ControlEvent {
    // transport
    TogglePlay,
    Play,
    Pause,
    Stop, // pause + rewind
    Rewind,
    Jump(f64), // pixels, sign is direction
    Hidden,    // display lost focus / visibility

    // panel edits, `steps` is usually ±1
    Adjust(PanelField, i32),

    // direct writes, mostly from MIDI
    SetVolume(f32),
    SetOctave(i32),
    SetBaseNote(PitchClass),
    SetWaveform(Waveform),
    SetVoices(i64),
    SetSpeed(f32),

    SelectSource(MediaMode),
    NextMidiInput,

    Quit,
}

/// What one voice did on the last tick, for the panel readout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceReading {
    pub x: u32,
    pub y: u32,
    pub brightness: f32,
    pub frequency: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Overlay {
    pub frame: Option<Arc<RgbaImage>>,
    pub axis: Option<ScanAxis>,
    pub scan: u32,           // scan-line pixel index on the scan axis
    pub points: Vec<(u32, u32)>, // sample points in frame pixels
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub playing: bool,
    pub source: MediaMode,
    pub ready: bool, // a frame is available
    pub status: String,
    pub config: Config,
    pub readings: Vec<VoiceReading>,
    pub overlay: Overlay,
    pub midi_input: Option<String>,
}
