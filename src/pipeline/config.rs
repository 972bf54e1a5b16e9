// The one mutable record every control source writes and the loop reads.
// All writes go through setters that clamp, so the hot loop never re-validates.

use serde::{Deserialize, Serialize};

use crate::audio_api::Waveform;
use crate::shared::MAX_VOICES;
use super::cursor::{BoundaryPolicy, PointLayout, ScanAxis};
use super::pitch::{PitchClass, PitchPolicy, ScaleKind, ScaleTable};

pub const VOLUME_MIN_DB: f32 = -60.0;
pub const VOLUME_MAX_DB: f32 = 0.0;
pub const OCTAVE_MAX: i32 = 8;
pub const SPEED_MIN: f32 = 0.1;
pub const SPEED_MAX: f32 = 64.0;
pub const GLIDE_MAX: f32 = 2.0;
pub const ONSET_MIN: f32 = 0.01;
pub const ONSET_MAX: f32 = 2.0;
pub const NOTE_MIN: f32 = 0.01;
pub const NOTE_MAX: f32 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Voices hold and glide as the cursor moves.
    Continuous,
    /// Voices fire short notes on scan-line crossings.
    Discrete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    volume_db: f32,
    octave: i32,
    base_note: PitchClass,
    scale_kind: Option<ScaleKind>,
    scale: ScaleTable,
    waveform: Waveform,
    voices: usize,
    speed: f32,
    direction: i8,
    axis: ScanAxis,
    boundary: BoundaryPolicy,
    layout: PointLayout,
    trigger: TriggerMode,
    pitch: PitchPolicy,
    glide_secs: f32,
    min_onset_secs: f32,
    note_secs: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volume_db: -12.0,
            octave: 4,
            base_note: PitchClass::C,
            scale_kind: Some(ScaleKind::Chromatic),
            scale: ScaleKind::Chromatic.table(),
            waveform: Waveform::Sine,
            voices: 4,
            speed: 1.0,
            direction: 1,
            axis: ScanAxis::Horizontal,
            boundary: BoundaryPolicy::Wrap,
            layout: PointLayout::Centered,
            trigger: TriggerMode::Continuous,
            pitch: PitchPolicy::Quantized,
            glide_secs: 0.05,
            min_onset_secs: 0.1,
            note_secs: 0.2,
        }
    }
}

fn clamp_finite(v: f32, lo: f32, hi: f32, current: f32) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { current }
}

impl Config {
    /// Re-run every setter so values loaded from a file obey the same bounds.
    pub fn validated(self) -> Self {
        let mut c = Config::default();
        c.set_pitch_policy(self.pitch);
        c.set_volume_db(self.volume_db);
        c.set_octave(self.octave);
        c.set_base_note(self.base_note);
        match self.scale_kind {
            Some(kind) => c.set_scale_kind(kind),
            None => c.set_scale_table(self.scale),
        }
        c.set_waveform(self.waveform);
        c.set_voices(self.voices as i64);
        c.set_speed(self.speed);
        c.set_direction(self.direction as i32);
        c.set_axis(self.axis);
        c.set_boundary(self.boundary);
        c.set_layout(self.layout);
        c.set_trigger(self.trigger);
        c.set_glide_secs(self.glide_secs);
        c.set_min_onset_secs(self.min_onset_secs);
        c.set_note_secs(self.note_secs);
        c
    }

    pub fn volume_db(&self) -> f32 { self.volume_db }
    pub fn octave(&self) -> i32 { self.octave }
    pub fn base_note(&self) -> PitchClass { self.base_note }
    pub fn scale_kind(&self) -> Option<ScaleKind> { self.scale_kind }
    pub fn scale(&self) -> &ScaleTable { &self.scale }
    pub fn waveform(&self) -> Waveform { self.waveform }
    pub fn voices(&self) -> usize { self.voices }
    pub fn speed(&self) -> f32 { self.speed }
    pub fn direction(&self) -> i8 { self.direction }
    pub fn axis(&self) -> ScanAxis { self.axis }
    pub fn boundary(&self) -> BoundaryPolicy { self.boundary }
    pub fn layout(&self) -> PointLayout { self.layout }
    pub fn trigger(&self) -> TriggerMode { self.trigger }
    pub fn pitch_policy(&self) -> PitchPolicy { self.pitch }
    pub fn glide_secs(&self) -> f32 { self.glide_secs }
    pub fn min_onset_secs(&self) -> f32 { self.min_onset_secs }
    pub fn note_secs(&self) -> f32 { self.note_secs }

    /// Lowest octave for the current pitch policy. The continuous policy
    /// already adds up to an octave on top, so it may start one lower.
    pub fn octave_min(&self) -> i32 {
        match self.pitch {
            PitchPolicy::Continuous => 0,
            PitchPolicy::Quantized => 1,
        }
    }

    pub fn set_volume_db(&mut self, db: f32) {
        self.volume_db = clamp_finite(db, VOLUME_MIN_DB, VOLUME_MAX_DB, self.volume_db);
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.clamp(self.octave_min(), OCTAVE_MAX);
    }

    pub fn set_base_note(&mut self, note: PitchClass) {
        self.base_note = note;
    }

    pub fn set_scale_kind(&mut self, kind: ScaleKind) {
        self.scale_kind = Some(kind);
        self.scale = kind.table();
    }

    pub fn set_scale_table(&mut self, table: ScaleTable) {
        self.scale_kind = ScaleKind::ALL.into_iter().find(|k| k.offsets() == table.offsets());
        self.scale = ScaleTable::coerce(table.offsets().to_vec());
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn set_voices(&mut self, voices: i64) {
        self.voices = voices.clamp(1, MAX_VOICES as i64) as usize;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = clamp_finite(speed, SPEED_MIN, SPEED_MAX, self.speed);
    }

    pub fn set_direction(&mut self, direction: i32) {
        self.direction = if direction < 0 { -1 } else { 1 };
    }

    pub fn set_axis(&mut self, axis: ScanAxis) {
        self.axis = axis;
    }

    pub fn set_boundary(&mut self, boundary: BoundaryPolicy) {
        self.boundary = boundary;
    }

    pub fn set_layout(&mut self, layout: PointLayout) {
        self.layout = layout;
    }

    pub fn set_trigger(&mut self, trigger: TriggerMode) {
        self.trigger = trigger;
    }

    pub fn set_pitch_policy(&mut self, pitch: PitchPolicy) {
        self.pitch = pitch;
        self.octave = self.octave.clamp(self.octave_min(), OCTAVE_MAX);
    }

    pub fn set_glide_secs(&mut self, secs: f32) {
        self.glide_secs = clamp_finite(secs, 0.0, GLIDE_MAX, self.glide_secs);
    }

    pub fn set_min_onset_secs(&mut self, secs: f32) {
        self.min_onset_secs = clamp_finite(secs, ONSET_MIN, ONSET_MAX, self.min_onset_secs);
    }

    pub fn set_note_secs(&mut self, secs: f32) {
        self.note_secs = clamp_finite(secs, NOTE_MIN, NOTE_MAX, self.note_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_nearest_bound() {
        let mut c = Config::default();
        c.set_volume_db(12.0);
        assert_eq!(c.volume_db(), 0.0);
        c.set_volume_db(-500.0);
        assert_eq!(c.volume_db(), -60.0);
        c.set_volume_db(f32::NAN);
        assert_eq!(c.volume_db(), -60.0);

        c.set_voices(0);
        assert_eq!(c.voices(), 1);
        c.set_voices(99);
        assert_eq!(c.voices(), MAX_VOICES);

        c.set_speed(-3.0);
        assert_eq!(c.speed(), SPEED_MIN);
        c.set_direction(-7);
        assert_eq!(c.direction(), -1);
        c.set_direction(0);
        assert_eq!(c.direction(), 1);
    }

    #[test]
    fn octave_floor_follows_pitch_policy() {
        let mut c = Config::default();
        c.set_pitch_policy(PitchPolicy::Continuous);
        c.set_octave(0);
        assert_eq!(c.octave(), 0);
        c.set_pitch_policy(PitchPolicy::Quantized);
        assert_eq!(c.octave(), 1);
        c.set_octave(11);
        assert_eq!(c.octave(), OCTAVE_MAX);
    }

    #[test]
    fn custom_scale_is_coerced_and_recognised() {
        let mut c = Config::default();
        c.set_scale_table(ScaleTable::coerce(vec![0, 2, 4, 7, 9]));
        assert_eq!(c.scale().offsets(), &[0, 2, 4, 7, 9, 12]);
        assert_eq!(c.scale_kind(), Some(ScaleKind::PentatonicMajor));

        c.set_scale_table(ScaleTable::coerce(vec![5]));
        assert_eq!(c.scale_kind(), None);
        assert_eq!(c.scale().offsets(), &[0, 5, 12]);
    }

    #[test]
    fn deserialized_config_is_revalidated() {
        let c: Config = serde_json::from_str(
            r#"{ "volume_db": 30.0, "voices": 40, "octave": -2, "scale_kind": null, "scale": [4, 4, 1] }"#,
        )
        .unwrap();
        let c = c.validated();
        assert_eq!(c.volume_db(), 0.0);
        assert_eq!(c.voices(), MAX_VOICES);
        assert_eq!(c.octave(), 1);
        assert_eq!(c.scale().offsets(), &[0, 1, 4, 12]);
    }
}
