// MIDI → ControlEvent. The mapping is data (`MidiBindings`) so it can come
// from the settings file; the TUI resolves keys itself in tui/input.rs.

use serde::{Deserialize, Serialize};

use crate::audio_api::Waveform;
use crate::midi::MidiMessage;
use crate::pipeline::config::{OCTAVE_MAX, SPEED_MAX, SPEED_MIN, VOLUME_MIN_DB};
use crate::pipeline::pitch::PitchClass;
use crate::shared::ControlEvent;

pub const MOD_WHEEL: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModWheelTarget {
    Octave,
    Speed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiBindings {
    /// Note-on sets the root pitch class from the note number.
    pub note_sets_root: bool,
    /// Note-on sets the volume from the velocity.
    pub velocity_sets_volume: bool,
    pub mod_wheel: ModWheelTarget,
    /// Controller whose value picks the waveform.
    pub waveform_cc: u8,
    /// Only listen on this channel (0-15); all channels when unset.
    pub channel: Option<u8>,
}

impl Default for MidiBindings {
    fn default() -> Self {
        Self {
            note_sets_root: true,
            velocity_sets_volume: true,
            mod_wheel: ModWheelTarget::Octave,
            waveform_cc: 74,
            channel: None,
        }
    }
}

/// Perceptual gain curve: amplitude follows velocity squared, so
/// dB = 40·log10(v/127), floored at the volume minimum.
pub fn velocity_to_db(velocity: u8) -> f32 {
    if velocity == 0 {
        return VOLUME_MIN_DB;
    }
    let v = velocity.min(127) as f32 / 127.0;
    (40.0 * v.log10()).max(VOLUME_MIN_DB)
}

/// Split 0..=127 into four equal bands, one per waveform.
pub fn value_to_waveform(value: u8) -> Waveform {
    Waveform::ALL[(value.min(127) as usize * Waveform::ALL.len()) / 128]
}

fn value_to_octave(value: u8) -> i32 {
    // the config clamps the floor per pitch policy
    ((value.min(127) as f32 / 127.0) * OCTAVE_MAX as f32).round() as i32
}

// exponential, so the low end of the wheel gets useful resolution
fn value_to_speed(value: u8) -> f32 {
    let t = value.min(127) as f32 / 127.0;
    SPEED_MIN * (SPEED_MAX / SPEED_MIN).powf(t)
}

#[derive(Clone, Debug, Default)]
pub struct ControlSurface {
    bindings: MidiBindings,
}

impl ControlSurface {
    pub fn new(bindings: MidiBindings) -> Self {
        Self { bindings }
    }

    pub fn from_midi(&self, msg: MidiMessage) -> Vec<ControlEvent> {
        let b = &self.bindings;
        let channel = match msg {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => channel,
        };
        if b.channel.is_some_and(|c| c != channel) {
            return Vec::new();
        }

        match msg {
            MidiMessage::NoteOn { note, velocity, .. } => {
                let mut events = Vec::new();
                if b.note_sets_root {
                    events.push(ControlEvent::SetBaseNote(PitchClass::wrapping(note as i32)));
                }
                if b.velocity_sets_volume {
                    events.push(ControlEvent::SetVolume(velocity_to_db(velocity)));
                }
                events
            }
            MidiMessage::ControlChange { controller, value, .. } if controller == MOD_WHEEL => {
                match b.mod_wheel {
                    ModWheelTarget::Octave => vec![ControlEvent::SetOctave(value_to_octave(value))],
                    ModWheelTarget::Speed => vec![ControlEvent::SetSpeed(value_to_speed(value))],
                }
            }
            MidiMessage::ControlChange { controller, value, .. } if controller == b.waveform_cc => {
                vec![ControlEvent::SetWaveform(value_to_waveform(value))]
            }
            MidiMessage::ControlChange { .. } | MidiMessage::NoteOff { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_curve_is_monotonic_and_bounded() {
        assert_eq!(velocity_to_db(127), 0.0);
        assert_eq!(velocity_to_db(0), VOLUME_MIN_DB);
        let mut prev = f32::MIN;
        for v in 0..=127u8 {
            let db = velocity_to_db(v);
            assert!(db >= prev && (VOLUME_MIN_DB..=0.0).contains(&db));
            prev = db;
        }
        // half velocity is about -12 dB, not -6
        assert!((velocity_to_db(64) + 12.0).abs() < 0.5);
    }

    #[test]
    fn waveform_bands() {
        assert_eq!(value_to_waveform(0), Waveform::Sine);
        assert_eq!(value_to_waveform(31), Waveform::Sine);
        assert_eq!(value_to_waveform(32), Waveform::Square);
        assert_eq!(value_to_waveform(64), Waveform::Sawtooth);
        assert_eq!(value_to_waveform(127), Waveform::Triangle);
        assert_eq!(value_to_waveform(255), Waveform::Triangle);
    }

    #[test]
    fn note_on_sets_root_and_volume() {
        let s = ControlSurface::default();
        let events = s.from_midi(MidiMessage::NoteOn { channel: 0, note: 62, velocity: 127 });
        assert_eq!(
            events,
            vec![ControlEvent::SetBaseNote(PitchClass::wrapping(2)), ControlEvent::SetVolume(0.0)]
        );
        assert!(s.from_midi(MidiMessage::NoteOff { channel: 0, note: 62 }).is_empty());
    }

    #[test]
    fn mod_wheel_follows_binding() {
        let octave = ControlSurface::default();
        assert_eq!(
            octave.from_midi(MidiMessage::ControlChange { channel: 0, controller: 1, value: 127 }),
            vec![ControlEvent::SetOctave(OCTAVE_MAX)]
        );

        let speed = ControlSurface::new(MidiBindings { mod_wheel: ModWheelTarget::Speed, ..Default::default() });
        let lo = speed.from_midi(MidiMessage::ControlChange { channel: 0, controller: 1, value: 0 });
        let hi = speed.from_midi(MidiMessage::ControlChange { channel: 0, controller: 1, value: 127 });
        match (&lo[..], &hi[..]) {
            ([ControlEvent::SetSpeed(a)], [ControlEvent::SetSpeed(b)]) => {
                assert!((a - SPEED_MIN).abs() < 1e-4);
                assert!((b - SPEED_MAX).abs() < 1e-2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn designated_cc_picks_waveform_and_others_are_ignored() {
        let s = ControlSurface::default();
        assert_eq!(
            s.from_midi(MidiMessage::ControlChange { channel: 0, controller: 74, value: 100 }),
            vec![ControlEvent::SetWaveform(Waveform::Triangle)]
        );
        assert!(s.from_midi(MidiMessage::ControlChange { channel: 0, controller: 7, value: 100 }).is_empty());
    }

    #[test]
    fn channel_filter() {
        let s = ControlSurface::new(MidiBindings { channel: Some(2), ..Default::default() });
        assert!(s.from_midi(MidiMessage::NoteOn { channel: 0, note: 60, velocity: 90 }).is_empty());
        assert_eq!(s.from_midi(MidiMessage::NoteOn { channel: 2, note: 60, velocity: 90 }).len(), 2);
    }
}
