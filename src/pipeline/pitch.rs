// Brightness → frequency. Everything here is a pure function of its inputs so
// the loop can call it per voice per tick without caching.

use serde::{Deserialize, Serialize};

pub const CONCERT_A: f32 = 440.0;
pub const REFERENCE_OCTAVE: i32 = 4;

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the twelve equal-tempered pitch classes, C = 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const A: PitchClass = PitchClass(9);

    /// Wraps any integer into 0..12, so MIDI note numbers map directly.
    pub fn wrapping(n: i32) -> Self {
        PitchClass(n.rem_euclid(12) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        NAMES[self.0 as usize]
    }
}

impl TryFrom<u8> for PitchClass {
    type Error = String;
    fn try_from(n: u8) -> Result<Self, Self::Error> {
        if n < 12 {
            Ok(PitchClass(n))
        } else {
            Err(format!("pitch class {n} out of range 0..12"))
        }
    }
}

impl From<PitchClass> for u8 {
    fn from(pc: PitchClass) -> u8 {
        pc.0
    }
}

/// Frequency of `pc` in `octave`, A4 = 440 Hz, one doubling per octave.
pub fn note_frequency(pc: PitchClass, octave: i32) -> f32 {
    let semis = pc.0 as f32 - 9.0;
    CONCERT_A * 2f32.powf(semis / 12.0 + (octave - REFERENCE_OCTAVE) as f32)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    Chromatic,
    Major,
    Minor,
    HarmonicMinor,
    Dorian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
}

impl ScaleKind {
    pub const ALL: [ScaleKind; 9] = [
        ScaleKind::Chromatic,
        ScaleKind::Major,
        ScaleKind::Minor,
        ScaleKind::HarmonicMinor,
        ScaleKind::Dorian,
        ScaleKind::PentatonicMajor,
        ScaleKind::PentatonicMinor,
        ScaleKind::Blues,
        ScaleKind::WholeTone,
    ];

    pub fn offsets(self) -> &'static [u8] {
        match self {
            ScaleKind::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleKind::Minor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleKind::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11, 12],
            ScaleKind::Dorian => &[0, 2, 3, 5, 7, 9, 10, 12],
            ScaleKind::PentatonicMajor => &[0, 2, 4, 7, 9, 12],
            ScaleKind::PentatonicMinor => &[0, 3, 5, 7, 10, 12],
            ScaleKind::Blues => &[0, 3, 5, 6, 7, 10, 12],
            ScaleKind::WholeTone => &[0, 2, 4, 6, 8, 10, 12],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScaleKind::Chromatic => "chromatic",
            ScaleKind::Major => "major",
            ScaleKind::Minor => "minor",
            ScaleKind::HarmonicMinor => "harm. minor",
            ScaleKind::Dorian => "dorian",
            ScaleKind::PentatonicMajor => "penta major",
            ScaleKind::PentatonicMinor => "penta minor",
            ScaleKind::Blues => "blues",
            ScaleKind::WholeTone => "whole tone",
        }
    }

    pub fn table(self) -> ScaleTable {
        ScaleTable(self.offsets().to_vec())
    }

    pub fn step(self, steps: i32) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0) as i32;
        Self::ALL[(i + steps).rem_euclid(Self::ALL.len() as i32) as usize]
    }
}

/// Ascending semitone offsets from the root, always starting at 0 and closed
/// at the octave (last entry is 12).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u8>")]
pub struct ScaleTable(Vec<u8>);

impl ScaleTable {
    /// Coerces arbitrary offsets into a valid table instead of rejecting them.
    pub fn coerce(mut offsets: Vec<u8>) -> Self {
        for o in offsets.iter_mut() {
            *o = (*o).min(12);
        }
        offsets.push(0);
        offsets.push(12);
        offsets.sort_unstable();
        offsets.dedup();
        ScaleTable(offsets)
    }

    pub fn offsets(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ScaleTable {
    fn from(v: Vec<u8>) -> Self {
        Self::coerce(v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchPolicy {
    /// The value bends pitch continuously across one octave.
    Continuous,
    /// The value selects a degree of the scale table.
    Quantized,
}

fn unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

pub fn continuous_frequency(base: PitchClass, octave: i32, value: f32) -> f32 {
    note_frequency(base, octave) * 2f32.powf(unit(value))
}

pub fn quantized_frequency(base: PitchClass, octave: i32, scale: &ScaleTable, value: f32) -> f32 {
    let offsets = scale.offsets();
    if offsets.is_empty() {
        return note_frequency(base, octave);
    }
    let last = offsets.len() - 1;
    let idx = ((unit(value) * last as f32).floor() as usize).min(last);
    note_frequency(base, octave) * 2f32.powf(offsets[idx] as f32 / 12.0)
}

/// Maps a normalised pixel statistic to Hz under the given policy.
pub fn frequency(
    policy: PitchPolicy,
    base: PitchClass,
    octave: i32,
    scale: &ScaleTable,
    value: f32,
) -> f32 {
    match policy {
        PitchPolicy::Continuous => continuous_frequency(base, octave, value),
        PitchPolicy::Quantized => quantized_frequency(base, octave, scale, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn concert_pitch_reference() {
        assert!(close(note_frequency(PitchClass::A, 4), 440.0));
        assert!(close(note_frequency(PitchClass::A, 5), 880.0));
        assert!(close(note_frequency(PitchClass::C, 4), 261.63));
        assert!(close(note_frequency(PitchClass::A, 0), 27.5));
    }

    #[test]
    fn quantized_endpoints_stay_in_table() {
        let chromatic = ScaleKind::Chromatic.table();
        let lo = quantized_frequency(PitchClass::C, 4, &chromatic, 0.0);
        let hi = quantized_frequency(PitchClass::C, 4, &chromatic, 1.0);
        assert!(close(lo, 261.63));
        assert!(close(hi, 523.25));
        // out-of-range and NaN inputs are clamped, not indexed
        assert!(close(quantized_frequency(PitchClass::C, 4, &chromatic, 7.0), hi));
        assert!(close(quantized_frequency(PitchClass::C, 4, &chromatic, f32::NAN), lo));
    }

    #[test]
    fn continuous_spans_one_octave() {
        let lo = continuous_frequency(PitchClass::A, 3, 0.0);
        let mid = continuous_frequency(PitchClass::A, 3, 0.5);
        let hi = continuous_frequency(PitchClass::A, 3, 1.0);
        assert!(close(lo, 220.0));
        assert!(close(mid, 220.0 * 2f32.sqrt()));
        assert!(close(hi, 440.0));
    }

    #[test]
    fn both_policies_are_monotonic() {
        for kind in ScaleKind::ALL {
            let table = kind.table();
            for policy in [PitchPolicy::Continuous, PitchPolicy::Quantized] {
                let mut prev = 0.0;
                for i in 0..=1000 {
                    let v = i as f32 / 1000.0;
                    let f = frequency(policy, PitchClass::wrapping(2), 3, &table, v);
                    assert!(f >= prev, "{kind:?} {policy:?} dropped at {v}");
                    prev = f;
                }
            }
        }
    }

    #[test]
    fn malformed_tables_are_coerced() {
        let t = ScaleTable::coerce(vec![7, 3, 3, 40]);
        assert_eq!(t.offsets(), &[0, 3, 7, 12]);
        let empty = ScaleTable::coerce(vec![]);
        assert_eq!(empty.offsets(), &[0, 12]);
        for kind in ScaleKind::ALL {
            assert_eq!(kind.table(), ScaleTable::coerce(kind.offsets().to_vec()));
        }
    }

    #[test]
    fn pitch_class_wraps_midi_notes() {
        assert_eq!(PitchClass::wrapping(60), PitchClass::C);
        assert_eq!(PitchClass::wrapping(69), PitchClass::A);
        assert_eq!(PitchClass::wrapping(-3), PitchClass::A);
        assert!(PitchClass::try_from(12).is_err());
    }
}
