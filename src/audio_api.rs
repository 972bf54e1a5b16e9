use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of one logical voice. Never reused, so a late command for a
/// retired voice can't land on whatever took its engine slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

pub fn next_voice_id() -> VoiceId {
    VoiceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    pub fn step(self, steps: i32) -> Self {
        let i = Self::ALL.iter().position(|w| *w == self).unwrap_or(0) as i32;
        Self::ALL[(i + steps).rem_euclid(4) as usize]
    }
}

/// Attack/release times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub release: f32,
}

impl Envelope {
    // short enough to feel immediate, long enough not to click
    pub const SUSTAIN: Envelope = Envelope { attack: 0.02, release: 0.08 };
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    // Allocate an engine slot for a new voice. Silent until triggered.
    Spawn { id: VoiceId, waveform: Waveform, gain: f32 },

    // Fade out and free the slot; the id is dead afterwards.
    Retire { id: VoiceId },

    // Held tone: attack if silent, otherwise jump to the new frequency.
    Sustain { id: VoiceId, frequency: f32 },

    // Glide a sounding voice towards `frequency` over `seconds`.
    Glide { id: VoiceId, frequency: f32, seconds: f32 },

    // Attack, hold for `hold` seconds, then release on its own.
    Pulse { id: VoiceId, frequency: f32, envelope: Envelope, hold: f32 },

    // Pool-wide timbre and level, applied to every live slot.
    SetWaveform(Waveform),
    SetGain(f32),

    // Note-off for every voice; voices stay allocated.
    ReleaseAll,
}
