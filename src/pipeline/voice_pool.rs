// Logical view of the synth voices, owned by the loop thread. The audio
// thread only ever hears about changes through the outbox, so the pool's
// idea of "which voices exist" is updated synchronously within a tick while
// the sound itself follows asynchronously.

use tracing::debug;

use crate::audio_api::{next_voice_id, AudioCommand, Envelope, VoiceId, Waveform};
use crate::shared::MAX_VOICES;

// frequency a voice starts at when nothing else is known yet (C4)
const FALLBACK_HZ: f32 = 261.63;

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct VoiceHandle {
    pub id: VoiceId,
    pub waveform: Waveform,
    pub volume_db: f32,
    pub frequency: f32,
    pub sounding: bool,
}

#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<VoiceHandle>,
    waveform: Waveform,
    volume_db: f32,
    // held (continuous) voices are playing; new voices should join in
    sounding: bool,
    outbox: Vec<AudioCommand>,
}

impl VoicePool {
    pub fn new(waveform: Waveform, volume_db: f32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            waveform,
            volume_db,
            sounding: false,
            outbox: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[VoiceHandle] {
        &self.voices
    }

    /// Commands produced since the last drain, in order.
    pub fn drain_commands(&mut self) -> Vec<AudioCommand> {
        std::mem::take(&mut self.outbox)
    }

    /// Grow by pushing fresh voices with the pool's current timbre, shrink by
    /// retiring the newest ones. Equal size is a no-op.
    pub fn resize(&mut self, n: usize) {
        let n = n.min(MAX_VOICES);
        if n == self.voices.len() {
            return;
        }
        while self.voices.len() > n {
            if let Some(v) = self.voices.pop() {
                self.outbox.push(AudioCommand::Retire { id: v.id });
            }
        }
        let seed_hz = self.voices.last().map_or(FALLBACK_HZ, |v| v.frequency);
        while self.voices.len() < n {
            let id = next_voice_id();
            self.outbox.push(AudioCommand::Spawn {
                id,
                waveform: self.waveform,
                gain: db_to_gain(self.volume_db),
            });
            let mut handle = VoiceHandle {
                id,
                waveform: self.waveform,
                volume_db: self.volume_db,
                frequency: seed_hz,
                sounding: false,
            };
            if self.sounding {
                // attack now rather than leave a hole until the next tick
                self.outbox.push(AudioCommand::Sustain { id, frequency: seed_hz });
                handle.sounding = true;
            }
            self.voices.push(handle);
        }
        debug!(voices = n, "voice pool resized");
    }

    pub fn set_timbre(&mut self, waveform: Waveform) {
        if waveform == self.waveform {
            return;
        }
        self.waveform = waveform;
        for v in self.voices.iter_mut() {
            v.waveform = waveform;
        }
        self.outbox.push(AudioCommand::SetWaveform(waveform));
    }

    pub fn set_volume(&mut self, db: f32) {
        if db == self.volume_db {
            return;
        }
        self.volume_db = db;
        for v in self.voices.iter_mut() {
            v.volume_db = db;
        }
        self.outbox.push(AudioCommand::SetGain(db_to_gain(db)));
    }

    fn handle_mut(&mut self, index: usize) -> Option<&mut VoiceHandle> {
        let len = self.voices.len();
        let handle = self.voices.get_mut(index);
        if handle.is_none() {
            // the pool shrank under an in-flight computation; not an error
            debug!(index, len, "voice index out of range, ignored");
        }
        handle
    }

    /// Start (or retune) a held tone.
    pub fn trigger_sustain(&mut self, index: usize, frequency: f32) -> bool {
        let Some(v) = self.handle_mut(index) else { return false };
        v.frequency = frequency;
        v.sounding = true;
        let id = v.id;
        self.sounding = true;
        self.outbox.push(AudioCommand::Sustain { id, frequency });
        true
    }

    /// Glide a held tone. A silent voice is attacked instead, so a release
    /// can never be followed by sound without a fresh attack.
    pub fn ramp_frequency(&mut self, index: usize, frequency: f32, glide_secs: f32) -> bool {
        let Some(v) = self.handle_mut(index) else { return false };
        if !v.sounding {
            return self.trigger_sustain(index, frequency);
        }
        if v.frequency == frequency {
            return true;
        }
        v.frequency = frequency;
        let id = v.id;
        self.outbox.push(AudioCommand::Glide { id, frequency, seconds: glide_secs });
        true
    }

    /// Fire-and-forget note: attack, hold, release.
    pub fn trigger_pulse(&mut self, index: usize, frequency: f32, envelope: Envelope, hold: f32) -> bool {
        let Some(v) = self.handle_mut(index) else { return false };
        v.frequency = frequency;
        let id = v.id;
        self.outbox.push(AudioCommand::Pulse { id, frequency, envelope, hold });
        true
    }

    pub fn release_all(&mut self) {
        for v in self.voices.iter_mut() {
            v.sounding = false;
        }
        self.sounding = false;
        if !self.voices.is_empty() {
            self.outbox.push(AudioCommand::ReleaseAll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawned(cmds: &[AudioCommand]) -> Vec<(VoiceId, Waveform, f32)> {
        cmds.iter()
            .filter_map(|c| match c {
                AudioCommand::Spawn { id, waveform, gain } => Some((*id, *waveform, *gain)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_resize_transition_lands_on_target_with_shared_timbre() {
        for from in 0..=MAX_VOICES {
            for to in 0..=MAX_VOICES {
                let mut pool = VoicePool::new(Waveform::Sine, -6.0);
                pool.resize(from);
                pool.set_timbre(Waveform::Square);
                pool.set_volume(-20.0);
                pool.drain_commands();

                pool.resize(to);
                assert_eq!(pool.len(), to);
                assert!(pool.voices().iter().all(|v| v.waveform == Waveform::Square && v.volume_db == -20.0));
                for (_, w, g) in spawned(&pool.drain_commands()) {
                    assert_eq!(w, Waveform::Square);
                    assert_eq!(g, db_to_gain(-20.0));
                }
            }
        }
    }

    #[test]
    fn shrink_retires_newest_first() {
        let mut pool = VoicePool::new(Waveform::Sine, -6.0);
        pool.resize(4);
        let ids: Vec<VoiceId> = pool.voices().iter().map(|v| v.id).collect();
        pool.drain_commands();

        pool.resize(2);
        assert_eq!(
            pool.drain_commands(),
            vec![AudioCommand::Retire { id: ids[3] }, AudioCommand::Retire { id: ids[2] }]
        );
        let kept: Vec<VoiceId> = pool.voices().iter().map(|v| v.id).collect();
        assert_eq!(kept, ids[..2]);
    }

    #[test]
    fn same_size_is_a_no_op_and_zero_is_alive() {
        let mut pool = VoicePool::new(Waveform::Sine, -6.0);
        pool.resize(3);
        pool.drain_commands();
        pool.resize(3);
        assert!(pool.drain_commands().is_empty());

        pool.resize(0);
        assert!(pool.is_empty());
        pool.resize(1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn growing_while_sounding_attacks_new_voices() {
        let mut pool = VoicePool::new(Waveform::Triangle, -6.0);
        pool.resize(2);
        pool.trigger_sustain(0, 300.0);
        pool.trigger_sustain(1, 440.0);
        pool.drain_commands();

        pool.resize(3);
        let cmds = pool.drain_commands();
        let new_id = pool.voices()[2].id;
        assert!(cmds.contains(&AudioCommand::Sustain { id: new_id, frequency: 440.0 }));
        assert!(pool.voices()[2].sounding);

        pool.release_all();
        pool.resize(4);
        let cmds = pool.drain_commands();
        assert!(!cmds.iter().any(|c| matches!(c, AudioCommand::Sustain { .. })));
    }

    #[test]
    fn out_of_range_triggers_are_ignored() {
        let mut pool = VoicePool::new(Waveform::Sine, -6.0);
        pool.resize(2);
        pool.drain_commands();
        assert!(!pool.trigger_sustain(2, 100.0));
        assert!(!pool.ramp_frequency(5, 100.0, 0.1));
        assert!(!pool.trigger_pulse(9, 100.0, Envelope::SUSTAIN, 0.1));
        assert!(pool.drain_commands().is_empty());
    }

    #[test]
    fn ramp_on_released_voice_reattacks() {
        let mut pool = VoicePool::new(Waveform::Sine, -6.0);
        pool.resize(1);
        pool.trigger_sustain(0, 200.0);
        pool.release_all();
        pool.drain_commands();

        pool.ramp_frequency(0, 250.0, 0.05);
        let id = pool.voices()[0].id;
        assert_eq!(pool.drain_commands(), vec![AudioCommand::Sustain { id, frequency: 250.0 }]);

        pool.ramp_frequency(0, 300.0, 0.05);
        assert_eq!(
            pool.drain_commands(),
            vec![AudioCommand::Glide { id, frequency: 300.0, seconds: 0.05 }]
        );
    }

    #[test]
    fn timbre_and_volume_apply_to_all_live_voices() {
        let mut pool = VoicePool::new(Waveform::Sine, -6.0);
        pool.resize(5);
        pool.drain_commands();
        pool.set_timbre(Waveform::Sawtooth);
        pool.set_volume(-30.0);
        assert_eq!(
            pool.drain_commands(),
            vec![AudioCommand::SetWaveform(Waveform::Sawtooth), AudioCommand::SetGain(db_to_gain(-30.0))]
        );
        assert!(pool.voices().iter().all(|v| v.waveform == Waveform::Sawtooth && v.volume_db == -30.0));
    }
}
