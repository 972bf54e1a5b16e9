use tracing::debug;

use crate::audio_api::{AudioCommand, VoiceId, Waveform};
use super::voice::SynthVoice;

// Hard cap so we never allocate in the audio callback. Larger than the pool's
// MAX_VOICES because retired voices keep their slot until the tail fades.
pub const ENGINE_SLOTS: usize = 32;

// fixed mix headroom so resizing the pool doesn't pump the level
const HEADROOM: f32 = 0.25;

#[derive(Clone, Copy, Debug)]
struct Slot {
    id: Option<VoiceId>,
    retired: bool,
    voice: SynthVoice,
}

impl Slot {
    fn free(&self) -> bool {
        self.id.is_none()
    }
}

pub struct Engine {
    sample_rate: f32,
    slots: [Slot; ENGINE_SLOTS],
}

impl Engine {
    pub fn new(sample_rate: f32) -> Self {
        let empty = Slot {
            id: None,
            retired: false,
            voice: SynthVoice::new(Waveform::Sine, 0.0),
        };
        Self {
            sample_rate,
            slots: [empty; ENGINE_SLOTS],
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        let sr = self.sample_rate;
        match cmd {
            AudioCommand::Spawn { id, waveform, gain } => self.spawn(id, waveform, gain),
            AudioCommand::Retire { id } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.retired = true;
                    slot.voice.release(sr);
                }
            }
            AudioCommand::Sustain { id, frequency } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.voice.sustain(frequency, sr);
                }
            }
            AudioCommand::Glide { id, frequency, seconds } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.voice.glide(frequency, seconds, sr);
                }
            }
            AudioCommand::Pulse { id, frequency, envelope, hold } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.voice.pulse(frequency, envelope, hold, sr);
                }
            }
            AudioCommand::SetWaveform(w) => {
                for slot in self.slots.iter_mut().filter(|s| !s.free()) {
                    slot.voice.set_waveform(w);
                }
            }
            AudioCommand::SetGain(g) => {
                for slot in self.slots.iter_mut().filter(|s| !s.free()) {
                    slot.voice.set_gain(g);
                }
            }
            AudioCommand::ReleaseAll => {
                for slot in self.slots.iter_mut() {
                    slot.voice.release(sr);
                }
            }
        }
    }

    fn spawn(&mut self, id: VoiceId, waveform: Waveform, gain: f32) {
        // what slot do we write to? a free one, else steal a fading retiree
        let slot = self
            .slots
            .iter()
            .position(Slot::free)
            .or_else(|| self.slots.iter().position(|s| s.retired));
        let Some(slot) = slot else {
            debug!(?id, "no free engine slot, voice dropped");
            return;
        };
        self.slots[slot] = Slot {
            id: Some(id),
            retired: false,
            voice: SynthVoice::new(waveform, gain),
        };
    }

    fn slot_mut(&mut self, id: VoiceId) -> Option<&mut Slot> {
        // unknown ids are normal: the command raced a retire
        self.slots.iter_mut().find(|s| s.id == Some(id) && !s.retired)
    }

    pub fn live_voices(&self) -> usize {
        self.slots.iter().filter(|s| !s.free() && !s.retired).count()
    }

    /// Fill an interleaved buffer, writing the same mono mix to every channel.
    pub fn render_block(&mut self, data: &mut [f32], channels: usize) {
        let sr = self.sample_rate;
        for frame in data.chunks_exact_mut(channels.max(1)) {
            let mut mix = 0.0f32;
            for slot in self.slots.iter_mut().filter(|s| s.id.is_some()) {
                mix += slot.voice.next_sample(sr);
            }
            let out = (mix * HEADROOM).tanh();
            for s in frame.iter_mut() {
                *s = out;
            }
        }

        // retired voices give their slot back once the tail is done
        for slot in self.slots.iter_mut() {
            if slot.retired && slot.voice.is_idle() {
                slot.id = None;
                slot.retired = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::next_voice_id;

    fn peak(engine: &mut Engine, frames: usize) -> f32 {
        let mut buf = vec![0.0f32; frames * 2];
        engine.render_block(&mut buf, 2);
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn spawned_voice_is_silent_until_triggered() {
        let mut e = Engine::new(1000.0);
        let id = next_voice_id();
        e.handle_cmd(AudioCommand::Spawn { id, waveform: Waveform::Square, gain: 1.0 });
        assert_eq!(e.live_voices(), 1);
        assert_eq!(peak(&mut e, 100), 0.0);

        e.handle_cmd(AudioCommand::Sustain { id, frequency: 50.0 });
        assert!(peak(&mut e, 200) > 0.1);
    }

    #[test]
    fn retire_frees_slot_after_tail() {
        let mut e = Engine::new(1000.0);
        let id = next_voice_id();
        e.handle_cmd(AudioCommand::Spawn { id, waveform: Waveform::Sine, gain: 1.0 });
        e.handle_cmd(AudioCommand::Sustain { id, frequency: 50.0 });
        peak(&mut e, 100);
        e.handle_cmd(AudioCommand::Retire { id });
        assert_eq!(e.live_voices(), 0);
        peak(&mut e, 200);
        assert!(e.slots.iter().all(Slot::free));

        // commands for the dead id are ignored
        e.handle_cmd(AudioCommand::Sustain { id, frequency: 50.0 });
        assert_eq!(peak(&mut e, 100), 0.0);
    }

    #[test]
    fn output_is_bounded_with_every_slot_loud() {
        let mut e = Engine::new(1000.0);
        for _ in 0..ENGINE_SLOTS {
            let id = next_voice_id();
            e.handle_cmd(AudioCommand::Spawn { id, waveform: Waveform::Square, gain: 1.0 });
            e.handle_cmd(AudioCommand::Sustain { id, frequency: 10.0 });
        }
        assert!(peak(&mut e, 500) <= 1.0);
    }

    #[test]
    fn release_all_keeps_voices_allocated() {
        let mut e = Engine::new(1000.0);
        let id = next_voice_id();
        e.handle_cmd(AudioCommand::Spawn { id, waveform: Waveform::Sine, gain: 1.0 });
        e.handle_cmd(AudioCommand::Sustain { id, frequency: 50.0 });
        peak(&mut e, 50);
        e.handle_cmd(AudioCommand::ReleaseAll);
        peak(&mut e, 200);
        assert_eq!(e.live_voices(), 1);
        assert_eq!(peak(&mut e, 50), 0.0);
    }
}
