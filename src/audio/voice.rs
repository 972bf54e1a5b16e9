use crate::audio_api::{Envelope, Waveform};

// gain smoothing coefficient per sample, roughly 5ms at 48k
const GAIN_SMOOTH: f32 = 0.004;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Hold,
    Sustain,
    Release,
}

// One oscillator + AR envelope + gain. Owned by the engine, lives in a fixed
// slot array, so nothing in here allocates.
#[derive(Clone, Copy, Debug)]
pub struct SynthVoice {
    waveform: Waveform,
    phase: f32, // 0..1
    freq: f32,
    glide_ratio: f32,
    glide_left: u32,
    gain: f32,
    gain_target: f32,
    stage: Stage,
    level: f32,
    attack_step: f32,
    release_step: f32,
    hold_left: u32,
    release_secs: f32,
}

impl SynthVoice {
    pub fn new(waveform: Waveform, gain: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            freq: 0.0,
            glide_ratio: 1.0,
            glide_left: 0,
            gain,
            gain_target: gain,
            stage: Stage::Idle,
            level: 0.0,
            attack_step: 1.0,
            release_step: 1.0,
            hold_left: 0,
            release_secs: Envelope::SUSTAIN.release,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn is_sounding(&self) -> bool {
        matches!(self.stage, Stage::Attack | Stage::Hold | Stage::Sustain)
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain_target = gain;
    }

    /// Held tone. Re-attacks from the current level so a retrigger never jumps.
    pub fn sustain(&mut self, frequency: f32, sample_rate: f32) {
        self.freq = frequency;
        self.glide_left = 0;
        if !self.is_sounding() {
            self.start_attack(Envelope::SUSTAIN, sample_rate);
        }
        self.hold_left = u32::MAX;
    }

    pub fn glide(&mut self, frequency: f32, seconds: f32, sample_rate: f32) {
        if self.freq <= 0.0 {
            self.freq = frequency;
            return;
        }
        let n = (seconds.max(0.0) * sample_rate) as u32;
        if n == 0 {
            self.freq = frequency;
            self.glide_left = 0;
            return;
        }
        // constant ratio per sample = straight line in log-frequency
        self.glide_ratio = (frequency / self.freq).powf(1.0 / n as f32);
        self.glide_left = n;
    }

    pub fn pulse(&mut self, frequency: f32, envelope: Envelope, hold: f32, sample_rate: f32) {
        self.freq = frequency;
        self.glide_left = 0;
        self.start_attack(envelope, sample_rate);
        self.hold_left = (hold.max(0.0) * sample_rate) as u32;
    }

    pub fn release(&mut self, sample_rate: f32) {
        if self.stage == Stage::Idle || self.stage == Stage::Release {
            return;
        }
        let samples = (self.release_secs * sample_rate).max(1.0);
        self.release_step = self.level.max(1e-6) / samples;
        self.stage = Stage::Release;
    }

    fn start_attack(&mut self, envelope: Envelope, sample_rate: f32) {
        self.attack_step = 1.0 / (envelope.attack * sample_rate).max(1.0);
        self.release_secs = envelope.release.max(0.001);
        self.stage = Stage::Attack;
    }

    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        match self.stage {
            Stage::Idle => return 0.0,
            Stage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Hold;
                }
            }
            Stage::Hold => {
                if self.hold_left == u32::MAX {
                    self.stage = Stage::Sustain;
                } else if self.hold_left == 0 {
                    self.release(sample_rate);
                } else {
                    self.hold_left -= 1;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                    return 0.0;
                }
            }
        }

        if self.glide_left > 0 {
            self.freq *= self.glide_ratio;
            self.glide_left -= 1;
        }
        self.gain += (self.gain_target - self.gain) * GAIN_SMOOTH;

        let out = oscillate(self.waveform, self.phase);
        self.phase += self.freq / sample_rate;
        self.phase -= self.phase.floor();

        out * self.level * self.gain
    }
}

fn oscillate(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (std::f32::consts::TAU * phase).sin(),
        Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    }
}
