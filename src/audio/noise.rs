//! Pink-noise buffer generation
//!
//! Filters uniform white noise through the 6-pole recursive approximation
//! (Paul Kellet's economy filter) into a loopable single-channel buffer.
//! The buffer is generated once per activation that requests noise and then
//! loops indefinitely; it is never regenerated mid-playback.

use rand::Rng;

/// Buffer length in seconds of audio.
pub const NOISE_BUFFER_SECS: u32 = 2;

/// 6-pole pink filter state.
#[derive(Debug, Default)]
struct PinkFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    b3: f32,
    b4: f32,
    b5: f32,
    b6: f32,
}

impl PinkFilter {
    fn process(&mut self, white: f32) -> f32 {
        self.b0 = 0.99886 * self.b0 + white * 0.0555179;
        self.b1 = 0.99332 * self.b1 + white * 0.0750759;
        self.b2 = 0.96900 * self.b2 + white * 0.1538520;
        self.b3 = 0.86650 * self.b3 + white * 0.3104856;
        self.b4 = 0.55000 * self.b4 + white * 0.5329522;
        self.b5 = -0.7616 * self.b5 - white * 0.0168980;
        let out =
            (self.b0 + self.b1 + self.b2 + self.b3 + self.b4 + self.b5 + self.b6 + white * 0.5362)
                * 0.11;
        self.b6 = white * 0.115926;
        out
    }
}

/// Generate a loopable pink-noise buffer of exactly
/// `NOISE_BUFFER_SECS * sample_rate` samples.
pub fn generate_buffer(sample_rate: u32) -> Vec<f32> {
    generate_buffer_with(&mut rand::thread_rng(), sample_rate)
}

/// Same as [`generate_buffer`] but drawing white noise from the given source.
pub fn generate_buffer_with<R: Rng>(rng: &mut R, sample_rate: u32) -> Vec<f32> {
    let len = (NOISE_BUFFER_SECS * sample_rate) as usize;
    let mut filter = PinkFilter::default();
    let mut buffer = Vec::with_capacity(len);
    for _ in 0..len {
        let white: f32 = rng.gen_range(-1.0..=1.0);
        buffer.push(filter.process(white));
    }
    buffer
}
