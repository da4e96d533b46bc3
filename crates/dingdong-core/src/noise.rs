use std::sync::Arc;

use rand::Rng;
use serde::{Serialize, Serializer};
use tracing::debug;

pub const NOISE_DURATION_SECONDS: f64 = 0.085;
pub const NOISE_DECAY_EXPONENT: f64 = 2.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseBuffer {
    pub sample_rate: u32,
    #[serde(rename = "frames", serialize_with = "serialize_frame_count")]
    samples: Vec<f32>,
}

impl NoiseBuffer {
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> Self {
        let frames = Self::frame_count(sample_rate);
        let samples = (0..frames)
            .map(|index| {
                let white: f64 = rng.gen_range(-1.0..=1.0);
                (white * Self::envelope_at(index, frames)) as f32
            })
            .collect();
        Self {
            sample_rate,
            samples,
        }
    }

    #[must_use]
    pub fn frame_count(sample_rate: u32) -> usize {
        (f64::from(sample_rate) * NOISE_DURATION_SECONDS).floor() as usize
    }

    /// Amplitude bound of frame `index` in a buffer of `frames` frames.
    #[must_use]
    pub fn envelope_at(index: usize, frames: usize) -> f64 {
        if frames == 0 {
            return 0.0;
        }
        let remaining = 1.0 - index as f64 / frames as f64;
        remaining.max(0.0).powf(NOISE_DECAY_EXPONENT)
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

fn serialize_frame_count<S: Serializer>(samples: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(samples.len() as u64)
}

#[derive(Debug, Default)]
pub struct NoiseTransientCache {
    cached: Option<Arc<NoiseBuffer>>,
}

impl NoiseTransientCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, sample_rate: u32) -> Arc<NoiseBuffer> {
        self.get_with_rng(sample_rate, &mut rand::thread_rng())
    }

    pub fn get_with_rng<R: Rng + ?Sized>(
        &mut self,
        sample_rate: u32,
        rng: &mut R,
    ) -> Arc<NoiseBuffer> {
        if let Some(buffer) = self
            .cached
            .as_ref()
            .filter(|buffer| buffer.sample_rate == sample_rate)
        {
            return Arc::clone(buffer);
        }

        let buffer = Arc::new(NoiseBuffer::generate(sample_rate, rng));
        debug!(sample_rate, frames = buffer.len(), "noise transient regenerated");
        self.cached = Some(Arc::clone(&buffer));
        buffer
    }

    #[must_use]
    pub fn cached_sample_rate(&self) -> Option<u32> {
        self.cached.as_ref().map(|buffer| buffer.sample_rate)
    }
}
