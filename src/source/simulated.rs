//! Simulated ECG-like signal source.
//!
//! Synthesizes a sine carrier with additive noise, standing in for a live
//! device feed during local monitoring sessions.

use crate::source::types::SignalSample;
use crate::source::SampleSource;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Amplitude of the sine carrier.
const CARRIER_AMPLITUDE: f64 = 0.5;

/// Peak-to-peak range of the noise term.
const NOISE_RANGE: f64 = 0.3;

/// A source that synthesizes one sample per poll.
pub struct SimulatedSource {
    device_id: String,
    started: Instant,
    rng: SmallRng,
}

impl SimulatedSource {
    /// Create a new simulated source.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            started: Instant::now(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Create a source with a fixed seed for reproducible output.
    pub fn with_seed(device_id: impl Into<String>, seed: u64) -> Self {
        Self {
            device_id: device_id.into(),
            started: Instant::now(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SampleSource for SimulatedSource {
    fn poll_sample(&mut self) -> Option<SignalSample> {
        let t = self.started.elapsed().as_secs_f64();
        let noise: f64 = self.rng.gen::<f64>() * NOISE_RANGE - NOISE_RANGE / 2.0;
        Some(SignalSample::new(t.sin() * CARRIER_AMPLITUDE + noise))
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_produces_a_sample() {
        let mut source = SimulatedSource::with_seed("sim", 7);
        for _ in 0..100 {
            assert!(source.poll_sample().is_some());
        }
    }

    #[test]
    fn test_values_stay_in_signal_range() {
        let mut source = SimulatedSource::with_seed("sim", 7);
        for _ in 0..1000 {
            let v = source.poll_sample().unwrap().value;
            assert!(
                (-CARRIER_AMPLITUDE - NOISE_RANGE / 2.0..=CARRIER_AMPLITUDE + NOISE_RANGE / 2.0)
                    .contains(&v),
                "value out of range: {v}"
            );
        }
    }

    #[test]
    fn test_seeded_sources_differ_over_time() {
        let mut source = SimulatedSource::with_seed("sim", 7);
        let first = source.poll_sample().unwrap().value;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = source.poll_sample().unwrap().value;
        assert_ne!(first, second);
    }
}
