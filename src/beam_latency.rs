//! Per-message transit delay sampling
//!
//! Each model owns its own seeded generator so that no other component can
//! perturb its sequence.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::beam_interface::{NodeId, SimError, SimTime};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LatencyDistribution {
    /// Mean at the midpoint, six standard deviations span the range
    Normal,
    Uniform,
}

impl FromStr for LatencyDistribution {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(LatencyDistribution::Normal),
            "uniform" => Ok(LatencyDistribution::Uniform),
            other => Err(SimError::Configuration(format!(
                "unsupported latency distribution: {}",
                other
            ))),
        }
    }
}

pub struct LatencyModel {
    min_ms: u64,
    max_ms: u64,
    distribution: LatencyDistribution,
    normal: Option<Normal<f64>>,
    rng: StdRng,
}

impl LatencyModel {
    pub fn new(
        min_ms: u64,
        max_ms: u64,
        distribution: LatencyDistribution,
        seed: u64,
    ) -> Result<Self, SimError> {
        if min_ms > max_ms {
            return Err(SimError::Configuration(format!(
                "latency min_ms {} exceeds max_ms {}",
                min_ms, max_ms
            )));
        }

        let normal = match distribution {
            LatencyDistribution::Normal => {
                let mean = (min_ms + max_ms) as f64 / 2.0;
                let std_dev = (max_ms - min_ms) as f64 / 6.0;
                let normal = Normal::new(mean, std_dev).map_err(|e| {
                    SimError::Configuration(format!("invalid normal latency: {}", e))
                })?;
                Some(normal)
            }
            LatencyDistribution::Uniform => None,
        };

        Ok(Self {
            min_ms,
            max_ms,
            distribution,
            normal,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Build from a distribution name as it appears in configuration
    pub fn from_name(min_ms: u64, max_ms: u64, distribution: &str, seed: u64) -> Result<Self, SimError> {
        Self::new(min_ms, max_ms, distribution.parse()?, seed)
    }

    pub fn distribution(&self) -> LatencyDistribution {
        self.distribution
    }

    pub fn bounds(&self) -> (u64, u64) {
        (self.min_ms, self.max_ms)
    }

    /// Draw the transit delay for one message. Always a whole number of ms in `[min_ms, max_ms]`.
    pub fn sample(&mut self, _sender: NodeId, _recipient: NodeId) -> SimTime {
        let raw = match &self.normal {
            Some(normal) => normal.sample(&mut self.rng),
            None => self.rng.gen_range(self.min_ms as f64..=self.max_ms as f64),
        };

        // truncate first, then clamp
        let truncated = raw.trunc();
        truncated.clamp(self.min_ms as f64, self.max_ms as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_samples_in_range() {
        let mut model = LatencyModel::new(10, 100, LatencyDistribution::Normal, 42).unwrap();
        for _ in 0..10_000 {
            let latency = model.sample(0, 1);
            assert!((10.0..=100.0).contains(&latency), "out of range: {}", latency);
            assert_eq!(latency.fract(), 0.0, "not a whole millisecond: {}", latency);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let draw = |seed| {
            let mut model = LatencyModel::new(10, 100, LatencyDistribution::Normal, seed).unwrap();
            (0..1_000).map(|i| model.sample(i, i + 1)).collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
        assert_ne!(draw(42), draw(43));
    }

    #[test]
    fn test_uniform_samples_in_range() {
        let mut model = LatencyModel::new(5, 8, LatencyDistribution::Uniform, 1).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..5_000 {
            let latency = model.sample(0, 1);
            assert!((5.0..=8.0).contains(&latency));
            seen.insert(latency as u64);
        }
        // 5, 6 and 7 are all reachable by truncation
        assert!(seen.contains(&5) && seen.contains(&6) && seen.contains(&7));
    }

    #[test]
    fn test_normal_mean_near_midpoint() {
        let mut model = LatencyModel::new(0, 600, LatencyDistribution::Normal, 3).unwrap();
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| model.sample(0, 0)).sum::<f64>() / n as f64;
        // truncation biases the mean down by about half a millisecond
        assert!((mean - 300.0).abs() < 5.0, "mean was {}", mean);
    }

    #[test]
    fn test_degenerate_range() {
        let mut model = LatencyModel::new(30, 30, LatencyDistribution::Normal, 0).unwrap();
        assert_eq!(model.sample(1, 2), 30.0);
    }

    #[test]
    fn test_configuration_errors() {
        assert!(matches!(
            LatencyModel::from_name(10, 100, "pareto", 42),
            Err(SimError::Configuration(_))
        ));
        assert!(matches!(
            LatencyModel::new(100, 10, LatencyDistribution::Uniform, 42),
            Err(SimError::Configuration(_))
        ));
        let model = LatencyModel::from_name(10, 100, "Uniform", 42).unwrap();
        assert_eq!(model.distribution(), LatencyDistribution::Uniform);
        assert_eq!(model.bounds(), (10, 100));
    }
}
