//! Resolved simulation configuration
//!
//! Every section carries `#[serde(default)]`, so a scenario file only lists
//! the values it changes and the rest comes from the defaults below.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::beam_interface::{SimError, SimTime, MILLIS_PER_SECOND};
use crate::beam_latency::LatencyDistribution;
use crate::beam_topology::TopologyKind;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// 0 = direct, 1 = gossip mesh, 2 = grid
    pub topology: u8,
    pub network: NetworkConfig,
    pub direct: DirectConfig,
    pub gossip: GossipConfig,
    pub grid: GridConfig,
    pub aggregation: AggregationConfig,
    pub latency: LatencyConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub num_validators: usize,
    pub num_subnet_aggregators: usize,
    pub num_global_aggregators: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_validators: 64,
            num_subnet_aggregators: 4,
            num_global_aggregators: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Subnet aggregators each validator connects to
    pub redundancy_factor: usize,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            redundancy_factor: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    pub d: usize,
    pub d_low: usize,
    pub d_high: usize,
    pub seed: u64,
    /// Mesh maintenance period; no heartbeat when unset
    pub heartbeat_interval_ms: Option<SimTime>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            d: 8,
            d_low: 6,
            d_high: 12,
            seed: 42,
            heartbeat_interval_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Nodes per row; `ceil(sqrt(n))` when unset
    pub grid_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub aggregation_rate_per_sec: f64,
    pub recursion_aggregation_rate_per_sec: f64,
    pub snark_proof_size: u64,
    pub signature_size: u64,
    /// Percent of connected validators a subnet aggregator waits for
    pub subnet_signature_threshold: f64,
    /// Percent of connected subnet aggregators a global aggregator waits for
    pub finalization_threshold: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            aggregation_rate_per_sec: 1000.0,
            recursion_aggregation_rate_per_sec: 100.0,
            snark_proof_size: 131_072,
            signature_size: 3072,
            subnet_signature_threshold: 70.0,
            finalization_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub min_ms: u64,
    pub max_ms: u64,
    /// "normal" or "uniform"
    pub distribution: String,
    pub seed: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            min_ms: 10,
            max_ms: 100,
            distribution: "normal".to_string(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_time_seconds: f64,
    /// Epoch ticks sent to every validator
    pub epochs: u64,
    pub epoch_interval_ms: SimTime,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: 60.0,
            epochs: 1,
            epoch_interval_ms: 12_000.0,
        }
    }
}

impl SimulationConfig {
    pub fn max_time_ms(&self) -> SimTime {
        self.max_time_seconds * MILLIS_PER_SECOND
    }
}

fn invalid(reason: String) -> SimError {
    SimError::Configuration(reason)
}

impl SimConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_yaml::from_str(yaml)
            .map_err(|e| invalid(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .map_err(|e| invalid(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn topology_kind(&self) -> Result<TopologyKind, SimError> {
        TopologyKind::from_selector(self.topology)
    }

    /// Reject anything the simulation core would refuse at construction
    pub fn validate(&self) -> Result<(), SimError> {
        self.topology_kind()?;
        self.latency.distribution.parse::<LatencyDistribution>()?;

        if self.latency.min_ms > self.latency.max_ms {
            return Err(invalid(format!(
                "latency min_ms {} exceeds max_ms {}",
                self.latency.min_ms, self.latency.max_ms
            )));
        }
        if self.direct.redundancy_factor == 0 {
            return Err(invalid("redundancy_factor must be at least 1".to_string()));
        }

        let gossip = &self.gossip;
        if gossip.d_low > gossip.d_high || gossip.d < gossip.d_low || gossip.d > gossip.d_high {
            return Err(invalid(format!(
                "gossip degrees must satisfy d_low <= d <= d_high, got {} <= {} <= {}",
                gossip.d_low, gossip.d, gossip.d_high
            )));
        }
        if let Some(interval) = gossip.heartbeat_interval_ms {
            if interval.is_nan() || interval <= 0.0 {
                return Err(invalid(format!(
                    "heartbeat_interval_ms must be positive, got {}",
                    interval
                )));
            }
        }
        if self.grid.grid_size == Some(0) {
            return Err(invalid("grid_size must be positive".to_string()));
        }

        let aggregation = &self.aggregation;
        for (name, rate) in [
            ("aggregation_rate_per_sec", aggregation.aggregation_rate_per_sec),
            (
                "recursion_aggregation_rate_per_sec",
                aggregation.recursion_aggregation_rate_per_sec,
            ),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(invalid(format!("{} must be positive, got {}", name, rate)));
            }
        }
        for (name, threshold) in [
            ("subnet_signature_threshold", aggregation.subnet_signature_threshold),
            ("finalization_threshold", aggregation.finalization_threshold),
        ] {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(invalid(format!(
                    "{} must be a percentage, got {}",
                    name, threshold
                )));
            }
        }

        let simulation = &self.simulation;
        if !simulation.max_time_seconds.is_finite() || simulation.max_time_seconds < 0.0 {
            return Err(invalid(format!(
                "max_time_seconds must be non-negative, got {}",
                simulation.max_time_seconds
            )));
        }
        if !simulation.epoch_interval_ms.is_finite() || simulation.epoch_interval_ms < 0.0 {
            return Err(invalid(format!(
                "epoch_interval_ms must be non-negative, got {}",
                simulation.epoch_interval_ms
            )));
        }
        Ok(())
    }
}
