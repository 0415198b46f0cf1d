//! # beam-sim - Attestation Aggregation Network Simulator
//!
//! A deterministic discrete-event simulator for studying how a large validator
//! population disseminates and aggregates signatures over different network
//! topologies (direct, gossip mesh, grid) with two-level threshold aggregation
//! (validator -> subnet aggregator -> global aggregator).
//!
//! ## Core Components
//!
//! - **Simulator**: time-ordered event queue and monotonic clock
//! - **Topology**: connectivity graph and message routing, one variant per layout
//! - **BeamNetwork**: the event handler, owning nodes, topology and accounting
//! - **Nodes**: validator and aggregator state machines
//! - **MetricsCollector**: per-node traffic, latency samples, aggregation progress
//!
//! ## Usage
//!
//! ```no_run
//! use beam_sim::{BeamNetwork, MetricsCollector, SimConfig, Simulator};
//!
//! let config = SimConfig::load("scenarios/direct.yaml")?;
//! let mut network = BeamNetwork::from_config(&config, MetricsCollector::new())?;
//! let mut sim = Simulator::new();
//!
//! network.schedule_epoch(&mut sim, 0, 0.0)?;
//! let end = sim.run(&mut network, Some(config.simulation.max_time_ms()))?;
//!
//! println!("finished at t={}ms", end);
//! println!("mean latency {:?}", network.metrics().mean_latency());
//! # Ok::<(), beam_sim::SimError>(())
//! ```
//!
//! ## Scenarios
//!
//! YAML scenarios and the comparison drivers live in `simulator/` and
//! `scenarios/`; see the `scenario_runner` binary.

// Simulation core
pub mod beam_event_queue;
pub mod beam_interface;
pub mod beam_simulator;

// Network models
pub mod beam_bandwidth;
pub mod beam_graph;
pub mod beam_latency;
pub mod beam_topology;

// Aggregation
pub mod beam_aggregation;
pub mod beam_nodes;

pub mod beam_config;
pub mod beam_metrics;
pub mod beam_network;

// Re-export commonly used types
pub use beam_config::SimConfig;
pub use beam_interface::{
    Epoch, Message, MetricsSink, NoOpSink, NodeId, Payload, ProofKind, Role, SimError, SimEvent,
    SimTime, SnarkProof,
};
pub use beam_metrics::MetricsCollector;
pub use beam_network::BeamNetwork;
pub use beam_simulator::{EventHandler, SimState, Simulator};
pub use beam_topology::{Topology, TopologyKind};
