// Scenario driver module: builds a network from a SimConfig, seeds epoch
// ticks, runs the simulator and condenses the outcome into a ScenarioResult.

pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use runner::ScenarioRunner;

pub use stats::{
    AggregationStats,
    LatencyStats,
    RoleTraffic,
    ScenarioResult,
    TrafficStats,
};
