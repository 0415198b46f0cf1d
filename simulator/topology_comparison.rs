// Topology Comparison Scenario
//
// Runs the same validator population and aggregation parameters over the
// direct, gossip mesh and grid topologies and prints the headline numbers
// side by side.
//
// Run with: cargo run --example topology_comparison [--seed N]

mod scenario;

use beam_sim::{SimConfig, TopologyKind};
use scenario::{ScenarioResult, ScenarioRunner};
use simple_logger::SimpleLogger;
use std::env;

fn base_config(seed: u64) -> SimConfig {
    let mut config = SimConfig::default();
    config.network.num_validators = 100;
    config.network.num_subnet_aggregators = 4;
    config.network.num_global_aggregators = 1;
    config.direct.redundancy_factor = 4;
    config.latency.seed = seed;
    config.gossip.seed = seed;
    config.gossip.heartbeat_interval_ms = Some(1000.0);
    config.simulation.epochs = 2;
    config
}

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();
    let seed = if args.len() >= 3 && args[1] == "--seed" {
        args[2].parse().unwrap_or(42)
    } else {
        42
    };

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO: Topology Comparison                         ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Objective:");
    println!("  Compare aggregation latency and bandwidth of the same");
    println!("  validator set under direct, gossip mesh and grid links.\n");

    let mut results: Vec<ScenarioResult> = Vec::new();
    for selector in 0..=2u8 {
        let mut config = base_config(seed);
        config.topology = selector;
        match ScenarioRunner::new(config).and_then(|runner| runner.run()) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("topology {} failed: {}", selector, e);
                std::process::exit(1);
            }
        }
    }

    println!(
        "{:<12} {:>10} {:>14} {:>14} {:>12} {:>12}",
        "topology", "rounds", "first final", "bytes sent", "mean lat", "max lat"
    );
    for result in &results {
        println!(
            "{:<12} {:>10} {:>14} {:>14} {:>12} {:>12}",
            result.topology.as_str(),
            result.aggregation.subnet_rounds,
            fmt_ms(result.aggregation.first_global_finalization),
            result.traffic.total_sent,
            fmt_ms(result.latency.mean),
            fmt_ms(result.latency.max)
        );
    }
    println!();

    let cheapest = results
        .iter()
        .min_by_key(|r| r.traffic.total_sent)
        .map(|r| r.topology);
    if cheapest == Some(TopologyKind::Direct) {
        println!("Direct links used the least bandwidth, as expected without relaying.");
    }

    for result in &results {
        result.print_summary();
    }
}

fn fmt_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}ms", v))
}
