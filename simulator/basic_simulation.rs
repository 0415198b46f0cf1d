//! Basic Aggregation Simulation
//!
//! Direct topology, default parameters, one epoch.
//!
//! Run with: cargo run --example basic_simulation

mod scenario;

use beam_sim::SimConfig;
use log::info;
use scenario::ScenarioRunner;
use simple_logger::SimpleLogger;

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║        Basic Aggregation Simulation                    ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let mut config = SimConfig::default();
    config.topology = 0;
    config.network.num_validators = 128;
    config.network.num_subnet_aggregators = 8;
    config.network.num_global_aggregators = 2;
    config.direct.redundancy_factor = 8;
    config.simulation.epochs = 3;

    info!("Configuration:");
    info!("  Validators: {}", config.network.num_validators);
    info!("  Subnet aggregators: {}", config.network.num_subnet_aggregators);
    info!("  Global aggregators: {}", config.network.num_global_aggregators);
    info!(
        "  Thresholds: subnet {}%, global {}%",
        config.aggregation.subnet_signature_threshold, config.aggregation.finalization_threshold
    );
    info!("");

    let result = ScenarioRunner::new(config)
        .and_then(|runner| runner.run())
        .unwrap_or_else(|e| {
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        });

    result.print_summary();
}
