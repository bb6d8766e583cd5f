//! Mesh Life CLI - Run partitioned simulations from JSON configuration.

use std::fs;
use std::path::PathBuf;

use mesh_life::{distributed::launch, render::open_renderer, schema::SimulationConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [ticks]", args[0]);
        eprintln!();
        eprintln!("Run a partitioned Game of Life from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  ticks        Number of generations (overrides the config)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(ticks) = args.get(2) {
        config.ticks = ticks.parse().unwrap_or_else(|e| {
            eprintln!("Invalid tick count '{}': {}", ticks, e);
            std::process::exit(1);
        });
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    println!("Mesh Life Simulation");
    println!("====================");
    println!("Grid: {}x{} ({} cells)", config.width, config.height, config.grid_size());
    println!("Processes: {}", config.processes);
    println!("Rule: {:?}", config.rule);
    println!("Ticks: {}", config.ticks);
    println!("Renderer: {:?}", config.output.renderer);
    println!();

    let renderer = open_renderer(&config).unwrap_or_else(|e| {
        eprintln!("Error opening renderer: {}", e);
        std::process::exit(1);
    });

    let summary = launch(&config, renderer).unwrap_or_else(|e| {
        eprintln!("Simulation failed: {}", e);
        std::process::exit(1);
    });

    println!("Final state:");
    println!("  Live cells: {}", summary.final_population);
    println!(
        "Time: {:.2}s ({:.2?} per tick)",
        summary.elapsed.as_secs_f32(),
        summary.mean_tick
    );
}

fn print_example_config() {
    let config = SimulationConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
