//! Vivarium CLI - Run headless scenarios from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use vivarium::{
    compute::{
        HeadlessVivarium, SpatialQuery, Terrain, VivariumError,
        evolution::GenomeArchive,
    },
    schema::ScenarioConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.json> [rounds]", args[0]);
        eprintln!();
        eprintln!("Run a headless vivarium scenario from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  scenario.json  Path to scenario file");
        eprintln!("  rounds         Number of rounds (default: from scenario)");
        eprintln!();
        eprintln!("Example scenario is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_scenario();
        return;
    }

    let scenario_path = PathBuf::from(&args[1]);

    let scenario_str = fs::read_to_string(&scenario_path).unwrap_or_else(|e| {
        eprintln!("Error reading scenario file: {}", e);
        std::process::exit(1);
    });

    let mut scenario: ScenarioConfig = serde_json::from_str(&scenario_str).unwrap_or_else(|e| {
        eprintln!("Error parsing scenario: {}", e);
        std::process::exit(1);
    });

    if let Some(rounds) = args.get(2).and_then(|s| s.parse().ok()) {
        scenario.rounds = rounds;
    }

    if let Err(e) = run(&scenario) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(scenario: &ScenarioConfig) -> Result<HeadlessVivarium, VivariumError> {
    scenario.validate()?;

    let config = scenario.vivarium_config();
    let terrain = Terrain::from_config(&scenario.terrain);
    let mut vivarium = HeadlessVivarium::headless(config.clone(), terrain, scenario.tick_seconds)?;

    if let Some(dir) = &scenario.seed_archive_dir {
        let seeds = GenomeArchive::load_from_dir(dir, config.archive.capacity)?;
        println!("Seeding from {} archived genomes", seeds.len());
        vivarium = vivarium.with_seed_genomes(seeds.genomes());
    }

    if let Some(dir) = &scenario.archive_dir {
        let archive = GenomeArchive::new(config.archive.capacity).with_output_dir(dir)?;
        vivarium = vivarium.with_archive(archive);
    }

    for &(x, y) in &scenario.cities {
        vivarium.add_city(x, y)?;
    }
    Ok(vivarium)
}

fn run(scenario: &ScenarioConfig) -> Result<(), VivariumError> {
    let mut vivarium = build(scenario)?;

    println!("Vivarium Scenario");
    println!("=================");
    let (width, depth) = Terrain::from_config(&scenario.terrain).extent();
    println!("Terrain: {:.0}x{:.0}", width, depth);
    println!("Cities: {}", scenario.cities.len());
    println!("Critters per city: {}", scenario.vivarium.critters_per_city);
    println!("Phase time limit: {}s", scenario.vivarium.phase_time_limit);
    println!("Rounds: {}", scenario.rounds);
    println!();

    let start = Instant::now();
    vivarium.start();

    for _ in 0..scenario.rounds {
        let finished = vivarium.run_round(scenario.max_ticks_per_round);
        if let Some(summary) = vivarium.last_summary() {
            println!(
                "  Round {:>3}: population={:>3}, home={:>3}, eaten={:>3}, best={:.3}, mean={:.3}, diversity={:.3}{}",
                summary.round,
                summary.population,
                summary.critters_home,
                summary.critters_eaten,
                summary.best_fitness,
                summary.mean_fitness,
                summary.diversity,
                if finished { "" } else { " (forced)" }
            );
        }
        if vivarium.world().critters().is_empty() {
            println!();
            println!("Population is extinct.");
            break;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "Time: {:.2}s ({} rounds)",
        elapsed.as_secs_f32(),
        vivarium.history().len()
    );

    if let Some(path) = &scenario.history_path {
        vivarium.history().save(path)?;
        println!("History written to {}", path.display());
    }

    if scenario.archive_dir.is_some() {
        let saved = vivarium.archive_mut().save_all()?;
        println!("Archived {} genomes", saved.len());
    }

    Ok(())
}

fn print_example_scenario() {
    let scenario = ScenarioConfig::default();

    println!("Example scenario (scenario.json):");
    match serde_json::to_string_pretty(&scenario) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
