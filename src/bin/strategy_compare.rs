use std::io::Write;
use std::str::FromStr;

use clap::Parser;
use env_logger::Builder;

use fuse_scheduling::{
    ParallelSimulationsLauncher, ScenarioKind, SchedulingSimulation, SimulationConfig,
    StrategyKind,
};

/// Runs the scenario x strategy comparison matrix and prints the resulting
/// metrics.
#[derive(Parser)]
#[command(name = "strategy-compare")]
struct Args {
    /// Scenario preset (mixed-workload, high-density, memory-intensive,
    /// cpu-intensive, burst-load) or `all`.
    #[arg(long, default_value = "mixed-workload")]
    scenario: String,

    /// YAML simulation config path; overrides --scenario.
    #[arg(long)]
    config: Option<String>,

    /// Comma-separated strategies to run.
    #[arg(long, value_delimiter = ',', default_value = "binpacking,drf,fuse")]
    strategies: Vec<String>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Repeated trials per scenario/strategy pair, seeded seed..seed+trials.
    #[arg(long, default_value_t = 1)]
    trials: u64,

    /// Where to dump the results as JSON.
    #[arg(long)]
    output: Option<String>,
}

fn configs(args: &Args) -> Result<Vec<SimulationConfig>, String> {
    if let Some(path) = &args.config {
        return Ok(vec![SimulationConfig::from_file(path).map_err(|e| e.to_string())?]);
    }
    if args.scenario == "all" {
        return Ok(ScenarioKind::all().iter().map(|kind| kind.config()).collect());
    }
    let kind = ScenarioKind::from_str(&args.scenario).map_err(|e| e.to_string())?;
    Ok(vec![kind.config()])
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();

    let configs = match configs(&args) {
        Ok(configs) => configs,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    let mut strategies = Vec::new();
    for name in &args.strategies {
        match StrategyKind::from_str(name) {
            Ok(kind) => strategies.push(kind),
            Err(error) => {
                eprintln!("{}", error);
                std::process::exit(1);
            }
        }
    }

    let mut launcher = ParallelSimulationsLauncher::new();
    for config in &configs {
        for strategy in &strategies {
            // a fuse block in the config overrides the default weights
            let strategy = match (strategy, &config.scheduler.fuse) {
                (StrategyKind::Fuse(_), Some(weights)) => StrategyKind::Fuse(*weights),
                (strategy, _) => strategy.clone(),
            };
            for trial in 0..args.trials {
                let simulation =
                    match SchedulingSimulation::from_seed(args.seed + trial, config.clone()) {
                        Ok(simulation) => simulation,
                        Err(error) => {
                            eprintln!("{}", error);
                            std::process::exit(1);
                        }
                    };
                launcher.add_run(simulation, strategy.clone());
            }
        }
    }

    let outcomes = launcher.run_simulations();

    let mut results = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => {
                eprintln!("run failed: {}", error);
                std::process::exit(1);
            }
        }
    }

    println!(
        "{:<18} {:<12} {:>6} {:>9} {:>9} {:>7} {:>8} {:>7} {:>9}",
        "scenario", "strategy", "seed", "success%", "time(ms)", "util%", "energy%", "failed", "makespan"
    );
    for result in &results {
        println!(
            "{:<18} {:<12} {:>6} {:>9.1} {:>9.2} {:>7.1} {:>8.1} {:>7} {:>9.1}",
            result.scenario,
            result.strategy,
            result.seed.unwrap_or(0),
            result.scheduling_success_rate,
            result.average_scheduling_time,
            result.resource_utilization,
            result.energy_efficiency,
            result.failed_containers,
            result.makespan,
        );
    }

    if let Some(output) = &args.output {
        let file = match std::fs::File::create(output) {
            Ok(file) => file,
            Err(error) => {
                eprintln!("can't create {}: {}", output, error);
                std::process::exit(1);
            }
        };
        serde_json::to_writer_pretty(file, &results).expect("can't serialize results");
        println!("results written to {}", output);
    }
}
