use sphsim::{ScenarioConfig, Scenario, SphSystemData};
use sphsim::{bench_densities, bench_searchers};

use clap::Parser;
use anyhow::{Context, Result};

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file name under `scenarios/`
    #[arg(short, default_value = "dam_block.yaml")]
    file_name: String,

    /// Write a binary snapshot of the final state to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Run the searcher and density benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path)
        .with_context(|| format!("failed to open scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse scenario {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.bench {
        bench_searchers()?;
        bench_densities()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg)?;
    let system = &mut scenario.system;

    system.build_neighbor_searcher();
    system.update_densities();

    let densities = system.densities();
    let n = densities.len();
    let (min, max) = densities
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));
    let mean = if n > 0 { densities.iter().sum::<f64>() / n as f64 } else { 0.0 };

    println!("particles      : {n}");
    println!("searcher       : {}", system.searcher_kind().name());
    println!("kernel radius  : {:.6}", system.kernel_radius());
    println!("mass           : {:.6e}", system.mass());
    println!("neighbor pairs : {}", system.neighbor_list_table().total_neighbors());
    if n > 0 {
        println!("density        : min {min:.3}, mean {mean:.3}, max {max:.3} (target {:.3})", system.target_density());
    }

    if let Some(path) = args.snapshot {
        system.save_to_file(&path)?;
        // verify the file loads
        let restored = SphSystemData::load_from_file(&path)?;
        anyhow::ensure!(
            restored.number_of_particles() == n,
            "snapshot at {} restored {} particles, expected {n}",
            path.display(),
            restored.number_of_particles()
        );
        println!("snapshot       : {}", path.display());
    }

    Ok(())
}
