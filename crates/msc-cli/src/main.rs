use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use msc_sim::SimulationConfig;

#[derive(Parser, Debug)]
#[command(name = "msc-sim", about = "Multispecies coalescent direct simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw independent samples from a configured model and write the logs.
    Simulate(SimulateArgs),
    /// Check a configuration without running it.
    Validate(ValidateArgs),
}

#[derive(ClapArgs, Debug)]
struct SimulateArgs {
    /// YAML configuration describing the simulation run.
    #[arg(long)]
    config: PathBuf,
    /// Output directory, overriding the configured one.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Master seed, overriding the configured one.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct ValidateArgs {
    /// YAML configuration to check.
    #[arg(long)]
    config: PathBuf,
    /// Print the normalised configuration with all defaults filled in.
    #[arg(long)]
    print: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => run_simulate(args),
        Command::Validate(args) => run_validate(args),
    }
}

fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.config)?;
    if let Some(out) = &args.out {
        config.output.directory = out.clone();
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }

    let mut model = msc_sim::build(&config)?;
    let report = model.run()?;

    write_json(config.output.directory.join("report.json"), &report)?;
    // Persist the configuration next to the outputs for reproducibility.
    fs::copy(&args.config, config.output.directory.join("config.yaml")).ok();

    println!("{}", report.summary());
    for output in &report.outputs {
        println!("  {} -> {}", output.label, output.path.display());
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    if let Err(err) = config.validate() {
        eprintln!("configuration rejected: {err}");
        return Err(Box::new(err));
    }
    println!("configuration ok");
    println!("digest: {}", config.digest()?);
    println!("species taxa: {}", config.species.taxa.len());
    println!("gene trees: {}", config.genes.len());
    if args.print {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<SimulationConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config = SimulationConfig::from_yaml(&contents)?;
    Ok(config)
}

fn write_json<P: AsRef<Path>, T: serde::Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
