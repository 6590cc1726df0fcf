use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use hexworld::cli::commands;
use hexworld::config::simulation::SimulationConfig;
use hexworld::persistence;

#[derive(Parser)]
#[command(name = "hexworld")]
#[command(about = "A deterministic hex-grid geopolitics simulation with trade, war, colonization and events")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new world from a preset and seed
    Generate {
        /// Preset id (tess, we1914, bac1200); defaults to the configured preset
        #[arg(short, long)]
        preset: Option<String>,

        /// Seed text; defaults to the configured seed
        #[arg(short, long, conflicts_with = "random_seed")]
        seed: Option<String>,

        /// Draw a fresh random seed
        #[arg(long)]
        random_seed: bool,

        /// Output snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        output: String,
    },

    /// Run ticks on the latest snapshot (or a given one) and save the result
    Run {
        /// Path to a specific world snapshot to load
        #[arg(short, long)]
        world: Option<String>,

        /// Number of ticks; defaults to ticks_per_run
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Inspect hex, civilization or world state
    Inspect {
        /// Path to a specific world snapshot to load
        #[arg(short, long)]
        snapshot: Option<String>,

        /// Hex ID to inspect
        #[arg(long)]
        hex: Option<u32>,

        /// Civilization tag to inspect
        #[arg(long)]
        civ: Option<String>,

        /// Print the world report
        #[arg(long)]
        world: bool,
    },

    /// Export the world as a JSON document
    Export {
        /// Path to a specific world snapshot to load
        #[arg(short, long)]
        snapshot: Option<String>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Manage world snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        dir: String,
    },

    /// Restore and display a world from a snapshot file
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

fn load_config(path: &str) -> SimulationConfig {
    match SimulationConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_on_error(result: Result<(), String>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli.config);
    init_logging(&config);

    match cli.command {
        Commands::Generate {
            preset,
            seed,
            random_seed,
            output,
        } => {
            let seed = if random_seed {
                Some(commands::random_seed())
            } else {
                seed
            };
            exit_on_error(commands::generate(
                &config,
                preset.as_deref(),
                seed.as_deref(),
                Path::new(&output),
            ));
        }

        Commands::Run { world, ticks } => {
            exit_on_error(commands::run_simulation(&config, world.as_deref(), ticks));
        }

        Commands::Inspect {
            snapshot,
            hex,
            civ,
            world,
        } => {
            exit_on_error(commands::inspect(
                &config,
                snapshot.as_deref(),
                hex,
                civ.as_deref(),
                world,
            ));
        }

        Commands::Export { snapshot, output } => {
            exit_on_error(commands::export(
                &config,
                snapshot.as_deref(),
                output.as_deref().map(Path::new),
            ));
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir } => {
                let snapshot_dir = Path::new(&dir);
                match persistence::list_snapshots(snapshot_dir) {
                    Ok(snapshots) => {
                        if snapshots.is_empty() {
                            println!("No snapshots found in {}", snapshot_dir.display());
                        } else {
                            println!(
                                "{:<34} {:<8} {:<14} {:>8} {:>12}",
                                "File", "Preset", "Seed", "Tick", "Size"
                            );
                            println!("{}", "-".repeat(80));
                            for s in &snapshots {
                                let name = s
                                    .path
                                    .file_name()
                                    .and_then(|n| n.to_str())
                                    .unwrap_or("?");
                                println!(
                                    "{:<34} {:<8} {:<14} {:>8} {:>9} KB",
                                    name,
                                    s.header.preset.id(),
                                    s.header.seed_text,
                                    s.header.tick,
                                    s.file_size / 1024
                                );
                            }
                            println!(
                                "\n{} snapshot(s) in {}",
                                snapshots.len(),
                                snapshot_dir.display()
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("Error listing snapshots: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            SnapshotAction::Restore { file } => {
                let path = Path::new(&file);
                match persistence::load_snapshot(path) {
                    Ok(world) => {
                        println!("Restored world from {}", path.display());
                        commands::print_world_summary(&world);
                    }
                    Err(e) => {
                        eprintln!("Error restoring snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}
