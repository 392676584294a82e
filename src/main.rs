//! vital-monitor - keep an eye on on-screen vitals and press the heal key.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use vital_monitor_lib::commands::{self, run::RunOptions, CommandContext};
use vital_monitor_lib::models::config::DebugConfig;
use vital_monitor_lib::models::region::Region;
use vital_monitor_lib::Metric;

#[derive(Parser)]
#[command(name = "vital-monitor")]
#[command(about = "Watch HP/Mana numbers on screen and press recovery keys")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every OCR attempt
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring
    Run {
        /// Log key presses without sending them
        #[arg(long)]
        dry_run: bool,

        /// Override the maximum HP
        #[arg(long)]
        max_hp: Option<u32>,

        /// Override the maximum mana and enable mana monitoring
        #[arg(long)]
        max_mana: Option<u32>,

        /// Start with auto-haste switched on
        #[arg(long)]
        haste: bool,
    },

    /// Read a region a few times and show every OCR attempt
    Probe {
        /// Metric to read (hp or mana)
        #[arg(short, long, default_value = "hp", value_parser = parse_metric)]
        metric: Metric,

        /// Number of samples
        #[arg(short, long, default_value = "5")]
        samples: u32,
    },

    /// Show or edit the stored screen regions
    Regions {
        #[command(subcommand)]
        action: RegionAction,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RegionAction {
    /// List stored regions
    Show,

    /// Store a region by position and size
    Set {
        name: String,
        #[arg(allow_negative_numbers = true)]
        left: i32,
        #[arg(allow_negative_numbers = true)]
        top: i32,
        width: u32,
        height: u32,
    },

    /// Store a region by two opposite corners
    FromCorners {
        name: String,
        #[arg(allow_negative_numbers = true)]
        x1: i32,
        #[arg(allow_negative_numbers = true)]
        y1: i32,
        #[arg(allow_negative_numbers = true)]
        x2: i32,
        #[arg(allow_negative_numbers = true)]
        y2: i32,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write the default configuration if none exists
    Init,
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    Metric::from_label(s).ok_or_else(|| format!("Unknown metric '{}'. Use hp or mana.", s))
}

/// Install the global fmt subscriber
///
/// Command-line flags win over the config's debug section.
fn init_logging(cli: &Cli, debug: &DebugConfig) -> Result<(), String> {
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let json = cli.json || debug.json;

    let (writer, ansi) = match cli.log_file.as_ref().or(debug.log_file.as_ref()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| format!("Failed to install logger: {}", e))
}

async fn dispatch(context: &CommandContext, command: Commands) -> Result<(), String> {
    match command {
        Commands::Run {
            dry_run,
            max_hp,
            max_mana,
            haste,
        } => {
            let options = RunOptions {
                dry_run,
                max_hp,
                max_mana,
                haste,
            };
            commands::run::run(context, options).await
        }

        Commands::Probe { metric, samples } => commands::probe::probe(context, metric, samples).await,

        Commands::Regions { action } => match action {
            RegionAction::Show => commands::regions::show(context),
            RegionAction::Set {
                name,
                left,
                top,
                width,
                height,
            } => commands::regions::set(context, &name, Region::new(left, top, width, height)),
            RegionAction::FromCorners { name, x1, y1, x2, y2 } => {
                commands::regions::set_from_corners(context, &name, (x1, y1), (x2, y2))
            }
        },

        Commands::Config { action } => match action {
            ConfigAction::Path => commands::config::path(context),
            ConfigAction::Show => commands::config::show(context),
            ConfigAction::Init => commands::config::init(context),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let context = match CommandContext::new(cli.config.clone()) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // A broken config is reported by the command itself; logging falls back to defaults
    let debug = context
        .load_config()
        .map(|config| config.debug)
        .unwrap_or_default();
    if let Err(e) = init_logging(&cli, &debug) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = dispatch(&context, cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
