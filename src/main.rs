use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use problembank::cli::commands::run::RunOptions;
use problembank::types::AllocationKey;

#[derive(Parser)]
#[command(name = "problembank")]
#[command(
    version,
    about = "Problem pool allocator with on-demand LLM refill"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, short, global = true, help = "Only log errors")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize problembank in the current directory
    Init {
        #[arg(long, help = "Re-run initialization on an existing project")]
        force: bool,
    },

    /// Claim one unused problem, refilling the pool if it is empty
    Acquire {
        #[arg(long, short)]
        topic: String,
        #[arg(long, short, default_value = "Medium", help = "Easy, Medium or Hard")]
        difficulty: String,
        #[arg(short, long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Serve a batch of work units, acquiring at most once per key
    Run {
        #[arg(
            long = "key",
            short,
            value_name = "TOPIC:DIFFICULTY",
            help = "Key to serve (repeatable)"
        )]
        keys: Vec<AllocationKey>,
        #[arg(long, help = "JSON file of {id, topic, difficulty} work units")]
        units: Option<PathBuf>,
        #[arg(short, long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Show pool counts per key
    Status {
        #[arg(short, long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mproblembank encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { force } => {
            problembank::cli::commands::init::run(force)?;
        }
        Commands::Acquire {
            topic,
            difficulty,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(problembank::cli::commands::acquire::run(
                &topic,
                &difficulty,
                &format,
            ))?;
        }
        Commands::Run {
            keys,
            units,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(problembank::cli::commands::run::run(RunOptions {
                keys,
                units_file: units,
                format,
            }))?;
        }
        Commands::Status { format } => {
            problembank::cli::commands::status::run(&format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                problembank::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                problembank::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    problembank::cli::commands::config::init_global(force)?;
                } else {
                    problembank::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
