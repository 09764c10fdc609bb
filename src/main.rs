use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsync::cli::commands;

#[derive(Parser)]
#[command(name = "docsync")]
#[command(
    version,
    about = "Keep tiered source documentation in sync with version control"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docsync in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing configuration")]
        force: bool,
    },

    /// Sync documentation with HEAD
    Sync {
        #[arg(long = "file", value_name = "PATH", help = "Only sync these files (repeatable)")]
        files: Vec<String>,
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },

    /// Show pending sync work
    Status {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(short = 'd', long, help = "List pending paths and modules")]
        detailed: bool,
    },

    /// Manage modules
    Module {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Manage files that are never documented
    Exclude {
        #[command(subcommand)]
        action: ExcludeAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ModuleAction {
    /// Create a module from a list of files
    Create {
        slug: String,
        #[arg(long, help = "Display name (defaults to the slug)")]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Add files to a module
    Add {
        slug: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Remove files from a module
    Remove {
        slug: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// List modules
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one module and its narrative overview
    Show {
        slug: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExcludeAction {
    /// Never document these files
    Add {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Document these files again
    Remove {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// List excluded files
    List,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
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

    let rt = Runtime::new()?;

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Sync { files, json } => {
            let report = rt.block_on(commands::sync::run(commands::sync::SyncOptions {
                files,
                json,
                quiet: cli.quiet,
            }))?;
            if !report.is_complete() {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Status { json, detailed } => {
            rt.block_on(commands::status::run(json, detailed))?;
        }
        Commands::Module { action } => match action {
            ModuleAction::Create {
                slug,
                name,
                description,
                files,
            } => {
                rt.block_on(commands::module::create(
                    &slug,
                    name.as_deref(),
                    &description,
                    &files,
                ))?;
            }
            ModuleAction::Add { slug, files } => {
                rt.block_on(commands::module::add(&slug, &files))?;
            }
            ModuleAction::Remove { slug, files } => {
                rt.block_on(commands::module::remove(&slug, &files))?;
            }
            ModuleAction::List { json } => {
                rt.block_on(commands::module::list(json))?;
            }
            ModuleAction::Show { slug, json } => {
                rt.block_on(commands::module::show(&slug, json))?;
            }
        },
        Commands::Exclude { action } => match action {
            ExcludeAction::Add { files } => {
                rt.block_on(commands::exclude::add(&files))?;
            }
            ExcludeAction::Remove { files } => {
                rt.block_on(commands::exclude::remove(&files))?;
            }
            ExcludeAction::List => {
                rt.block_on(commands::exclude::list())?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                commands::config::show(json)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
