//! Espresso CLI
//!
//! Entry point for the `espresso` command-line tool.

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use espresso::signal::install_sigint_handler;
use espresso::{Cancellation, Context, EspressoError, EspressoResult, JdkToolchain, QueryHit, Service};
use espresso_store::HttpFetcher;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "espresso")]
#[command(about = "Build Java projects from declared package registries", version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve dependencies, compile and package the project
    Build {
        /// Worker pool size (default: build.jobs, else one per CPU)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },

    /// Remove build and dist directories
    Clean,

    /// Create a new project in the current directory
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,

        /// Base package of the Main class (default: org.example.<name>)
        #[arg(long)]
        base_package: Option<String>,
    },

    /// Registry management commands
    Registry {
        #[command(subcommand)]
        action: RegistryCommands,
    },

    /// Dependency management commands
    Dependency {
        #[command(subcommand)]
        action: DependencyCommands,
    },

    /// Print the espresso version
    Version,
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Search cached registries by name or description ("*" lists everything)
    Query {
        term: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete and re-download every registry cache
    Invalidate {
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },
}

#[derive(Subcommand)]
enum DependencyCommands {
    /// Resolve every dependency and download missing artifacts
    Sync {
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "espresso=debug" } else { "espresso=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> EspressoResult<()> {
    if let Commands::Version = command {
        println!("espresso {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let service = service()?;
    match command {
        Commands::Build { jobs } => run_build(&service, jobs),
        Commands::Clean => service.clean(),
        Commands::Init { name, base_package } => {
            let config = service.init(name, base_package)?;
            println!("Created '{}' ({})", config.name, config.base_package);
            Ok(())
        }
        Commands::Registry { action } => match action {
            RegistryCommands::Query { term, json } => run_query(&service, &term, json),
            RegistryCommands::Invalidate { jobs } => service.invalidate_registries(jobs),
        },
        Commands::Dependency { action } => match action {
            DependencyCommands::Sync { jobs } => {
                let resolved = service.sync_dependencies(jobs)?;
                for dep in &resolved {
                    println!("{} ({})", dep.requested, dep.registry().name);
                }
                Ok(())
            }
        },
        Commands::Version => Ok(()),
    }
}

fn service() -> EspressoResult<Service> {
    let ctx = Context::from_env()?;
    let fetcher = HttpFetcher::new().map_err(|e| EspressoError::Configuration(e.to_string()))?;

    let cancellation = Cancellation::new();
    if let Err(e) = install_sigint_handler(&cancellation) {
        tracing::warn!("could not install interrupt handler: {}", e);
    }

    Ok(Service::new(ctx, Arc::new(fetcher), cancellation))
}

fn run_build(service: &Service, jobs: Option<usize>) -> EspressoResult<()> {
    let config = service.load_config()?;
    let toolchain = JdkToolchain::from_config(&config.toolchain)?;
    let output = service.build_with_config(&config, &toolchain, jobs)?;

    println!(
        "Built {} ({} sources, {} dependencies)",
        output.archive.display(),
        output.sources,
        output.dependencies.len()
    );
    Ok(())
}

fn run_query(service: &Service, term: &str, json: bool) -> EspressoResult<()> {
    let hits = service.query(term)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    println!("Found {} package(s)", hits.len());
    if !hits.is_empty() {
        print_table(&hits);
    }
    Ok(())
}

fn print_table(hits: &[QueryHit]) {
    let rows: Vec<[&str; 4]> = hits
        .iter()
        .map(|h| [h.registry.as_str(), h.group.as_str(), h.name.as_str(), h.latest_version.as_deref().unwrap_or("-")])
        .collect();
    let header = ["Registry", "Group", "Package", "Latest Version"];

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let render = |cells: &[&str; 4]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", render(&header));
    for row in &rows {
        println!("{}", render(row));
    }
}
