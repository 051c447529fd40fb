use anyhow::Result;
use clap::{Parser, Subcommand};
use feint::config::Config;
use feint::persona::generator;
use feint::storage::Storage;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "feint",
    about = "Adaptive API deception service that observes and classifies autonomous agents.",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the deception server (the default).
    Serve {
        /// Regenerate response templates even if a cache exists.
        #[arg(long)]
        force_regenerate: bool,
    },
    /// Generate a deployment identity and optionally persist it.
    Persona {
        /// Seed for reproducible generation; random if omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// Write the identity to this path for stable redeployments.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Inspect recorded traffic.
    Query {
        #[command(subcommand)]
        what: QueryCommand,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Most recent captured requests.
    Events {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Most recent sessions with their classifications.
    Sessions {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let level = match config.logging.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    match cli.command.unwrap_or(Command::Serve {
        force_regenerate: false,
    }) {
        Command::Serve { force_regenerate } => {
            feint::server::run_server(config, force_regenerate).await
        }
        Command::Persona { seed, save } => {
            let persona = generator::generate(seed);
            println!("{}", toml::to_string_pretty(&persona)?);
            if let Some(path) = save {
                generator::save_persona(&persona, &path)?;
                println!("# saved to {}", path.display());
            }
            Ok(())
        }
        Command::Query { what } => run_query(&config, what).await,
    }
}

async fn run_query(config: &Config, what: QueryCommand) -> Result<()> {
    let storage = Storage::open(
        Path::new(&config.storage.database),
        config.storage.log_file.as_deref().map(Path::new),
    )
    .await?;

    match what {
        QueryCommand::Events { limit } => {
            for event in storage.get_recent_events(limit).await? {
                println!(
                    "{} {:>7} {} {} [{}] {}",
                    event.timestamp.to_rfc3339(),
                    event.method,
                    event.path,
                    event.source_ip,
                    event.classification.as_str(),
                    event.fingerprint_scores.composite,
                );
            }
        }
        QueryCommand::Sessions { limit } => {
            for session in storage.get_recent_sessions(limit).await? {
                println!(
                    "{} {} requests={} [{}] composite={:.2}",
                    session.id,
                    session.source_ip,
                    session.request_count,
                    session.classification.as_str(),
                    session.fingerprint_scores.composite,
                );
            }
        }
    }
    Ok(())
}
