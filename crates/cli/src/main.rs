mod config;
mod error;
mod http;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use policy::Principal;
use service::CardService;
use storage::{CardDraft, SqliteCardStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;
use http::AppState;

const CONFIG_FILE: &str = "cards.toml";

type Cards = CardService<SqliteCardStore>;

#[derive(Parser)]
#[command(name = "cards")]
#[command(about = "Owner-scoped card record service", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve,
    /// List the cards of one owner
    List {
        /// Principal whose cards to show
        #[arg(short, long)]
        owner: String,
    },
    /// Create cards for an owner
    Seed {
        /// Principal that will own the cards
        #[arg(short, long)]
        owner: String,
        /// Card names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env();

    match cli.command {
        Some(Commands::Serve) | None => cmd_serve(config).await,
        Some(Commands::List { owner }) => cmd_list(config, &owner).await,
        Some(Commands::Seed { owner, names }) => cmd_seed(config, &owner, names).await,
    }
}

async fn cmd_serve(config: Config) -> Result<()> {
    let principal_header = config.principal_header()?;
    let limits = config.paging_limits();
    let bind = config.server.bind.clone();
    let cards = build_service(config)?;

    let app = http::router(AppState::new(cards, limits, principal_header));
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn cmd_list(config: Config, owner: &str) -> Result<()> {
    let principal = Principal::new(owner)?;
    let cards = build_service(config)?.list(&principal).await?;

    if cards.is_empty() {
        println!("No cards found for {principal}.");
        return Ok(());
    }

    println!("{:<12}  NAME", "ID");
    println!("{}", "-".repeat(60));
    for card in cards {
        let id = card.id.map(|id| id.to_string()).unwrap_or_default();
        println!("{id:<12}  {}", card.name);
    }
    Ok(())
}

async fn cmd_seed(config: Config, owner: &str, names: Vec<String>) -> Result<()> {
    let principal = Principal::new(owner)?;
    let cards = build_service(config)?;
    for name in names {
        let id = cards.create(&principal, CardDraft::new(name)).await?;
        println!("created card {id} for {principal}");
    }
    Ok(())
}

fn build_service(config: Config) -> Result<Cards> {
    let store = if config.is_memory_store() {
        SqliteCardStore::in_memory()?
    } else {
        SqliteCardStore::open(&config.storage.path)?
    };
    let store = store.with_busy_timeout(config.busy_timeout())?;
    let timeout = config.request_timeout();
    Ok(CardService::new(store, config.policy).with_timeout(timeout))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
