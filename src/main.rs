//! sharevote - Secret-shared voting over a storage cluster
//!
//! Usage:
//!   sharevote init --slots <n>                 - Create the voting schema on every node
//!   sharevote vote --voter-id <id> --vote 1,0,0 - Cast a vote
//!   sharevote results                          - Show votes per slot
//!   sharevote count                            - Show the number of votes cast
//!   sharevote status                           - Show the configured cluster

use clap::{Parser, Subcommand};
use sharevote::{
    config::ClusterConfig,
    voting::{Ballot, VoteReceipt},
    Result, VotingClient,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "sharevote")]
#[command(author = "sharevote Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Secret-shared voting over a storage cluster")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "~/.config/sharevote/config.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the voting schema on every node and record tokens in the config
    Init {
        /// Number of vote slots
        #[arg(long, default_value_t = 3)]
        slots: usize,
    },

    /// Cast a vote
    Vote {
        /// Voter identity
        #[arg(long)]
        voter_id: String,

        /// One-hot vote, e.g. 1,0,0
        #[arg(long)]
        vote: Ballot,
    },

    /// Show votes per slot
    Results,

    /// Show the number of votes cast
    Count,

    /// Show the configured cluster
    Status,
}

fn main() {
    let cli = Cli::parse();

    // Expand ~ in config path
    let config_path = expand_tilde(&cli.config);

    // Setup logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        ClusterConfig::load(&config_path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }

    // Run the command
    if let Err(e) = run_command(cli.command, &config_path) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Init { slots } => cmd_init(config_path, slots),
        Commands::Vote { voter_id, vote } => cmd_vote(config_path, &voter_id, &vote),
        Commands::Results => cmd_results(config_path),
        Commands::Count => cmd_count(config_path),
        Commands::Status => cmd_status(config_path),
    }
}

fn cmd_init(config_path: &Path, slots: usize) -> Result<()> {
    let mut config = ClusterConfig::load(config_path)?;

    info!(
        "Initializing schema with {} slots on {} nodes...",
        slots,
        config.nodes.len()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let started = std::time::Instant::now();
    let (_, summary) = runtime.block_on(VotingClient::initialize(&config, slots))?;

    config.record_provisioning(&summary)?;
    config.save(config_path)?;

    println!(
        "Schema {} initialized in {:.2}s",
        summary.schema_id,
        started.elapsed().as_secs_f64()
    );
    println!("Configuration updated: {}", config_path.display());
    Ok(())
}

fn cmd_vote(config_path: &Path, voter_id: &str, vote: &Ballot) -> Result<()> {
    let config = ClusterConfig::load(config_path)?;
    let client = VotingClient::connect(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    report_vote(runtime.block_on(client.submit_vote(voter_id, vote.entries())))
}

/// Print a stored vote; a rejected one, duplicates included, stays an error
fn report_vote(outcome: Result<VoteReceipt>) -> Result<()> {
    let receipt = outcome?;
    println!(
        "Vote {} from {} stored on {} nodes",
        receipt.vote_id,
        receipt.voter_id,
        receipt.nodes.len()
    );
    Ok(())
}

fn cmd_results(config_path: &Path) -> Result<()> {
    let config = ClusterConfig::load(config_path)?;
    let client = VotingClient::connect(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(client.get_report())?;

    println!("Results");
    println!("=======");
    for (slot, count) in report.counts.iter().enumerate() {
        println!("  Slot {}: {}", slot, count);
    }
    println!();
    println!("Votes counted: {}", report.counted);
    if report.incomplete > 0 {
        println!("Votes skipped (incomplete shares): {}", report.incomplete);
    }
    Ok(())
}

fn cmd_count(config_path: &Path) -> Result<()> {
    let config = ClusterConfig::load(config_path)?;
    let client = VotingClient::connect(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let count = runtime.block_on(client.get_vote_count())?;

    println!("Votes cast: {}", count);
    Ok(())
}

fn cmd_status(config_path: &Path) -> Result<()> {
    let config = ClusterConfig::load(config_path)?;

    println!("sharevote Status");
    println!("================");
    println!();
    println!("Configuration: {}", config_path.display());
    println!("Nodes: {}", config.nodes.len());
    for (index, node) in config.nodes.iter().enumerate() {
        println!(
            "  [{}] {} ({}) token: {}",
            index,
            node.url,
            node.node_id,
            if node.bearer_token.is_some() { "yes" } else { "no" }
        );
    }

    let schema = config.nodes.first().and_then(|n| n.schema_id);
    match (config.is_provisioned(), schema, config.slot_count) {
        (true, Some(schema_id), Some(slots)) => {
            println!("Schema: {} ({} slots)", schema_id, slots);
        }
        _ => println!("Schema: not initialized (run 'sharevote init')"),
    }
    println!(
        "Secret key: {}",
        if config.secret_key.is_some() { "configured" } else { "not configured" }
    );
    println!("Request timeout: {}s", config.request_timeout_secs);

    Ok(())
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
