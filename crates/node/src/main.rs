//! SmartLedger node - Main entry point

use clap::{Parser, Subcommand};
use smartledger_core::{Address, AssetCode, ContractKey, Timestamp, TxId};
use smartledger_node::context::{load_key, KEY_ENV};
use smartledger_node::{commands, NodeConfig, NodeContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smartledgerd")]
#[command(about = "SmartLedger - contract settlement node", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Configuration file (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File holding the contract key seed, used when the environment has none
    #[arg(long)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new contract key
    Keygen {
        /// Output file path
        #[arg(long, default_value = "contract.key")]
        output: PathBuf,
    },

    /// Print the effective configuration
    Config,

    /// Process transactions from a JSON file
    Process {
        /// Transaction file (one transaction or an array)
        file: PathBuf,
        /// Processing time in unix seconds; defaults to now
        #[arg(long)]
        at: Option<u64>,
    },

    /// Run scheduled jobs (transfer timeouts, vote cutoffs) that are due
    Jobs {
        /// Time in unix seconds; defaults to now
        #[arg(long)]
        at: Option<u64>,
    },

    /// Show the formed contract
    Contract,

    /// Show a holding
    Holding {
        /// Asset code (hex)
        asset: AssetCode,
        /// Holder address (hex)
        address: Address,
    },

    /// Show a vote
    Vote {
        /// Vote transaction id (hex)
        txid: TxId,
    },

    /// List transfers in flight
    Pending,
}

fn at_or_now(at: Option<u64>) -> Timestamp {
    at.map(Timestamp::from_secs).unwrap_or_else(Timestamp::now)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    match &cli.command {
        Commands::Keygen { output } => {
            let key = ContractKey::generate();
            let seed = key.seed_hex();

            std::fs::write(output, &seed)?;
            println!("✅ Generated contract key");
            println!("   Private key saved to: {}", output.display());
            println!("   Public key: {}", key.public_key_hex());
            println!("   Address: {}", key.address());
            println!();
            println!("To use: export {}={}", KEY_ENV, seed);
            return Ok(());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => {}
    }

    let key = load_key(cli.key_file.as_deref())?;
    let mut ctx = NodeContext::new(&cli.data, key, config).await?;

    match cli.command {
        Commands::Process { file, at } => commands::process(&mut ctx, &file, at_or_now(at)).await?,
        Commands::Jobs { at } => commands::run_jobs(&mut ctx, at_or_now(at)).await?,
        Commands::Contract => commands::contract(&ctx).await?,
        Commands::Holding { asset, address } => {
            commands::holding(&ctx, asset, address, Timestamp::now()).await?
        }
        Commands::Vote { txid } => commands::vote(&ctx, txid).await?,
        Commands::Pending => commands::pending(&ctx).await?,
        Commands::Keygen { .. } | Commands::Config => {}
    }

    ctx.close().await?;
    Ok(())
}
