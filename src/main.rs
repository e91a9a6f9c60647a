// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethereum_types::{Address, U256};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use minime_proofs::{
    BlockSelector, CheckpointEngine, ClientConfig, EthRpcClient, StorageProofBundle,
};

#[derive(Parser, Debug)]
#[command(about = "Prove historical MiniMe token balances with Ethereum storage proofs")]
struct Cli {
    /// JSON-RPC endpoint of an archive node
    #[arg(long, env = "ETH_RPC_URL", default_value = "http://localhost:8545")]
    rpc: Url,

    /// Bearer token sent with every request
    #[arg(long, env = "ETH_RPC_TOKEN")]
    bearer_token: Option<String>,

    /// Token contract address (0x…)
    #[arg(long, env = "MINIME_TOKEN")]
    token: Address,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 250)]
    timeout: u64,

    /// Number of mapping slots tried by `discover`
    #[arg(long, default_value_t = 20)]
    discovery_limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print name, symbol, decimals and total supply
    Metadata,
    /// Find the mapping slot of the holder's checkpoints
    Discover {
        #[arg(long)]
        holder: Address,
    },
    /// Build a storage proof of the holder's balance at a block
    Prove {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        slot: u64,
        /// Target block; defaults to the latest block
        #[arg(long)]
        block: Option<u64>,
        /// Write the proof here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify a proof produced by `prove`
    Verify {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        slot: u64,
        /// Raw (unscaled) balance being claimed, decimal
        #[arg(long)]
        balance: String,
        #[arg(long)]
        block: u64,
        #[arg(long)]
        proof: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.rpc.clone())
        .with_bearer_token(cli.bearer_token.clone())
        .with_request_timeout(Duration::from_secs(cli.timeout))
        .with_discovery_limit(cli.discovery_limit);

    let client = Arc::new(EthRpcClient::from_config(&config));
    let engine = CheckpointEngine::from_config(client.clone(), cli.token, &config);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Metadata => {
            let data = engine.token().fetch_metadata(&cancel).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Command::Discover { holder } => {
            let found = engine.discover_slot(holder, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        Command::Prove {
            holder,
            slot,
            block,
            out,
        } => {
            let block = match block {
                Some(b) => b,
                None => client.block_number().await?,
            };
            let bundle = engine.build_proof(holder, slot, block, &cancel).await?;
            let json = serde_json::to_string_pretty(&bundle)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("write proof to {}", path.display()))?;
                    tracing::info!(
                        "proof for {holder:?} at block {} written to {}",
                        BlockSelector::Number(block),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
        Command::Verify {
            holder,
            slot,
            balance,
            block,
            proof,
        } => {
            let raw = std::fs::read_to_string(&proof)
                .with_context(|| format!("read proof from {}", proof.display()))?;
            let bundle: StorageProofBundle =
                serde_json::from_str(&raw).context("decode proof bundle")?;
            let balance = U256::from_dec_str(&balance).context("parse balance")?;
            engine.verify_bundle(holder, &bundle, slot, balance, block)?;
            println!("Verification Result: ok");
        }
    }

    Ok(())
}
