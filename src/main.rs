mod classifier;
mod dedup;

use anyhow::{Context, Result};
use clap::Parser;
use classifier::BalanceShapeClassifier;
use config_manager::SystemConfig;
use dedup::SignatureCache;
use enrichment_client::{BitQueryClient, CoinGeckoRateClient};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tx_interpreter::{Enricher, ErrorPayload, Interpreter, ReconciliationSettings, TransactionRecord};

#[derive(Parser)]
#[command(name = "swap_interpreter")]
#[command(about = "Reconcile Solana balance updates into swap and transfer records", long_about = None)]
struct Args {
    /// Configuration file (optional; defaults and INTERP__* env vars apply)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Treat input as newline-delimited records
    #[arg(short, long)]
    lines: bool,

    /// Read from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries records only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swap_interpreter=debug".into()),
        )
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            emit_error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Ok(false) when at least one record failed
async fn run(args: Args) -> Result<bool> {
    let config = SystemConfig::load_from_path(&args.config).context("Failed to load configuration")?;
    let settings = ReconciliationSettings::from_config(&config.reconciliation)
        .context("Invalid reconciliation settings")?;
    let enricher = build_enricher(&config, settings.clone())?;
    let interpreter = Interpreter::new(
        settings.clone(),
        Box::new(BalanceShapeClassifier::new(settings)),
        enricher,
    );

    let input = read_input(args.input.as_deref())?;

    if args.lines {
        interpret_stream(&interpreter, &input, config.service.dedup_capacity).await
    } else {
        interpret_one(&interpreter, &input).await
    }
}

fn build_enricher(config: &SystemConfig, settings: ReconciliationSettings) -> Result<Enricher> {
    if !config.enrichment.enabled {
        debug!("Enrichment disabled, SOL values only");
        return Ok(Enricher::offline(settings));
    }

    info!("Enrichment enabled via {}", config.enrichment.bitquery_url);
    let token_info = BitQueryClient::new(&config.enrichment).context("Failed to build BitQuery client")?;
    let rates = CoinGeckoRateClient::new(&config.enrichment).context("Failed to build CoinGecko client")?;
    Ok(Enricher::new(settings, Arc::new(token_info), Arc::new(rates)))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

async fn interpret_one(interpreter: &Interpreter, raw: &str) -> Result<bool> {
    match TransactionRecord::from_json(raw) {
        Ok(record) => interpret_record(interpreter, &record).await,
        Err(e) => {
            emit_error(format!("Invalid transaction payload: {}", e));
            Ok(false)
        }
    }
}

async fn interpret_stream(interpreter: &Interpreter, raw: &str, dedup_capacity: usize) -> Result<bool> {
    let mut seen = SignatureCache::new(dedup_capacity);
    let mut all_ok = true;
    let mut processed = 0usize;

    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        let record = match TransactionRecord::from_json(line) {
            Ok(record) => record,
            Err(e) => {
                emit_error(format!("Invalid transaction payload: {}", e));
                all_ok = false;
                continue;
            }
        };

        let signature = record.transaction.signature.as_str();
        if !signature.is_empty() && !seen.insert(signature) {
            debug!("Skipping duplicate transaction {}", signature);
            continue;
        }

        all_ok &= interpret_record(interpreter, &record).await?;
        processed += 1;
    }

    info!(
        "Interpreted {} transactions ({} signatures tracked)",
        processed,
        seen.len()
    );
    Ok(all_ok)
}

async fn interpret_record(interpreter: &Interpreter, record: &TransactionRecord) -> Result<bool> {
    match interpreter.interpret(record).await {
        Ok(interpretation) => {
            println!("{}", serde_json::to_string(&interpretation)?);
            Ok(true)
        }
        Err(e) => {
            error!("Failed to interpret {}: {}", record.transaction.signature, e);
            emit_error(ErrorPayload::from(&e).error);
            Ok(false)
        }
    }
}

fn emit_error(message: String) {
    let payload = ErrorPayload { error: message };
    match serde_json::to_string(&payload) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize error payload: {}", e),
    }
}
