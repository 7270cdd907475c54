use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::{
    constants::{DEFAULT_CHAIN_FILE, DEFAULT_DIFFICULTY},
    validate_chain, Block, ChainStore, LoadOutcome, ValidationReport,
};
use ledger_storage::{JsonFileStore, SledStore};
use serde_json::{json, Value};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Validator and client for the transaction ledger")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Json,
    Sled,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check hashes and links of a stored chain and the mining status of its tip
    Validate {
        /// Chain file (json backend)
        #[arg(long, default_value = DEFAULT_CHAIN_FILE)]
        file: PathBuf,
        /// Database directory (sled backend)
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Backend::Json)]
        backend: Backend,
        /// Leading zero hex digits the tip must have to count as mined
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Submit a purchase to a running node
    Submit {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Purchase total
        #[arg(long, required_unless_present = "data")]
        total: Option<u64>,
        /// Purchased item, repeatable
        #[arg(long = "item")]
        items: Vec<String>,
        /// Raw JSON payload instead of --total/--item
        #[arg(long, conflicts_with_all = ["total", "items"])]
        data: Option<String>,
    },
    /// Show the node's transaction history
    History {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Show the node's chain tip
    Head {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
}

/// 0: valid and mined, 1: broken or unreadable, 2: valid but tip not mined.
fn exit_code(report: &ValidationReport) -> u8 {
    match report {
        ValidationReport::Valid { mined: true, .. } => 0,
        ValidationReport::Valid { mined: false, .. } => 2,
        _ => 1,
    }
}

fn purchase_payload(total: Option<u64>, items: Vec<String>, data: Option<String>) -> Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(&raw).context("--data is not valid JSON"),
        None => Ok(json!({ "total": total.unwrap_or_default(), "items": items })),
    }
}

/// Read the chain without repairing or moving anything.
fn read_chain(store: &dyn ChainStore) -> Result<Vec<Block>> {
    match store.load()? {
        LoadOutcome::Loaded(blocks) => Ok(blocks),
        LoadOutcome::NotFound => bail!("no stored chain found"),
        LoadOutcome::Corrupt { reason, .. } => bail!("stored chain is unreadable: {reason}"),
    }
}

fn run_validate(store: &dyn ChainStore, difficulty: u32, as_json: bool) -> Result<u8> {
    let blocks = match read_chain(store) {
        Ok(blocks) => blocks,
        Err(e) => {
            eprintln!("{e}");
            return Ok(1);
        }
    };
    debug!("validating {} blocks at difficulty {difficulty}", blocks.len());
    let report = validate_chain(&blocks, difficulty);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(exit_code(&report))
}

/// sled creates missing databases on open, so an absent directory is
/// reported before anything is opened.
fn run_validate_sled(data_dir: &Path, difficulty: u32, as_json: bool) -> Result<u8> {
    if !data_dir.exists() {
        eprintln!("no stored chain found");
        return Ok(1);
    }
    run_validate(&SledStore::open(data_dir)?, difficulty, as_json)
}

async fn get_json(url: String) -> Result<()> {
    let res = reqwest::get(&url).await?;
    let status = res.status();
    let body: Value = res.json().await?;
    println!("status: {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate {
            file,
            data_dir,
            backend,
            difficulty,
            json,
        } => {
            let code = match backend {
                Backend::Json => run_validate(&JsonFileStore::read_only(file), difficulty, json)?,
                Backend::Sled => run_validate_sled(&data_dir, difficulty, json)?,
            };
            Ok(ExitCode::from(code))
        }
        Command::Submit {
            node,
            total,
            items,
            data,
        } => {
            let payload = purchase_payload(total, items, data)?;
            let client = reqwest::Client::new();
            let res = client.post(format!("{node}/tx")).json(&payload).send().await?;
            let status = res.status();
            let body = res.text().await?;
            println!("status: {}", status);
            println!("{body}");
            Ok(if status.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::History { node } => get_json(format!("{node}/history"))
            .await
            .map(|_| ExitCode::SUCCESS),
        Command::Head { node } => get_json(format!("{node}/chain/head"))
            .await
            .map(|_| ExitCode::SUCCESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Ledger, LedgerConfig};
    use std::sync::Arc;

    #[test]
    fn exit_codes_distinguish_outcomes() {
        assert_eq!(exit_code(&ValidationReport::InvalidHash { index: 1 }), 1);
        assert_eq!(exit_code(&ValidationReport::InvalidLink { index: 1 }), 1);
        assert_eq!(exit_code(&ValidationReport::Empty), 1);
        let valid = |mined| ValidationReport::Valid {
            tip_index: 1,
            tip_hash: "00".into(),
            mined,
        };
        assert_eq!(exit_code(&valid(true)), 0);
        assert_eq!(exit_code(&valid(false)), 2);
    }

    #[test]
    fn payload_from_flags_or_raw_json() {
        let from_flags = purchase_payload(Some(100000), vec!["Laptop".into()], None).unwrap();
        assert_eq!(from_flags, json!({ "total": 100000, "items": ["Laptop"] }));
        let raw = purchase_payload(None, vec![], Some(r#"{"total": 5}"#.into())).unwrap();
        assert_eq!(raw, json!({ "total": 5 }));
        assert!(purchase_payload(None, vec![], Some("{".into())).is_err());
    }

    #[test]
    fn validate_reads_without_moving_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        std::fs::write(&path, "garbage").unwrap();
        let code = run_validate(&JsonFileStore::read_only(&path), 4, false).unwrap();
        assert_eq!(code, 1);
        assert!(path.exists());
    }

    #[test]
    fn validate_sled_missing_directory_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        assert_eq!(run_validate_sled(&data_dir, 4, false).unwrap(), 1);
        assert!(!data_dir.exists());
    }

    #[test]
    fn validate_sled_mined_chain() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        {
            let store = Arc::new(SledStore::open(&data_dir).unwrap());
            let mut ledger = Ledger::load_or_init(
                store,
                LedgerConfig {
                    difficulty: 1,
                    ..LedgerConfig::default()
                },
            )
            .unwrap();
            ledger
                .append_transaction(json!({ "total": 599.99, "items": ["Smartphone"] }))
                .unwrap();
        }
        assert_eq!(run_validate_sled(&data_dir, 1, false).unwrap(), 0);
        assert_eq!(run_validate_sled(&data_dir, 64, false).unwrap(), 2);
    }

    #[test]
    fn validate_tampered_file_reports_invalid_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let store = Arc::new(JsonFileStore::new(&path));
        let mut ledger = Ledger::load_or_init(
            store,
            LedgerConfig {
                difficulty: 1,
                ..LedgerConfig::default()
            },
        )
        .unwrap();
        ledger
            .append_transaction(json!({ "total": 100000, "items": ["Laptop"] }))
            .unwrap();

        let mut blocks = ledger.blocks().to_vec();
        blocks[1].data = json!({ "total": 1, "items": ["Laptop"] });
        JsonFileStore::new(&path).save(&blocks).unwrap();

        let blocks = read_chain(&JsonFileStore::read_only(&path)).unwrap();
        assert_eq!(
            validate_chain(&blocks, 1),
            ValidationReport::InvalidHash { index: 1 }
        );
        assert_eq!(
            run_validate(&JsonFileStore::read_only(&path), 1, false).unwrap(),
            1
        );
    }
}
