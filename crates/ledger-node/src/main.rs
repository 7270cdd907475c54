mod constants;
mod routes;

use clap::{Parser, ValueEnum};
use constants::{DEFAULT_DATA_DIR, DEFAULT_LISTEN};
use ledger_core::{
    constants::{DEFAULT_CHAIN_FILE, DEFAULT_DIFFICULTY},
    ChainOrigin, ChainStore, Ledger, LedgerConfig,
};
use ledger_storage::{JsonFileStore, SledStore};
use routes::{router, AppState};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{error, info, warn, Level};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Single JSON document holding the whole chain
    Json,
    /// Embedded sled database
    Sled,
}

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Storage backend for the chain
    #[arg(long, value_enum, default_value_t = Backend::Json)]
    backend: Backend,

    /// Chain file for the json backend
    #[arg(long, default_value = DEFAULT_CHAIN_FILE)]
    chain_file: PathBuf,

    /// Data directory for the sled backend
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Leading zero hex digits required of each new block
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Give up on a block after this many seconds of mining
    #[arg(long)]
    mining_timeout_secs: Option<u64>,

    /// Mine on all cores
    #[arg(long)]
    parallel_mining: bool,
}

impl Args {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
            mining_timeout: self.mining_timeout_secs.map(Duration::from_secs),
            parallel: self.parallel_mining,
        }
    }

    fn open_store(&self) -> anyhow::Result<Arc<dyn ChainStore>> {
        Ok(match self.backend {
            Backend::Json => Arc::new(JsonFileStore::new(&self.chain_file)),
            Backend::Sled => Arc::new(SledStore::open(&self.data_dir)?),
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let ledger = Ledger::load_or_init(args.open_store()?, args.ledger_config())?;
    if let ChainOrigin::Recovered {
        reason,
        quarantined,
    } = ledger.origin()
    {
        warn!("chain was reset ({reason}); previous content kept at {quarantined:?}");
    }
    info!(
        "ledger ready: {} blocks, difficulty {}",
        ledger.len(),
        args.difficulty
    );

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
    };
    let app = router(state.clone());

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // final save; covers a store that fell behind after a failed append
    match state.ledger.lock() {
        Ok(ledger) => ledger.persist()?,
        Err(_) => error!("ledger lock poisoned, skipping final save"),
    }
    Ok(())
}
