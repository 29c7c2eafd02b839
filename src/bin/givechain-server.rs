#![forbid(unsafe_code)]
//! HTTP server for the GiveChain delivery-proof ledger

use std::net::SocketAddr;
use std::sync::Arc;
use givechain::api::{run_api_server, Node};
use givechain::config::load_config;
use givechain::ledger::Ledger;
use givechain::persistence::Database;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;
    info!(db = %config.database.path, difficulty = config.ledger.difficulty, "Starting GiveChain ledger");

    let db_path = std::path::Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
        }
    }

    let db = Database::open(&config.database.path)?;
    let ledger = Ledger::new(Box::new(db), config.ledger.clone())?;

    // Genesis mining and the startup audit are blocking work.
    let ledger = tokio::task::spawn_blocking(move || -> Result<Ledger, givechain::error::ChainError> {
        ledger.initialize()?;
        let report = ledger.verify_chain_integrity()?;
        if report.valid {
            info!(blocks = report.blocks_checked, "Chain integrity verified");
        } else {
            warn!(
                first_invalid_index = ?report.first_invalid_index,
                "Chain integrity check FAILED at startup; serving anyway so the damage can be inspected"
            );
        }
        Ok(ledger)
    })
    .await??;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let node = Arc::new(Node::new(Arc::new(ledger)));
    run_api_server(node, addr).await
}
