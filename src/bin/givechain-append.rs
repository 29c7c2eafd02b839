#![forbid(unsafe_code)]
//! Seal one delivery proof into the ledger from the command line.

use clap::Parser;
use colored::*;
use givechain::blockchain::DeliveryProof;
use givechain::config::load_config;
use givechain::ledger::Ledger;
use givechain::persistence::Database;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "givechain-append", about = "Append a delivery proof block")]
struct Args {
    ngo_id: String,
    delivery_id: String,
    photo_url: String,

    /// Temperature recorded at delivery
    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    notes: Option<String>,

    /// Ledger database (defaults to database.path from config.toml)
    #[arg(long)]
    db: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = load_config()?;

    let db_path = args.db.unwrap_or(config.database.path);
    let ledger = Ledger::new(Box::new(Database::open(&db_path)?), config.ledger)?;
    ledger.initialize()?;

    let mut proof = DeliveryProof::new(&args.ngo_id, &args.delivery_id, &args.photo_url);
    proof.temperature = args.temperature;
    proof.notes = args.notes;

    let start = Instant::now();
    let block = ledger.append_proof(&proof)?;

    println!(
        "{} block #{} sealed in {:.3}s (nonce {})",
        "⛏".yellow(),
        block.index,
        start.elapsed().as_secs_f64(),
        block.nonce
    );
    println!("{}", serde_json::to_string_pretty(&block)?);
    Ok(())
}
