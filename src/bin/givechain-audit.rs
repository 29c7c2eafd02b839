#![forbid(unsafe_code)]
//! Offline integrity audit of a GiveChain ledger database.

use clap::Parser;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};
use givechain::blockchain::Block;
use givechain::config::load_config;
use givechain::ledger::Ledger;
use givechain::persistence::Database;

#[derive(Parser)]
#[command(name = "givechain-audit", about = "Verify every block of a ledger database")]
struct Args {
    /// Ledger database (defaults to database.path from config.toml)
    #[arg(long)]
    db: Option<String>,

    /// Override the configured difficulty
    #[arg(long)]
    difficulty: Option<u32>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn short(hash: &str) -> String {
    if hash.len() > 16 {
        format!("{}…", &hash[..16])
    } else {
        hash.to_string()
    }
}

fn block_row(block: &Block) -> Vec<String> {
    let label = block
        .data
        .get("deliveryId")
        .and_then(|v| v.as_str())
        .unwrap_or(if block.is_genesis() { "genesis" } else { "-" })
        .to_string();
    let when = chrono::DateTime::from_timestamp_millis(block.timestamp)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| block.timestamp.to_string());

    vec![
        block.index.to_string(),
        when,
        label,
        block.nonce.to_string(),
        short(&block.previous_hash),
        short(&block.hash),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config()?;

    let db_path = args.db.unwrap_or(config.database.path);
    let mut ledger_config = config.ledger;
    if let Some(difficulty) = args.difficulty {
        ledger_config.difficulty = difficulty;
    }

    let ledger = Ledger::new(Box::new(Database::open(&db_path)?), ledger_config)?;
    let chain = ledger.get_chain()?;
    let report = ledger.verify_chain_integrity()?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "chain": chain,
                "report": report,
            }))?
        );
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Index", "Timestamp", "Delivery", "Nonce", "Previous", "Hash"]);
        for block in &chain {
            table.add_row(block_row(block));
        }
        println!("{table}");

        if report.valid {
            println!("{} {} block(s) verified", "✔".green().bold(), report.blocks_checked);
        } else {
            println!(
                "{} integrity violation at block {} ({:?})",
                "✘".red().bold(),
                report
                    .first_invalid_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                report.failure
            );
        }
    }

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}
