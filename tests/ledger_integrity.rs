//! End-to-end ledger properties against an on-disk SQLite store.
//!
//! Tampering is simulated the way an attacker with database access would do
//! it: through a second, independent connection.

use givechain::blockchain::{meets_difficulty, DeliveryProof, IntegrityFailure};
use givechain::config::LedgerConfig;
use givechain::ledger::Ledger;
use givechain::persistence::Database;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const DIFFICULTY: u32 = 2;

fn open_ledger(dir: &TempDir) -> Result<(Ledger, PathBuf), Box<dyn std::error::Error>> {
    let path = dir.path().join("ledger.db");
    let db = Database::open(path.to_str().ok_or("non-utf8 temp path")?)?;
    let ledger = Ledger::new(Box::new(db), LedgerConfig::with_difficulty(DIFFICULTY))?;
    ledger.initialize()?;
    Ok((ledger, path))
}

fn ledger_with_blocks(
    dir: &TempDir,
    count: usize,
) -> Result<(Ledger, PathBuf), Box<dyn std::error::Error>> {
    let (ledger, path) = open_ledger(dir)?;
    for i in 0..count {
        let proof = DeliveryProof::new(&format!("n{i}"), &format!("d{i}"), &format!("p{i}"));
        ledger.append_proof(&proof)?;
    }
    Ok((ledger, path))
}

fn tamper(path: &PathBuf, sql: &str, index: u64) -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(path)?;
    let changed = conn.execute(sql, params![index as i64])?;
    assert_eq!(changed, 1);
    Ok(())
}

#[test]
fn test_genesis_is_identical_across_ledgers() -> Result<(), Box<dyn std::error::Error>> {
    let (dir_a, dir_b) = (TempDir::new()?, TempDir::new()?);
    let (a, _) = open_ledger(&dir_a)?;
    let (b, _) = open_ledger(&dir_b)?;

    let genesis_a = a.get_block(0)?.ok_or("missing genesis")?;
    let genesis_b = b.get_block(0)?.ok_or("missing genesis")?;
    assert_eq!(genesis_a.hash, genesis_b.hash);
    assert_eq!(genesis_a, genesis_b);
    Ok(())
}

#[test]
fn test_reopening_does_not_reseed() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, path) = ledger_with_blocks(&dir, 2)?;
    let before = ledger.get_chain()?;
    drop(ledger);

    let db = Database::open(path.to_str().ok_or("non-utf8 temp path")?)?;
    let reopened = Ledger::new(Box::new(db), LedgerConfig::with_difficulty(DIFFICULTY))?;
    reopened.initialize()?;
    assert_eq!(reopened.get_chain()?, before);
    Ok(())
}

#[test]
fn test_example_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, path) = open_ledger(&dir)?;
    let genesis = ledger.tip()?.ok_or("missing genesis")?;

    let block1 = ledger.append_proof(&DeliveryProof::new("n1", "d1", "p1"))?;
    assert_eq!(block1.index, 1);
    assert_eq!(block1.previous_hash, genesis.hash);
    assert!(meets_difficulty(&block1.hash, DIFFICULTY));

    let block2 = ledger.append_proof(&DeliveryProof::new("n2", "d2", "p2"))?;
    assert_eq!(block2.index, 2);
    assert_eq!(block2.previous_hash, block1.hash);

    let report = ledger.verify_chain_integrity()?;
    assert!(report.valid);
    assert_eq!(report.first_invalid_index, None);

    tamper(
        &path,
        r#"UPDATE blocks SET data = '{"deliveryId":"d1","ngoId":"evil","photoUrl":"p1"}' WHERE block_index = ?1"#,
        1,
    )?;

    let report = ledger.verify_chain_integrity()?;
    assert!(!report.valid);
    assert_eq!(report.first_invalid_index, Some(1));
    assert_eq!(report.failure, Some(IntegrityFailure::HashMismatch));
    Ok(())
}

#[test]
fn test_every_block_meets_difficulty() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, _) = ledger_with_blocks(&dir, 5)?;
    let chain = ledger.get_chain()?;
    assert_eq!(chain.len(), 6);
    assert!(chain.iter().all(|b| b.meets_difficulty(DIFFICULTY)));
    assert!(ledger.verify_chain_integrity()?.valid);
    Ok(())
}

#[test]
fn test_single_field_tamper_is_localized() -> Result<(), Box<dyn std::error::Error>> {
    let edits = [
        "UPDATE blocks SET data = '{\"forged\":true}' WHERE block_index = ?1",
        "UPDATE blocks SET nonce = nonce + 1 WHERE block_index = ?1",
        "UPDATE blocks SET previous_hash = 'deadbeef' WHERE block_index = ?1",
        "UPDATE blocks SET timestamp = timestamp + 1 WHERE block_index = ?1",
    ];

    for sql in edits {
        for k in [0u64, 2, 4] {
            let dir = TempDir::new()?;
            let (ledger, path) = ledger_with_blocks(&dir, 4)?;
            tamper(&path, sql, k)?;

            let report = ledger.verify_chain_integrity()?;
            assert!(!report.valid, "{sql} at {k}");
            assert_eq!(report.first_invalid_index, Some(k), "{sql} at {k}");
        }
    }
    Ok(())
}

#[test]
fn test_deleted_block_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, path) = ledger_with_blocks(&dir, 3)?;
    tamper(&path, "DELETE FROM blocks WHERE block_index = ?1", 2)?;

    let report = ledger.verify_chain_integrity()?;
    assert_eq!(report.first_invalid_index, Some(2));
    assert_eq!(report.failure, Some(IntegrityFailure::IndexGap));
    Ok(())
}

#[test]
fn test_concurrent_appends_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, _) = open_ledger(&dir)?;
    let ledger = Arc::new(ledger);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger.append_proof(&DeliveryProof::new("ngo", &format!("delivery-{i}"), "photo"))
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().map_err(|_| "append thread panicked")?;
        assert!(result.is_ok(), "append failed: {:?}", result.err());
    }

    let chain = ledger.get_chain()?;
    let indices: Vec<u64> = chain.iter().map(|b| b.index).collect();
    assert_eq!(indices, (0..=6).collect::<Vec<_>>());
    assert!(ledger.verify_chain_integrity()?.valid);
    Ok(())
}

#[test]
fn test_reads_are_stable() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let (ledger, _) = ledger_with_blocks(&dir, 3)?;
    let first = ledger.get_chain()?;
    let second = ledger.get_chain()?;
    assert_eq!(first, second);

    ledger.verify_chain_integrity()?;
    assert_eq!(ledger.get_chain()?, first);
    Ok(())
}
