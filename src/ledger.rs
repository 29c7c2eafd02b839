//! The ledger engine: chain construction, serialized appends and integrity
//! verification on top of a [`LedgerStore`].

use crate::blockchain::{verify_blocks, Block, BlockTemplate, DeliveryProof, IntegrityReport};
use crate::config::LedgerConfig;
use crate::error::{ChainError, Result};
use crate::miner::{mine_block, MiningLimits};
use crate::persistence::{InMemoryPersistence, LedgerStore};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Ledger {
    store: Box<dyn LedgerStore>,
    config: LedgerConfig,
    /// Held across the whole read-tip, mine, append sequence.
    append_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Box<dyn LedgerStore>, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Ledger {
            store,
            config,
            append_lock: Mutex::new(()),
        })
    }

    /// Ledger backed by a fresh in-memory store, already initialized.
    pub fn in_memory(config: LedgerConfig) -> Result<Self> {
        let ledger = Self::new(Box::new(InMemoryPersistence::new()), config)?;
        ledger.initialize()?;
        Ok(ledger)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Ensures the store exists and seeds the genesis block if it is empty.
    /// Calling this on a non-empty store changes nothing.
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.append_lock.lock();
        self.store.ensure_schema()?;

        if let Some(tip) = self.store.load_latest()? {
            debug!(tip = tip.index, "ledger.initialize: store already seeded");
            return Ok(());
        }

        let genesis = mine_block(
            BlockTemplate::genesis(),
            self.config.difficulty,
            &self.config.mining_limits(),
        )
        .map_err(|e| {
            warn!(error = %e, "ledger.initialize: genesis mining gave up");
            e
        })?;
        match self.store.append(&genesis) {
            Ok(()) => {
                info!(hash = %genesis.hash, nonce = genesis.nonce, "ledger.genesis");
                Ok(())
            }
            // Another process seeded the same store first.
            Err(ChainError::StoreConflict { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Validates a delivery proof and seals it into a new block.
    pub fn append_proof(&self, proof: &DeliveryProof) -> Result<Block> {
        let payload = proof.to_payload()?;
        self.append_value(payload)
    }

    /// Mines and persists one new block on top of the current tip.
    ///
    /// The payload is only hashed and stored, but it must serialize to a JSON
    /// object so its text form is self-delimiting inside the digest input.
    pub fn append_block<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Block> {
        let data = serde_json::to_value(payload)
            .map_err(|e| ChainError::Serialization(format!("Failed to serialize payload: {}", e)))?;
        if !data.is_object() {
            return Err(ChainError::Validation(
                "payload must be a JSON object".to_string(),
            ));
        }
        self.append_value(data)
    }

    /// Chain plus the verdict computed over that same snapshot.
    pub fn get_chain_with_report(&self) -> Result<(Vec<Block>, IntegrityReport)> {
        let chain = self.store.load_all()?;
        let report = verify_blocks(&chain, self.config.difficulty);
        Ok((chain, report))
    }

    fn append_value(&self, data: Value) -> Result<Block> {
        let _guard = self.append_lock.lock();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let tip = self.store.load_latest()?.ok_or(ChainError::NotInitialized)?;
            let template = BlockTemplate::new(tip.index + 1, tip.hash.clone(), data.clone());

            let limits = MiningLimits {
                max_attempts: Some(self.config.max_mining_attempts),
                timeout: Some(self.config.mining_timeout.saturating_sub(started.elapsed())),
            };
            let block = mine_block(template, self.config.difficulty, &limits).map_err(|e| {
                warn!(index = tip.index + 1, error = %e, "ledger.append: mining gave up");
                e
            })?;

            match self.store.append(&block) {
                Ok(()) => {
                    info!(
                        index = block.index,
                        nonce = block.nonce,
                        hash = %block.hash,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "ledger.append"
                    );
                    return Ok(block);
                }
                Err(ChainError::StoreConflict { index }) if attempt < self.config.max_append_retries => {
                    warn!(index, attempt, "ledger.append: tip moved underneath us, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// All blocks, oldest first. Each call re-reads the store.
    pub fn get_chain(&self) -> Result<Vec<Block>> {
        self.store.load_all()
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        self.store.load(index)
    }

    pub fn tip(&self) -> Result<Option<Block>> {
        self.store.load_latest()
    }

    /// Re-checks linkage, hashes and proof of work for every stored block.
    /// Never mines and never writes.
    pub fn verify_chain_integrity(&self) -> Result<IntegrityReport> {
        let blocks = self.store.load_all()?;
        let report = verify_blocks(&blocks, self.config.difficulty);
        if !report.valid {
            warn!(
                first_invalid_index = ?report.first_invalid_index,
                failure = ?report.failure,
                "ledger.verify: integrity violation"
            );
        }
        Ok(report)
    }
}
