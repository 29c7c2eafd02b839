use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Fixed genesis timestamp (2023-01-01T00:00:00Z) so every ledger shares one root.
pub const GENESIS_TIMESTAMP: i64 = 1672531200000;

/// A SHA-256 hex digest has 64 characters; more leading zeros cannot exist.
pub const MAX_DIFFICULTY: u32 = 64;

/// Sentinel payload sealed into the genesis block.
pub fn genesis_payload() -> Value {
    serde_json::json!({ "genesis": "0".repeat(64) })
}

/// One sealed ledger record.
///
/// Serializes as `{ index, timestamp, data, previousHash, hash, nonce }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: Value,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Recomputes the digest from the stored fields, ignoring the stored `hash`.
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.data,
            self.nonce,
        )
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }
}

/// Everything a block needs except the proof of work.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub index: u64,
    pub timestamp: i64,
    pub previous_hash: String,
    pub data: Value,
}

impl BlockTemplate {
    pub fn new(index: u64, previous_hash: String, data: Value) -> Self {
        BlockTemplate {
            index,
            timestamp: chrono::Utc::now().timestamp_millis(),
            previous_hash,
            data,
        }
    }

    pub fn genesis() -> Self {
        BlockTemplate {
            index: 0,
            timestamp: GENESIS_TIMESTAMP,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            data: genesis_payload(),
        }
    }

    /// Hasher already fed with every field that precedes the nonce.
    ///
    /// Mining clones this state once per attempt instead of re-hashing the
    /// payload each time.
    pub fn prefix_hasher(&self) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        hasher.update(canonical_json(&self.data).as_bytes());
        hasher
    }

    pub fn seal(self, nonce: u64, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            data: self.data,
            previous_hash: self.previous_hash,
            hash,
            nonce,
        }
    }
}

/// Stable text form of a payload: object keys come out in sorted order, no
/// insignificant whitespace.
pub fn canonical_json(data: &Value) -> String {
    data.to_string()
}

/// `SHA-256(index ‖ previous_hash ‖ timestamp ‖ canonical_json(data) ‖ nonce)`
/// with integers in decimal, returned as lowercase hex.
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    data: &Value,
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(canonical_json(data).as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Difficulty predicate: the hex hash starts with `difficulty` zero digits.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let zeros = difficulty as usize;
    hash.len() >= zeros && hash.as_bytes()[..zeros].iter().all(|&b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_deterministic() {
        let data = json!({"ngoId": "n1", "deliveryId": "d1"});
        let a = calculate_hash(1, "abc", 1000, &data, 42);
        let b = calculate_hash(1, "abc", 1000, &data, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, calculate_hash(1, "abc", 1000, &data, 43));
    }

    #[test]
    fn test_key_order_does_not_change_hash() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(calculate_hash(0, "0", 0, &a, 0), calculate_hash(0, "0", 0, &b, 0));
    }

    #[test]
    fn test_prefix_hasher_matches_full_hash() {
        let template = BlockTemplate::new(3, "ff".repeat(32), json!({"x": [1, 2, 3]}));
        let mut hasher = template.prefix_hasher();
        hasher.update(b"17");
        let via_prefix = hex::encode(hasher.finalize());

        let block = template.seal(17, via_prefix.clone());
        assert_eq!(block.calculate_hash(), via_prefix);
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0fab", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn test_block_json_shape() {
        let block = BlockTemplate::genesis().seal(5, "00aa".to_string());
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["previousHash"], "0");
        assert_eq!(json["timestamp"], GENESIS_TIMESTAMP);
        assert_eq!(json["nonce"], 5);
        assert!(json["data"].is_object());
        assert_eq!(json["hash"], "00aa");
    }
}
