//! Delivery-proof attestation carried as block payload.

use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Proof that an NGO delivered a donation, as sealed into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryProof {
    pub ngo_id: String,
    pub delivery_id: String,
    pub photo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeliveryProof {
    pub fn new(ngo_id: &str, delivery_id: &str, photo_url: &str) -> Self {
        DeliveryProof {
            ngo_id: ngo_id.to_string(),
            delivery_id: delivery_id.to_string(),
            photo_url: photo_url.to_string(),
            temperature: None,
            notes: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ngoId", &self.ngo_id),
            ("deliveryId", &self.delivery_id),
            ("photoUrl", &self.photo_url),
        ] {
            if value.trim().is_empty() {
                return Err(ChainError::Validation(format!("{} is required", name)));
            }
        }

        if let Some(t) = self.temperature {
            if !t.is_finite() {
                return Err(ChainError::Validation(
                    "temperature must be a finite number".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Validates and converts into the structured value hashed into a block.
    pub fn to_payload(&self) -> Result<Value> {
        self.validate()?;
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        assert!(DeliveryProof::new("n1", "d1", "p1").validate().is_ok());

        let err = DeliveryProof::new("n1", "", "p1").validate().unwrap_err();
        assert!(matches!(err, ChainError::Validation(msg) if msg.contains("deliveryId")));

        assert!(DeliveryProof::new("  ", "d1", "p1").validate().is_err());
        assert!(DeliveryProof::new("n1", "d1", "").validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_temperature() {
        let proof = DeliveryProof::new("n1", "d1", "p1").with_temperature(f64::NAN);
        assert!(proof.validate().is_err());
    }

    #[test]
    fn test_payload_omits_absent_optionals() {
        let value = DeliveryProof::new("n1", "d1", "p1").to_payload().unwrap();
        assert_eq!(value["ngoId"], "n1");
        assert_eq!(value["photoUrl"], "p1");
        assert!(value.get("temperature").is_none());
        assert!(value.get("notes").is_none());

        let value = DeliveryProof::new("n1", "d1", "p1")
            .with_temperature(4.5)
            .with_notes("cold chain ok")
            .to_payload()
            .unwrap();
        assert_eq!(value["temperature"], 4.5);
        assert_eq!(value["notes"], "cold chain ok");
    }
}
