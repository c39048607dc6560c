//! Payment provider webhook contract and signature verification.

use crate::domain::money::Amount;
use crate::error::{PaymentError, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// The only event that moves money.
pub const CHARGE_SUCCESS: &str = "charge.success";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub event: String,
    pub data: ChargeData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeData {
    /// Provider transaction reference, the idempotency key.
    pub reference: String,
    pub amount_minor_units: i64,
    pub metadata: ChargeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeMetadata {
    pub user_id: Uuid,
    pub loan_id: Uuid,
    pub business_id: Uuid,
}

impl WebhookEvent {
    pub fn parse(raw_body: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw_body).map_err(|e| {
            PaymentError::ValidationError(format!("malformed webhook payload: {e}"))
        })
    }

    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS
    }

    pub fn amount(&self) -> Result<Amount> {
        Amount::from_minor_units(self.data.amount_minor_units)
    }
}

/// Hex HMAC-SHA512 of `raw_body` under `secret`, as the provider sends it.
pub fn sign(secret: &str, raw_body: &[u8]) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::ConfigurationError(e.to_string()))?;
    mac.update(raw_body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the signature header in constant time.
pub fn verify_signature(secret: &str, raw_body: &[u8], signature_hex: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::ConfigurationError(e.to_string()))?;
    mac.update(raw_body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}
