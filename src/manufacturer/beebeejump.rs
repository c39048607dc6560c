use super::{CodeIssuer, days_arg, upstream_error};
use crate::domain::device::{Device, Manufacturer};
use crate::domain::loan::Validity;
use crate::domain::party::Business;
use crate::error::{PaymentError, Result};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequest<'a> {
    pub sn: &'a str,
    pub day: u32,
    pub api_key: &'a str,
    pub api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct UnlockResponse {
    data: UnlockData,
}

#[derive(Debug, Deserialize)]
struct UnlockData {
    encrypt: String,
}

/// Decrypts the `data.encrypt` field: base64 of AES-256-CBC/PKCS#7 ciphertext.
pub fn decrypt_code(encrypted: &str, key: &str, iv: &str) -> Result<String> {
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv.as_bytes()).map_err(|_| {
        PaymentError::ConfigurationError(
            "BeeBeeJump key must be 32 bytes and IV 16 bytes".to_string(),
        )
    })?;
    let ciphertext = STANDARD.decode(encrypted.trim()).map_err(|e| upstream(e.to_string()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| upstream("undecryptable code".to_string()))?;
    let code = String::from_utf8(plaintext).map_err(|e| upstream(e.to_string()))?;
    if code.is_empty() {
        return Err(upstream("empty code".to_string()));
    }
    Ok(code)
}

fn upstream(message: String) -> PaymentError {
    PaymentError::Upstream {
        manufacturer: Manufacturer::BeeBeeJump,
        message,
    }
}

/// Requests codes from the BeeBeeJump API.
pub struct BeeBeeJumpIssuer {
    client: reqwest::Client,
    url: String,
    unlock_days: u32,
}

impl BeeBeeJumpIssuer {
    pub fn new(client: reqwest::Client, url: String, unlock_days: u32) -> Self {
        Self {
            client,
            url,
            unlock_days,
        }
    }
}

#[async_trait]
impl CodeIssuer for BeeBeeJumpIssuer {
    fn name(&self) -> &'static str {
        "beebeejump"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn issue_code(
        &self,
        device: &mut Device,
        business: &Business,
        validity: Validity,
    ) -> Result<String> {
        let credentials = business
            .beebeejump
            .as_ref()
            .ok_or_else(|| PaymentError::not_found("BeeBeeJump credentials", business.id))?;
        let day = match validity {
            Validity::Permanent => self.unlock_days,
            Validity::Days(days) => days_arg(Manufacturer::BeeBeeJump, days)?,
        };
        let body = UnlockRequest {
            sn: &device.serial_number,
            day,
            api_key: &credentials.api_key,
            api_secret: &credentials.api_secret,
        };

        let response: UnlockResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error(Manufacturer::BeeBeeJump, e))?
            .json()
            .await
            .map_err(|e| upstream_error(Manufacturer::BeeBeeJump, e))?;

        let code = decrypt_code(
            &response.data.encrypt,
            &credentials.aes_key,
            &credentials.aes_iv,
        )?;
        tracing::info!(serial = %device.serial_number, day, "BeeBeeJump code issued");
        Ok(code)
    }
}
