use super::money::Balance;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field agent who assigns devices and earns commission on settlements.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Agent {
    pub id: Uuid,
    pub business_id: Uuid,
    /// Personal rate in percent. Zero means "use the business default".
    #[serde(default)]
    pub commission_rate: Decimal,
    #[serde(default)]
    pub super_agent_id: Option<Uuid>,
    /// Share in percent handed to the super-agent. Zero means "use the business default".
    #[serde(default)]
    pub super_agent_rate: Decimal,
    /// Prepaid float the agent can spend on customers' loans.
    #[serde(default)]
    pub credit_balance: Balance,
}

/// Signing material for the BioLite code API.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BioLiteCredentials {
    pub issuer: String,
    /// PKCS#8 PEM of the ES256 private key.
    pub private_key_pem: String,
}

/// Account material for the BeeBeeJump code API.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BeeBeeJumpCredentials {
    pub api_key: String,
    pub api_secret: String,
    /// 32-byte AES-256 key, as text.
    pub aes_key: String,
    /// 16-byte CBC IV, as text.
    pub aes_iv: String,
}

/// Tenant operating the PAYG programme.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    /// Payment provider secret used to sign webhooks.
    pub webhook_secret: String,
    #[serde(default)]
    pub general_agent_commission_rate: Decimal,
    #[serde(default)]
    pub general_super_agent_commission_rate: Decimal,
    /// Fixed bonus paid once per device on its first settlement. Zero disables it.
    #[serde(default)]
    pub first_time_commission: Decimal,
    /// Validity granted by the very first payment on a loan, overriding the cycle length.
    #[serde(default)]
    pub token_validity_days: Option<i64>,
    #[serde(default)]
    pub biolite: Option<BioLiteCredentials>,
    #[serde(default)]
    pub beebeejump: Option<BeeBeeJumpCredentials>,
}
