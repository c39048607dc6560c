use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Manufacturer {
    OpenPayGo,
    BioLite,
    BeeBeeJump,
    Other,
}

impl Manufacturer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::OpenPayGo => "openpaygo",
            Manufacturer::BioLite => "biolite",
            Manufacturer::BeeBeeJump => "beebeejump",
            Manufacturer::Other => "other",
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financed unit in the field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Device {
    pub id: Uuid,
    pub serial_number: String,
    pub manufacturer: Manufacturer,
    pub device_type_id: Uuid,
    #[serde(default)]
    pub non_tokenised: bool,
    /// 32 lowercase hex characters shared with the device firmware.
    #[serde(default)]
    pub openpaygo_secret_key: Option<String>,
    /// Next counter to use. Only ever incremented.
    #[serde(default)]
    pub openpaygo_token_count: u32,
    #[serde(default)]
    pub first_time_commission_paid: bool,
    /// Agent who handed the device to the customer.
    #[serde(default)]
    pub assigned_by: Option<Uuid>,
}

impl Device {
    pub fn secret_key(&self) -> Result<&str> {
        self.openpaygo_secret_key.as_deref().ok_or_else(|| {
            PaymentError::ValidationError(format!(
                "device {} has no OpenPayGo secret key",
                self.serial_number
            ))
        })
    }
}

/// Product line a device belongs to.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeviceType {
    pub id: Uuid,
    pub name: String,
    /// Percentage paid to the agent on full cash sales.
    #[serde(default)]
    pub onetime_commission_rate: Decimal,
}
