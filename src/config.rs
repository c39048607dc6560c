//! Process-wide settings for the outbound manufacturer integrations.
//!
//! Business-specific knobs (commission rates, credentials) live on the
//! [`Business`](crate::domain::party::Business) record instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BIOLITE_URL: &str = "https://api.biolite.com/v1/payg/codes";
const DEFAULT_BEEBEEJUMP_URL: &str = "https://api.beebeejump.com/api/v1/device/unlock";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub biolite_url: String,
    pub beebeejump_url: String,
    /// Applied to every manufacturer request; expiry counts as a failed settlement.
    pub manufacturer_timeout_secs: u64,
    /// Lifetime of the JWT signed for each BioLite request.
    pub biolite_jwt_ttl_secs: i64,
    /// Days requested from BeeBeeJump when a loan is paid off.
    pub beebeejump_unlock_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            biolite_url: DEFAULT_BIOLITE_URL.to_string(),
            beebeejump_url: DEFAULT_BEEBEEJUMP_URL.to_string(),
            manufacturer_timeout_secs: 15,
            biolite_jwt_ttl_secs: 300,
            beebeejump_unlock_days: 9999,
        }
    }
}

impl Settings {
    /// Reads `PAYG_*` variables, falling back to defaults for anything unset or unparsable.
    ///
    /// A `.env` file in the working directory is honoured.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            biolite_url: lookup("PAYG_BIOLITE_URL").unwrap_or(defaults.biolite_url),
            beebeejump_url: lookup("PAYG_BEEBEEJUMP_URL").unwrap_or(defaults.beebeejump_url),
            manufacturer_timeout_secs: lookup("PAYG_MANUFACTURER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.manufacturer_timeout_secs),
            biolite_jwt_ttl_secs: lookup("PAYG_BIOLITE_JWT_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.biolite_jwt_ttl_secs),
            beebeejump_unlock_days: lookup("PAYG_BEEBEEJUMP_UNLOCK_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.beebeejump_unlock_days),
        }
    }

    pub fn manufacturer_timeout(&self) -> Duration {
        Duration::from_secs(self.manufacturer_timeout_secs)
    }
}
