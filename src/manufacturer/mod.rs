//! Manufacturer adapters.
//!
//! Every manufacturer gets its own [`CodeIssuer`]. The [`ManufacturerAdapters`]
//! registry picks one per device; adding a manufacturer means registering a new
//! issuer, not editing a dispatch chain.

pub mod beebeejump;
pub mod biolite;
pub mod fallback;
pub mod openpaygo;

use crate::config::Settings;
use crate::domain::device::{Device, Manufacturer};
use crate::domain::loan::Validity;
use crate::domain::party::Business;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use beebeejump::BeeBeeJumpIssuer;
pub use biolite::BioLiteIssuer;
pub use fallback::{OpenAccessIssuer, PlaceholderIssuer};
pub use openpaygo::OpenPayGoIssuer;

/// Produces an unlock or extension code for one device.
///
/// Implementations return a non-empty code or an error. Codes from different
/// manufacturers share no format. Local issuers may mutate `device` (e.g. the
/// OpenPayGo counter); the caller persists it in the same unit of work.
#[async_trait]
pub trait CodeIssuer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Remote issuers cannot take a code back if the settlement later rolls back.
    fn is_remote(&self) -> bool {
        false
    }

    async fn issue_code(
        &self,
        device: &mut Device,
        business: &Business,
        validity: Validity,
    ) -> Result<String>;
}

pub type CodeIssuerRef = Arc<dyn CodeIssuer>;

/// Registry of issuers keyed by manufacturer.
#[derive(Clone)]
pub struct ManufacturerAdapters {
    issuers: HashMap<Manufacturer, CodeIssuerRef>,
    non_tokenised: CodeIssuerRef,
}

impl ManufacturerAdapters {
    /// Builds the production registry sharing one HTTP client with the configured timeout.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.manufacturer_timeout())
            .build()
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;

        let mut adapters = Self::empty();
        adapters.register(Manufacturer::OpenPayGo, Arc::new(OpenPayGoIssuer));
        adapters.register(
            Manufacturer::BioLite,
            Arc::new(BioLiteIssuer::new(
                client.clone(),
                settings.biolite_url.clone(),
                settings.biolite_jwt_ttl_secs,
            )),
        );
        adapters.register(
            Manufacturer::BeeBeeJump,
            Arc::new(BeeBeeJumpIssuer::new(
                client,
                settings.beebeejump_url.clone(),
                settings.beebeejump_unlock_days,
            )),
        );
        adapters.register(Manufacturer::Other, Arc::new(OpenAccessIssuer));
        Ok(adapters)
    }

    /// A registry with nothing but the non-tokenised placeholder.
    pub fn empty() -> Self {
        Self {
            issuers: HashMap::new(),
            non_tokenised: Arc::new(PlaceholderIssuer),
        }
    }

    pub fn register(&mut self, manufacturer: Manufacturer, issuer: CodeIssuerRef) {
        self.issuers.insert(manufacturer, issuer);
    }

    pub fn for_device(&self, device: &Device) -> Result<CodeIssuerRef> {
        if device.non_tokenised {
            return Ok(self.non_tokenised.clone());
        }
        self.issuers
            .get(&device.manufacturer)
            .cloned()
            .ok_or_else(|| {
                PaymentError::ValidationError(format!(
                    "no code issuer for manufacturer {}",
                    device.manufacturer
                ))
            })
    }
}

/// Maps a transport error onto the settlement error taxonomy.
pub(crate) fn upstream_error(manufacturer: Manufacturer, err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::UpstreamTimeout(manufacturer)
    } else {
        PaymentError::Upstream {
            manufacturer,
            message: err.to_string(),
        }
    }
}

/// Remote APIs take whole days; an absurd validity is a caller bug.
pub(crate) fn days_arg(manufacturer: Manufacturer, days: i64) -> Result<u32> {
    u32::try_from(days).map_err(|_| {
        PaymentError::ValidationError(format!("{manufacturer} cannot grant {days} days"))
    })
}
