use super::CodeIssuer;
use crate::domain::device::Device;
use crate::domain::loan::Validity;
use crate::domain::party::Business;
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;

/// Devices with no PAYG lock. The code is informational only.
pub struct OpenAccessIssuer;

#[async_trait]
impl CodeIssuer for OpenAccessIssuer {
    fn name(&self) -> &'static str {
        "open"
    }

    async fn issue_code(&self, _: &mut Device, _: &Business, _: Validity) -> Result<String> {
        Ok("open".to_string())
    }
}

/// Non-tokenised devices get a random 6 digit reference in place of a real code.
pub struct PlaceholderIssuer;

#[async_trait]
impl CodeIssuer for PlaceholderIssuer {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn issue_code(&self, _: &mut Device, _: &Business, _: Validity) -> Result<String> {
        let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        Ok(code.to_string())
    }
}
