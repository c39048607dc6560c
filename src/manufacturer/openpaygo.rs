use super::CodeIssuer;
use crate::domain::device::Device;
use crate::domain::loan::Validity;
use crate::domain::party::Business;
use crate::error::Result;
use crate::token::{self, Instruction, TokenError, TokenRequest};
use async_trait::async_trait;

/// Generates codes locally and advances the device counter.
pub struct OpenPayGoIssuer;

#[async_trait]
impl CodeIssuer for OpenPayGoIssuer {
    fn name(&self) -> &'static str {
        "openpaygo"
    }

    async fn issue_code(
        &self,
        device: &mut Device,
        _business: &Business,
        validity: Validity,
    ) -> Result<String> {
        let (instruction, value) = match validity {
            Validity::Permanent => (Instruction::DisablePayg, 0),
            Validity::Days(days) => {
                let value = u32::try_from(days).map_err(|_| TokenError::ValueOutOfRange {
                    value: u32::MAX,
                    max: token::openpaygo::MAX_VALUE,
                })?;
                (Instruction::AddTime, value)
            }
        };

        let generated = token::generate(&TokenRequest::new(
            device.secret_key()?,
            device.openpaygo_token_count,
            value,
            instruction,
        ))?;
        device.openpaygo_token_count = generated.next_counter;

        tracing::debug!(
            serial = %device.serial_number,
            counter = device.openpaygo_token_count,
            ?instruction,
            "OpenPayGo code generated"
        );
        Ok(generated.token)
    }
}
