//! OpenPayGo activation codes.
//!
//! The codec is pure: it never touches storage. Callers own the device counter and
//! must persist the returned `next_counter` before issuing another code.

pub mod openpaygo;

pub use openpaygo::{GeneratedToken, TokenRequest, generate};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation encoded in the token payload, understood by the device firmware.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    AddTime = 0,
    SetTime = 1,
    DisablePayg = 2,
    CounterSync = 3,
}

impl Instruction {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("secret key must be 32 lowercase hex characters: {0}")]
    InvalidSecret(String),
    #[error("value {value} exceeds the maximum of {max}")]
    ValueOutOfRange { value: u32, max: u32 },
    #[error("value divider must be at least 1")]
    InvalidDivider,
    #[error("starting code {0:?} does not match the token format")]
    InvalidStartingCode(String),
    #[error("token counter exhausted")]
    CounterExhausted,
}
