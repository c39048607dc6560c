use super::{Instruction, TokenError};
use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use siphasher::sip::SipHasher24;
use std::hash::Hasher;

pub const MAX_VALUE: u32 = 995;
pub const MAX_EXTENDED_VALUE: u32 = 999_999;

const STARTING_CODE_DIGITS: usize = 4;
const EXTENDED_STARTING_CODE_DIGITS: usize = 9;
const PAYLOAD_DIGITS: usize = 16;
const EXTENDED_PAYLOAD_DIGITS: usize = 20;

/// Inputs for one activation code.
#[derive(Debug, Clone)]
pub struct TokenRequest<'a> {
    pub secret_key: &'a str,
    pub counter: u32,
    pub value: u32,
    pub instruction: Instruction,
    pub value_divider: u32,
    /// Firmware keypads limited to the digits 1-4.
    pub restricted_digit_set: bool,
    /// 20 payload digits and a 9 digit starting code instead of 16 and 4.
    pub extended_token: bool,
    pub starting_code: Option<&'a str>,
}

impl<'a> TokenRequest<'a> {
    pub fn new(secret_key: &'a str, counter: u32, value: u32, instruction: Instruction) -> Self {
        Self {
            secret_key,
            counter,
            value,
            instruction,
            value_divider: 1,
            restricted_digit_set: false,
            extended_token: false,
            starting_code: None,
        }
    }

    pub fn value_divider(mut self, divider: u32) -> Self {
        self.value_divider = divider;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted_digit_set = true;
        self
    }

    pub fn extended(mut self) -> Self {
        self.extended_token = true;
        self
    }

    pub fn starting_code(mut self, code: &'a str) -> Self {
        self.starting_code = Some(code);
        self
    }

    fn max_value(&self) -> u32 {
        if self.extended_token {
            MAX_EXTENDED_VALUE
        } else {
            MAX_VALUE
        }
    }

    fn starting_code_digits(&self) -> usize {
        if self.extended_token {
            EXTENDED_STARTING_CODE_DIGITS
        } else {
            STARTING_CODE_DIGITS
        }
    }

    fn payload_digits(&self) -> usize {
        if self.extended_token {
            EXTENDED_PAYLOAD_DIGITS
        } else {
            PAYLOAD_DIGITS
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    /// Counter the caller must persist before the next generation.
    pub next_counter: u32,
}

/// Derives the activation code for `request`.
///
/// Every input is validated before any output is produced, so a failure leaves the
/// caller's counter untouched.
pub fn generate(request: &TokenRequest<'_>) -> Result<GeneratedToken, TokenError> {
    let key = parse_secret(request.secret_key)?;
    if request.value_divider == 0 {
        return Err(TokenError::InvalidDivider);
    }
    let scaled = request.value / request.value_divider;
    if scaled > request.max_value() {
        return Err(TokenError::ValueOutOfRange {
            value: scaled,
            max: request.max_value(),
        });
    }
    let next_counter = request
        .counter
        .checked_add(1)
        .ok_or(TokenError::CounterExhausted)?;

    let starting_code = match request.starting_code {
        Some(code) => validate_starting_code(code, request)?.to_string(),
        None => derive_starting_code(&key, request),
    };

    let mut block = [0u8; 16];
    block[0..4].copy_from_slice(&request.counter.to_be_bytes());
    block[4..8].copy_from_slice(&scaled.to_be_bytes());
    block[8] = request.instruction.code();

    let cipher = Aes128::new(GenericArray::from_slice(&key));
    let mut ciphertext = GenericArray::clone_from_slice(&block);
    cipher.encrypt_block(&mut ciphertext);

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&ciphertext);
    let payload = render_payload(
        u128::from_be_bytes(bytes),
        request.payload_digits(),
        request.restricted_digit_set,
    );

    Ok(GeneratedToken {
        token: format!("{starting_code}{payload}"),
        next_counter,
    })
}

fn parse_secret(secret: &str) -> Result<[u8; 16], TokenError> {
    let well_formed = secret.len() == 32
        && secret
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err(TokenError::InvalidSecret(format!(
            "got {} characters",
            secret.len()
        )));
    }
    let mut key = [0u8; 16];
    hex::decode_to_slice(secret, &mut key)
        .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;
    Ok(key)
}

fn validate_starting_code<'a>(
    code: &'a str,
    request: &TokenRequest<'_>,
) -> Result<&'a str, TokenError> {
    let allowed = |b: u8| {
        if request.restricted_digit_set {
            (b'1'..=b'4').contains(&b)
        } else {
            b.is_ascii_digit()
        }
    };
    if code.len() == request.starting_code_digits() && code.bytes().all(allowed) {
        Ok(code)
    } else {
        Err(TokenError::InvalidStartingCode(code.to_string()))
    }
}

/// SipHash-2-4 of the big-endian counter, digest read in its canonical byte order.
fn derive_starting_code(key: &[u8; 16], request: &TokenRequest<'_>) -> String {
    let mut hasher = SipHasher24::new_with_key(key);
    hasher.write(&request.counter.to_be_bytes());
    let digest = hasher.finish().to_le_bytes();

    let code = if request.extended_token {
        format!("{:09}", u64::from_be_bytes(digest) % 1_000_000_000)
    } else {
        let leading = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        format!("{:04}", leading % 10_000)
    };

    if request.restricted_digit_set {
        code.chars()
            .map(|c| match c.to_digit(10) {
                Some(d) => char::from(b'1' + (d % 4) as u8),
                None => c,
            })
            .collect()
    } else {
        code
    }
}

fn render_payload(value: u128, digits: usize, restricted: bool) -> String {
    if restricted {
        let mut n = value % 4u128.pow(digits as u32);
        let mut out = vec!['1'; digits];
        for slot in out.iter_mut().rev() {
            *slot = char::from(b'1' + (n % 4) as u8);
            n /= 4;
        }
        out.into_iter().collect()
    } else {
        let n = value % 10u128.pow(digits as u32);
        format!("{n:0width$}", width = digits)
    }
}
