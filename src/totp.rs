// totp.rs
// TOTP engine (RFC 6238 over RFC 4226): Base32 secrets, code computation,
// verification with an explicit skew window, and secret generation.

use std::{
    fmt,
    str::FromStr,
    sync::LazyLock,
    time::{SystemTime, UNIX_EPOCH},
};

use data_encoding::{BASE32_NOPAD, Encoding};
use hmac::{Hmac, Mac, digest::KeyInit};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;

pub const MIN_SECRET_BYTES: usize = 16; // 128 bits
pub const DEFAULT_SECRET_BYTES: usize = 20; // 160 bits (recommended)
pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u64 = 30;
/// Upper bound on `digits`; it only limits the size of the padded code.
/// From 10 digits up the truncated value is returned whole, zero-padded.
pub const MAX_DIGITS: u32 = 64;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

// Unpadded RFC 4648 alphabet that ignores non-zero trailing bits, which some
// providers emit in hand-typed secrets.
static LENIENT_BASE32: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = BASE32_NOPAD.specification();
    spec.check_trailing_bits = false;
    spec.encoding().unwrap_or_else(|_| BASE32_NOPAD.clone())
});

/// Failures of the engine. Messages never include secret material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotpError {
    #[error("invalid secret key")]
    InvalidSecret,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// HMAC hash used to derive codes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TotpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(Algorithm::Sha1),
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA512" => Ok(Algorithm::Sha512),
            _ => Err(TotpError::InvalidParameters(format!(
                "unsupported algorithm '{}'",
                value.trim()
            ))),
        }
    }
}

/// Current code plus the seconds left before it rotates (`1..=period`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotpCode {
    pub code: String,
    pub remaining_seconds: u64,
}

/// Computes the code for `secret` at Unix time `at` (seconds).
pub fn compute_code(
    secret: &str,
    algorithm: Algorithm,
    digits: u32,
    period: u64,
    at: u64,
) -> Result<TotpCode, TotpError> {
    check_parameters(digits, period)?;
    let key = decode_secret(secret)?;
    let counter = at / period;
    Ok(TotpCode {
        code: hotp(&key, algorithm, digits, counter)?,
        remaining_seconds: period - (at % period),
    })
}

/// Same as [`compute_code`] at the current wall-clock time.
pub fn compute_code_now(
    secret: &str,
    algorithm: Algorithm,
    digits: u32,
    period: u64,
) -> Result<TotpCode, TotpError> {
    compute_code(secret, algorithm, digits, period, unix_now())
}

/// Checks `candidate` against every step in `[T - skew, T + skew]`.
/// `skew = 0` is the strict single-window check.
pub fn verify_code(
    secret: &str,
    algorithm: Algorithm,
    digits: u32,
    period: u64,
    candidate: &str,
    at: u64,
    skew: u64,
) -> Result<bool, TotpError> {
    check_parameters(digits, period)?;
    let key = decode_secret(secret)?;
    let candidate = candidate.trim();
    let current = at / period;
    let first = current.saturating_sub(skew);
    let last = current.saturating_add(skew);

    let mut matched = false;
    for counter in first..=last {
        let expected = hotp(&key, algorithm, digits, counter)?;
        // no early exit: every step in the window is compared
        matched |= constant_time_eq(expected.as_bytes(), candidate.as_bytes());
    }
    Ok(matched)
}

/// Canonical at-rest form: uppercase, no whitespace, dashes or `=` padding.
/// Fails if the result does not decode as Base32.
pub fn normalize_secret(raw: &str) -> Result<String, TotpError> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .trim_end_matches('=')
        .to_ascii_uppercase();
    decode_secret(&normalized)?;
    Ok(normalized)
}

/// Decodes a Base32 secret: case-insensitive, whitespace and trailing
/// padding ignored. Empty input is rejected.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('=')
        .to_ascii_uppercase();
    if cleaned.is_empty() {
        return Err(TotpError::InvalidSecret);
    }
    if !cleaned
        .bytes()
        .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(TotpError::InvalidSecret);
    }

    LENIENT_BASE32
        .decode(cleaned.as_bytes())
        .map_err(|_| TotpError::InvalidSecret)
}

/// Random unpadded Base32 secret of at least [`MIN_SECRET_BYTES`].
pub fn generate_base32_secret_n(bytes: usize) -> String {
    let n = bytes.max(MIN_SECRET_BYTES);
    let mut buf = vec![0u8; n];
    rand::rng().fill_bytes(&mut buf);
    BASE32_NOPAD.encode(&buf)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn check_parameters(digits: u32, period: u64) -> Result<(), TotpError> {
    if digits == 0 || digits > MAX_DIGITS {
        return Err(TotpError::InvalidParameters(format!(
            "digits must be between 1 and {MAX_DIGITS}"
        )));
    }
    if period == 0 {
        return Err(TotpError::InvalidParameters(
            "period must be positive".to_string(),
        ));
    }
    Ok(())
}

/// RFC 4226: HMAC over the big-endian counter, dynamic truncation, then
/// reduction to `digits` decimal places.
fn hotp(
    key: &[u8],
    algorithm: Algorithm,
    digits: u32,
    counter: u64,
) -> Result<String, TotpError> {
    let message = counter.to_be_bytes();
    let digest = match algorithm {
        Algorithm::Sha1 => hmac_digest::<HmacSha1>(key, &message)?,
        Algorithm::Sha256 => hmac_digest::<HmacSha256>(key, &message)?,
        Algorithm::Sha512 => hmac_digest::<HmacSha512>(key, &message)?,
    };

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    // 10^digits above u64 is larger than any 31-bit value anyway
    let value = match 10u64.checked_pow(digits) {
        Some(modulus) => u64::from(binary) % modulus,
        None => u64::from(binary),
    };
    Ok(format!("{:0width$}", value, width = digits as usize))
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, TotpError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| TotpError::InvalidSecret)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // code length is public (digits); only the content is compared in constant time
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
