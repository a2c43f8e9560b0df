//! Referral code codec.
//!
//! Turns a numeric user identifier into a short, shareable base-36 code with
//! a one-character additive checksum, and inverts that transform. The numeric
//! identifier is canonical; codes are derived and re-computable on demand.
//!
//! The checksum is a mod-36 digit sum. It catches casual tampering and
//! transcription errors, not deliberate forgery.

use thiserror::Error;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifiers must be 5 to 20 decimal digits after stripping.
const MIN_ID_DIGITS: usize = 5;
const MAX_ID_DIGITS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReferralCodeError {
    /// The identifier is not a 5-20 digit decimal string (leading zeros
    /// included: they cannot survive the integer round-trip, so they are
    /// rejected up front rather than silently re-encoded).
    #[error("invalid referral identifier")]
    InvalidIdentifier,
    /// The code is too short, contains no decodable payload, or decodes to
    /// something that is not a valid identifier.
    #[error("invalid referral code")]
    InvalidCode,
    /// The embedded checksum does not match the decoded identifier.
    #[error("referral code checksum mismatch")]
    ChecksumMismatch,
}

/// Encode a numeric identifier as a base-36 code with a trailing checksum char.
///
/// Non-digit characters are stripped before validation, so formatted inputs
/// like "id: 12345" are accepted.
pub fn encode(identifier: &str) -> Result<String, ReferralCodeError> {
    let digits: String = identifier.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_ID_DIGITS || digits.len() > MAX_ID_DIGITS {
        return Err(ReferralCodeError::InvalidIdentifier);
    }
    if digits.starts_with('0') {
        return Err(ReferralCodeError::InvalidIdentifier);
    }

    let value: u128 = digits
        .parse()
        .map_err(|_| ReferralCodeError::InvalidIdentifier)?;

    let mut code = to_base36(value);
    code.push(BASE36_ALPHABET[checksum(&digits)] as char);
    Ok(code)
}

/// Decode a referral code back to its numeric identifier.
///
/// The input is lowercased and stripped to `[a-z0-9]` first, so codes pasted
/// with surrounding punctuation or mixed case still resolve.
pub fn decode(code: &str) -> Result<String, ReferralCodeError> {
    let sanitized: String = code
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if sanitized.len() < 2 {
        return Err(ReferralCodeError::InvalidCode);
    }

    let (encoded, checksum_char) = sanitized.split_at(sanitized.len() - 1);
    let value = from_base36(encoded).ok_or(ReferralCodeError::InvalidCode)?;
    let decoded = value.to_string();

    if decoded.len() < MIN_ID_DIGITS || decoded.len() > MAX_ID_DIGITS {
        return Err(ReferralCodeError::InvalidCode);
    }

    let expected = BASE36_ALPHABET[checksum(&decoded)] as char;
    if checksum_char.chars().next() != Some(expected) {
        return Err(ReferralCodeError::ChecksumMismatch);
    }

    Ok(decoded)
}

/// Sum of decimal digit values, mod 36.
fn checksum(digits: &str) -> usize {
    let sum: u32 = digits.chars().filter_map(|c| c.to_digit(10)).sum();
    (sum % 36) as usize
}

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Base-36 decode with overflow checking. Returns None on empty input or
/// values that do not fit in u128.
fn from_base36(encoded: &str) -> Option<u128> {
    if encoded.is_empty() {
        return None;
    }
    let mut value: u128 = 0;
    for c in encoded.chars() {
        let digit = c.to_digit(36)? as u128;
        value = value.checked_mul(36)?.checked_add(digit)?;
    }
    Some(value)
}
