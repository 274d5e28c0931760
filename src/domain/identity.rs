//! Guest identity helpers: phone normalization and code generation.
//!
//! Phone numbers are stored in Vietnamese domestic form (`0` followed by
//! nine digits) so that `+84 912 345 678`, `84912345678` and
//! `0912-345-678` all resolve to the same voter.

use rand::Rng;

use crate::error::AppError;

/// Alphabet for human-typed codes. Excludes `0`, `O`, `1`, `I` and `L`.
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Length of event codes and guest access codes.
pub const CODE_LEN: usize = 6;

/// Normalizes a phone number to the domestic `0xxxxxxxxx` form.
///
/// # Errors
///
/// Returns [`AppError::InvalidPhone`] if the input does not describe a
/// ten-digit Vietnamese number.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '+'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidPhone(raw.to_string()));
    }

    let domestic = if let Some(rest) = digits.strip_prefix("84").filter(|r| r.len() == 9) {
        format!("0{rest}")
    } else if has_plus {
        return Err(AppError::InvalidPhone(raw.to_string()));
    } else {
        digits
    };

    if domestic.len() != 10 || !domestic.starts_with('0') {
        return Err(AppError::InvalidPhone(raw.to_string()));
    }
    Ok(domestic)
}

/// Normalizes a typed or scanned code: trims and upper-cases it.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Generates a random code of [`CODE_LEN`] characters from an unambiguous
/// alphabet.
#[must_use]
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET.get(idx).copied().map_or('X', char::from)
        })
        .collect()
}

/// Generates a six-digit numeric one-time password.
#[must_use]
pub fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000_u32))
}

/// Generates an opaque 256-bit bearer token, hex-encoded.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn domestic_number_is_kept() {
        let Ok(phone) = normalize_phone("0912345678") else {
            panic!("valid phone");
        };
        assert_eq!(phone, "0912345678");
    }

    #[test]
    fn international_prefixes_are_folded() {
        for raw in ["+84 912 345 678", "84912345678", "+84-912.345.678"] {
            let Ok(phone) = normalize_phone(raw) else {
                panic!("{raw} should normalize");
            };
            assert_eq!(phone, "0912345678");
        }
    }

    #[test]
    fn separators_are_stripped() {
        let Ok(phone) = normalize_phone("(091) 234-5678") else {
            panic!("valid phone");
        };
        assert_eq!(phone, "0912345678");
    }

    #[test]
    fn rejects_malformed_numbers() {
        for raw in ["", "abc", "12345", "091234567890", "+1 555 123 4567", "1912345678"] {
            assert!(normalize_phone(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn codes_use_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn otp_is_six_digits() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn code_normalization_uppercases() {
        assert_eq!(normalize_code("  ab7k9z "), "AB7K9Z");
    }
}
