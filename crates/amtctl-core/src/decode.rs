// ── Capability decoder ──
//
// Turns the firmware-reported (version, SKU) pair into the feature text
// shown to operators. Firmware generations up to 2 report an enumerated
// code; later generations report a bitmask whose labels are listed in
// `SKU_BITS`. Label order and trailing spaces are part of the output
// format: consumers match on substrings.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Why a (version, SKU) pair could not be decoded.
///
/// The display text doubles as the label shown in place of the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Invalid AMT version format")]
    InvalidVersionFormat,
    #[error("Invalid AMT version")]
    InvalidVersion,
    #[error("Invalid SKU")]
    InvalidSku,
}

/// One labelled bit of the SKU mask, valid for a range of major versions.
struct SkuBit {
    generations: RangeInclusive<u32>,
    bit: u64,
    label: &'static str,
    /// The label is suppressed when any of these bits is also set.
    unless: u64,
}

const fn bit(generations: RangeInclusive<u32>, bit: u64, label: &'static str) -> SkuBit {
    SkuBit {
        generations,
        bit,
        label,
        unless: 0,
    }
}

const LAST_ENUMERATED_GENERATION: u32 = 2;

const LEGACY_CODES: &[(u64, &str)] = &[(0, "AMT + ASF + iQST"), (1, "ASF + iQST"), (2, "iQST")];

const SKU_BITS: &[SkuBit] = &[
    bit(3..=4, 0x02, "iQST "),
    bit(3..=4, 0x04, "ASF "),
    bit(3..=4, 0x08, "AMT"),
    bit(5..=u32::MAX, 0x02, "iQST "),
    SkuBit {
        unless: 0x08,
        ..bit(5..=u32::MAX, 0x04, "ASF ")
    },
    bit(5..=u32::MAX, 0x08, "AMT Pro "),
    bit(5..=u32::MAX, 0x10, "Intel Standard Manageability "),
    bit(5..=u32::MAX, 0x20, "TPM "),
    bit(5..=u32::MAX, 0x100, "Home IT "),
    bit(5..=u32::MAX, 0x400, "WOX "),
    bit(5..=u32::MAX, 0x2000, "AT-p "),
    bit(5..=u32::MAX, 0x4000, "Corporate "),
    bit(5..=u32::MAX, 0x8000, "L3 Mgt Upgrade"),
];

/// Decode the feature text for an AMT `version` and `sku`.
pub fn decode(version: &str, sku: &str) -> Result<String, DecodeError> {
    let major = parse_major(version)?;
    let sku = parse_sku(sku).ok_or(DecodeError::InvalidSku)?;

    if major <= LAST_ENUMERATED_GENERATION {
        let label = LEGACY_CODES
            .iter()
            .find(|(code, _)| *code == sku)
            .map_or("Unknown", |&(_, label)| label);
        return Ok(label.to_string());
    }

    Ok(SKU_BITS
        .iter()
        .filter(|entry| entry.generations.contains(&major))
        .filter(|entry| sku & entry.bit != 0 && sku & entry.unless == 0)
        .map(|entry| entry.label)
        .collect())
}

/// Feature text, or the error label when the inputs are malformed.
pub fn describe(version: &str, sku: &str) -> String {
    decode(version, sku).unwrap_or_else(|e| e.to_string())
}

fn parse_major(version: &str) -> Result<u32, DecodeError> {
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or_default();
    if parts.next().is_none() {
        return Err(DecodeError::InvalidVersionFormat);
    }
    major.parse::<u32>().map_err(|_| DecodeError::InvalidVersion)
}

/// Non-negative 64-bit signed integer with base prefixes: `0x` hex, `0b`
/// binary, `0o` or a bare leading `0` octal, decimal otherwise. Values above
/// `i64::MAX` are rejected.
fn parse_sku(raw: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        (bin, 2)
    } else if let Some(oct) = raw.strip_prefix("0o").or_else(|| raw.strip_prefix("0O")) {
        (oct, 8)
    } else if raw.len() > 1 && raw.starts_with('0') {
        (&raw[1..], 8)
    } else {
        (raw, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let value = i64::from_str_radix(digits, radix).ok()?;
    u64::try_from(value).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const FIXTURES: &[(&str, &str, &str)] = &[
        ("200", "0", "Invalid AMT version format"),
        ("ab.c", "0", "Invalid AMT version"),
        ("2.0.0", "0", "AMT + ASF + iQST"),
        ("2.1.0", "1", "ASF + iQST"),
        ("2.2.0", "2", "iQST"),
        ("1.1.0", "3", "Unknown"),
        ("3.0.0", "008", "Invalid SKU"),
        ("3.0.0", "8", "AMT"),
        ("4.1.0", "2", "iQST "),
        ("4.0.0", "4", "ASF "),
        ("5.0.0", "288", "TPM Home IT "),
        ("5.0.0", "1088", "WOX "),
        ("5.0.0", "38", "iQST ASF TPM "),
        ("5.0.0", "4", "ASF "),
        ("6.0.0", "2", "iQST "),
        ("7.0.0", "36864", "L3 Mgt Upgrade"),
        ("8.0.0", "24584", "AMT Pro AT-p Corporate "),
        ("10.0.0", "8", "AMT Pro "),
        ("11.0.0", "16392", "AMT Pro Corporate "),
        ("15.0.42", "16392", "AMT Pro Corporate "),
        ("16.1.25", "16400", "Intel Standard Manageability Corporate "),
    ];

    #[test]
    fn fixture_table() {
        for (version, sku, expected) in FIXTURES {
            assert_eq!(describe(version, sku), *expected, "decode({version:?}, {sku:?})");
        }
    }

    #[test]
    fn errors_are_typed() {
        assert_eq!(decode("200", "0"), Err(DecodeError::InvalidVersionFormat));
        assert_eq!(decode("ab.c", "0"), Err(DecodeError::InvalidVersion));
        assert_eq!(decode("3.0.0", "008"), Err(DecodeError::InvalidSku));
        assert_eq!(decode("3.0.0", "-1"), Err(DecodeError::InvalidSku));
        assert_eq!(decode("3.0.0", ""), Err(DecodeError::InvalidSku));
    }

    #[test]
    fn version_is_checked_before_sku() {
        assert_eq!(decode("200", "junk"), Err(DecodeError::InvalidVersionFormat));
    }

    #[test]
    fn sku_accepts_base_prefixes() {
        assert_eq!(parse_sku("0x4008"), Some(0x4008));
        assert_eq!(parse_sku("0b1000"), Some(8));
        assert_eq!(parse_sku("0o10"), Some(8));
        assert_eq!(parse_sku("010"), Some(8));
        assert_eq!(parse_sku("0"), Some(0));
        assert_eq!(parse_sku("0x"), None);
    }

    #[test]
    fn sku_is_limited_to_signed_64_bit() {
        assert_eq!(parse_sku("9223372036854775807"), Some(0x7fff_ffff_ffff_ffff));
        assert_eq!(parse_sku("0x7fffffffffffffff"), Some(0x7fff_ffff_ffff_ffff));
        assert_eq!(parse_sku("9223372036854775808"), None);
        assert_eq!(parse_sku("0xffffffffffffffff"), None);
        assert_eq!(decode("11.0.0", "18446744073709551615"), Err(DecodeError::InvalidSku));
    }

    #[test]
    fn asf_is_suppressed_by_amt_pro_from_generation_five() {
        assert_eq!(decode("5.0.0", "12").unwrap(), "AMT Pro ");
        assert_eq!(decode("4.0.0", "12").unwrap(), "ASF AMT");
    }

    #[test]
    fn generation_three_is_a_bitmask() {
        assert_eq!(decode("3.0.0", "0").unwrap(), "");
        assert_eq!(decode("2.9.9", "0").unwrap(), "AMT + ASF + iQST");
    }

    #[test]
    fn decoding_is_idempotent() {
        for (version, sku, _) in FIXTURES {
            assert_eq!(describe(version, sku), describe(version, sku));
        }
    }
}
