//! Derivation of the human-readable order code.
//!
//! The code is display-only and never stored: `#` followed by the UTC
//! creation date as DDMMYY and the order id zero-padded to five digits.
//! Ids above 99999 wrap to their last five digits, so a code alone is not
//! proof of identity: callers re-derive the code from the order they looked
//! up and compare byte-for-byte before trusting it.

use chrono::{DateTime, Datelike, Utc};

use super::errors::DomainError;

const ID_DIGITS: usize = 5;
const ID_MODULUS: i64 = 100_000;
/// '#' + DDMMYY + five id digits.
const CODE_LEN: usize = 1 + 6 + ID_DIGITS;

/// Derive the order code for an order id and its creation timestamp.
pub fn derive_order_code(order_id: i64, created_at: DateTime<Utc>) -> String {
    format!(
        "#{:02}{:02}{:02}{:05}",
        created_at.day(),
        created_at.month(),
        created_at.year() % 100,
        order_id.rem_euclid(ID_MODULUS)
    )
}

/// Accept a code with or without its leading '#'. Redirect URLs and QR
/// payloads drop the '#' because URLs reserve it for fragments.
pub fn normalize_order_code(raw: &str) -> String {
    if raw.starts_with('#') {
        raw.to_string()
    } else {
        format!("#{raw}")
    }
}

/// Extract the (wrapped) order id embedded in a code.
///
/// Only the shape is validated here; whether the code actually belongs to the
/// order it points at is decided by re-deriving and comparing.
pub fn parse_order_code(code: &str) -> Result<i64, DomainError> {
    let rest = code
        .strip_prefix('#')
        .ok_or_else(|| DomainError::InvalidInput("order code must start with '#'".to_string()))?;
    if code.len() != CODE_LEN || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::InvalidInput(format!(
            "malformed order code '{code}'"
        )));
    }
    let id: i64 = rest[6..]
        .parse()
        .map_err(|_| DomainError::InvalidInput(format!("malformed order code '{code}'")))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn code_has_fixed_width_date_and_id() {
        assert_eq!(derive_order_code(31, ts(2025, 10, 5)), "#05102500031");
    }

    #[test]
    fn single_digit_date_parts_are_zero_padded() {
        assert_eq!(derive_order_code(7, ts(2026, 1, 2)), "#02012600007");
    }

    #[test]
    fn id_above_five_digits_wraps_to_last_five() {
        assert_eq!(derive_order_code(123_456, ts(2025, 1, 1)), "#01012523456");
        assert_eq!(derive_order_code(100_000, ts(2025, 1, 1)), "#01012500000");
    }

    #[test]
    fn parse_recovers_id_for_all_ids_up_to_five_digits() {
        let created = ts(2025, 10, 5);
        for id in [0i64, 1, 31, 99, 12_345, 99_999] {
            let code = derive_order_code(id, created);
            assert_eq!(parse_order_code(&code).unwrap(), id);
        }
    }

    #[test]
    fn reparsing_a_wrapped_code_matches_the_regenerated_code() {
        let created = ts(2025, 1, 1);
        let code = derive_order_code(112_345, created);
        let parsed = parse_order_code(&code).unwrap();
        assert_eq!(derive_order_code(parsed, created), code);
    }

    #[test]
    fn parse_rejects_missing_hash_prefix() {
        assert!(matches!(
            parse_order_code("05102500031"),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(parse_order_code("#0510250031").is_err());
        assert!(parse_order_code("#051025000311").is_err());
        assert!(parse_order_code("#").is_err());
        assert!(parse_order_code("").is_err());
    }

    #[test]
    fn parse_rejects_non_digit_payload() {
        assert!(parse_order_code("#0510250003a").is_err());
        assert!(parse_order_code("#05x02500031").is_err());
    }

    #[test]
    fn normalize_adds_the_hash_only_when_missing() {
        assert_eq!(normalize_order_code("05102500031"), "#05102500031");
        assert_eq!(normalize_order_code("#05102500031"), "#05102500031");
    }

    #[test]
    fn code_uses_utc_date() {
        // 2025-10-05 23:30 UTC stays the 5th regardless of server locale.
        let late = Utc.with_ymd_and_hms(2025, 10, 5, 23, 30, 0).unwrap();
        assert_eq!(derive_order_code(1, late), "#05102500001");
    }
}
