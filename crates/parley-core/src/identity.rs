// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity normalization for contact handles.
//!
//! Phone numbers have two distinct forms that must never be mixed:
//!
//! - **comparison form**: the last 10 digits. Used as the stored handle and
//!   for every lookup, match, and dedup decision.
//! - **transport form**: the full international number the provider expects.
//!   Produced only at the moment a message leaves the process.

use crate::error::ParleyError;
use crate::types::Channel;

/// Number of trailing digits kept in the comparison form.
pub const COMPARISON_DIGITS: usize = 10;

/// Keep only ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Reduce a phone identifier to its comparison form (last 10 digits).
///
/// Identifiers shorter than 10 digits are returned as all their digits.
pub fn comparison_form(raw: &str) -> String {
    let digits = digits_only(raw);
    let skip = digits.len().saturating_sub(COMPARISON_DIGITS);
    digits[skip..].to_string()
}

/// Canonical handle for storage and lookup on the given channel.
///
/// Phone channels store the comparison form; email handles are trimmed and
/// lowercased; other channels keep the trimmed provider identifier.
pub fn canonical_handle(channel: Channel, raw: &str) -> Result<String, ParleyError> {
    let handle = if channel.is_phone_based() {
        comparison_form(raw)
    } else if channel == Channel::Email {
        raw.trim().to_lowercase()
    } else {
        raw.trim().to_string()
    };

    if handle.is_empty() {
        return Err(ParleyError::InvalidInput(format!(
            "identifier `{raw}` has no usable {channel} handle"
        )));
    }
    Ok(handle)
}

/// How a transport expects the number to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStyle {
    /// Digits only (Whapi-style gateways).
    Bare,
    /// Leading `+` (E.164, SMS and voice providers).
    Plus,
}

/// Country-specific rules for building the transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneFormat {
    country_code: String,
    mobile_indicator: String,
}

impl PhoneFormat {
    pub fn new(country_code: impl Into<String>, mobile_indicator: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            mobile_indicator: mobile_indicator.into(),
        }
    }

    /// Build the number a provider should be addressed with.
    ///
    /// - 10 digits: prefixed with country code and mobile indicator.
    /// - country code + 10 digits without the indicator: indicator inserted.
    /// - anything else: digits passed through unchanged.
    pub fn transport_form(&self, raw: &str, style: TransportStyle) -> Result<String, ParleyError> {
        let digits = digits_only(raw);
        if digits.is_empty() {
            return Err(ParleyError::InvalidInput(format!(
                "identifier `{raw}` contains no digits"
            )));
        }

        let mobile_prefix = format!("{}{}", self.country_code, self.mobile_indicator);
        let number = if digits.len() == COMPARISON_DIGITS {
            format!("{mobile_prefix}{digits}")
        } else if digits.len() == self.country_code.len() + COMPARISON_DIGITS
            && digits.starts_with(&self.country_code)
            && !digits.starts_with(&mobile_prefix)
        {
            format!("{mobile_prefix}{}", &digits[self.country_code.len()..])
        } else {
            digits
        };

        Ok(match style {
            TransportStyle::Bare => number,
            TransportStyle::Plus => format!("+{number}"),
        })
    }
}

impl Default for PhoneFormat {
    fn default() -> Self {
        Self::new("52", "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn comparison_form_keeps_last_ten_digits() {
        assert_eq!(comparison_form("+52 1 55 1234 5678"), "5512345678");
        assert_eq!(comparison_form("5215512345678@s.whatsapp.net"), "5512345678");
        assert_eq!(comparison_form("(55) 1234-5678"), "5512345678");
        assert_eq!(comparison_form("12345"), "12345");
        assert_eq!(comparison_form("no digits"), "");
    }

    #[test]
    fn canonical_handle_per_channel() {
        assert_eq!(
            canonical_handle(Channel::Wa, "5215512345678").unwrap(),
            "5512345678"
        );
        assert_eq!(
            canonical_handle(Channel::Email, "  Ana@Example.COM ").unwrap(),
            "ana@example.com"
        );
        assert_eq!(canonical_handle(Channel::Ig, " ig_user_1 ").unwrap(), "ig_user_1");
        assert!(canonical_handle(Channel::Wa, "abc").is_err());
        assert!(canonical_handle(Channel::Webchat, "   ").is_err());
    }

    #[test]
    fn transport_form_prefixes_local_numbers() {
        let fmt = PhoneFormat::default();
        assert_eq!(
            fmt.transport_form("5512345678", TransportStyle::Bare).unwrap(),
            "5215512345678"
        );
        assert_eq!(
            fmt.transport_form("55 1234 5678", TransportStyle::Plus).unwrap(),
            "+5215512345678"
        );
    }

    #[test]
    fn transport_form_inserts_mobile_indicator() {
        let fmt = PhoneFormat::default();
        assert_eq!(
            fmt.transport_form("525512345678", TransportStyle::Bare).unwrap(),
            "5215512345678"
        );
        // Already carries the indicator.
        assert_eq!(
            fmt.transport_form("5215512345678", TransportStyle::Plus).unwrap(),
            "+5215512345678"
        );
    }

    #[test]
    fn transport_form_passes_foreign_numbers_through() {
        let fmt = PhoneFormat::default();
        assert_eq!(
            fmt.transport_form("+1 415 555 0100", TransportStyle::Plus).unwrap(),
            "+14155550100"
        );
        assert!(fmt.transport_form("", TransportStyle::Bare).is_err());
    }

    proptest! {
        #[test]
        fn comparison_form_is_idempotent(raw in "[0-9+() -]{0,24}") {
            let once = comparison_form(&raw);
            prop_assert!(once.len() <= COMPARISON_DIGITS);
            prop_assert_eq!(comparison_form(&once), once);
        }

        #[test]
        fn transport_then_compare_is_stable(local in "[1-9][0-9]{9}") {
            let fmt = PhoneFormat::default();
            let wire = fmt.transport_form(&local, TransportStyle::Plus).unwrap();
            prop_assert!(wire.starts_with("+521"));
            prop_assert_eq!(comparison_form(&wire), local);
        }
    }
}
