//! Card validation
//!
//! One canonical validator for card payments:
//! - Card number: separators stripped, exactly 16 digits, Luhn checksum,
//!   supported network
//! - Expiry: `MM/YY`, not in the past, at most 20 years ahead
//! - CVV: digits only, length taken from the brand table
//! - Cardholder name: at least two words of two or more letters
//!
//! Validation is pure. All failures are collected into [`FieldErrors`] so a
//! form can show every problem at once.

use crate::error::{CardNumberIssue, Field, FieldErrors, Result, ValidationError};
use crate::types::CardBrand;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Digits in an accepted card number
pub const CARD_NUMBER_LENGTH: usize = 16;

/// Furthest expiry accepted, in years from today
pub const MAX_EXPIRY_YEARS_AHEAD: u32 = 20;

static BRAND_PATTERNS: Lazy<Vec<(CardBrand, Regex)>> = Lazy::new(|| {
    [
        (CardBrand::Visa, r"^4"),
        (CardBrand::Mastercard, r"^5[1-5]"),
        (CardBrand::Amex, r"^3[47]"),
        (CardBrand::Discover, r"^(6011|65)"),
    ]
    .into_iter()
    .map(|(brand, pattern)| (brand, Regex::new(pattern).expect("brand pattern compiles")))
    .collect()
});

static EXPIRY_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})$").expect("expiry pattern compiles"));

static NAME_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}' -]+$").expect("name pattern compiles"));

/// Card fields exactly as typed into the payment form
#[derive(Clone, Default)]
pub struct RawCardFields {
    pub number: String,
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
}

impl fmt::Debug for RawCardFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCardFields")
            .field("number", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("cvv", &"<redacted>")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// A card that passed every check
///
/// Only constructed by [`validate_card`], so holding one means the number is
/// Luhn-valid, the brand is supported and the CVV length fits the brand.
#[derive(Clone, PartialEq, Eq)]
pub struct CardInput {
    number_digits: String,
    expiry_month: u8,
    expiry_year: u8,
    cvv: String,
    brand: CardBrand,
    holder_name: String,
}

impl CardInput {
    pub fn brand(&self) -> CardBrand {
        self.brand
    }

    pub fn expiry_month(&self) -> u8 {
        self.expiry_month
    }

    pub fn expiry_year(&self) -> u8 {
        self.expiry_year
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn cvv(&self) -> &str {
        &self.cvv
    }

    pub fn number_digits(&self) -> &str {
        &self.number_digits
    }

    /// Last four digits, the only part of the number safe to display or log
    pub fn last4(&self) -> &str {
        &self.number_digits[self.number_digits.len() - 4..]
    }
}

impl fmt::Debug for CardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardInput")
            .field("number", &format_args!("**** **** **** {}", self.last4()))
            .field("expiry", &format_args!("{:02}/{:02}", self.expiry_month, self.expiry_year))
            .field("brand", &self.brand)
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// Luhn mod-10 checksum
///
/// Walks the digits right to left, doubling every second one and folding
/// doubled values above 9 back into a single digit.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(position, byte)| {
            let digit = u32::from(byte - b'0');
            if position % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// Card network for a digit string (any length)
pub fn detect_brand(digits: &str) -> CardBrand {
    BRAND_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(digits))
        .map(|(brand, _)| *brand)
        .unwrap_or(CardBrand::Unknown)
}

/// Strip spaces and dashes, then check the digits
pub fn normalize_card_number(raw: &str) -> Result<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::CardNumber(CardNumberIssue::NonNumeric));
    }
    if digits.len() != CARD_NUMBER_LENGTH {
        return Err(ValidationError::CardNumber(CardNumberIssue::Length));
    }
    if !luhn_valid(&digits) {
        return Err(ValidationError::CardNumber(CardNumberIssue::Checksum));
    }
    if !detect_brand(&digits).is_supported() {
        return Err(ValidationError::CardNumber(CardNumberIssue::UnknownBrand));
    }

    Ok(digits)
}

/// Parse `MM/YY` and check it against today's month
pub fn parse_expiry(raw: &str, today: NaiveDate) -> Result<(u8, u8)> {
    let captures = EXPIRY_FORMAT
        .captures(raw.trim())
        .ok_or_else(|| ValidationError::InvalidExpiry("expected MM/YY".to_string()))?;

    // Both groups are exactly two ASCII digits
    let month: u8 = captures[1]
        .parse()
        .map_err(|_| ValidationError::InvalidExpiry("invalid month".to_string()))?;
    let year: u8 = captures[2]
        .parse()
        .map_err(|_| ValidationError::InvalidExpiry("invalid year".to_string()))?;

    if !(1..=12).contains(&month) {
        return Err(ValidationError::InvalidExpiry("invalid month".to_string()));
    }

    let current_year = (today.year().rem_euclid(100)) as u32;
    let current_month = today.month();
    let (year_u32, month_u32) = (u32::from(year), u32::from(month));

    if year_u32 < current_year || (year_u32 == current_year && month_u32 < current_month) {
        return Err(ValidationError::ExpiredCard);
    }
    if year_u32 > current_year + MAX_EXPIRY_YEARS_AHEAD {
        return Err(ValidationError::InvalidExpiry(
            "expiry is too far in the future".to_string(),
        ));
    }

    Ok((month, year))
}

/// Digits only, length fixed by the card network
pub fn validate_cvv(raw: &str, brand: CardBrand) -> Result<String> {
    let cvv = raw.trim();
    let expected = brand.cvv_length();

    if cvv.len() != expected || !cvv.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidCvv { brand, expected });
    }

    Ok(cvv.to_string())
}

/// At least two words of two or more characters; letters, apostrophes,
/// hyphens and spaces only
pub fn validate_holder_name(raw: &str) -> Result<String> {
    let name = raw.trim();

    if !NAME_CHARACTERS.is_match(name) {
        return Err(ValidationError::InvalidName);
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() < 2 || words.iter().any(|word| word.chars().count() < 2) {
        return Err(ValidationError::InvalidName);
    }

    Ok(words.join(" "))
}

/// Validate every card field, collecting all failures
pub fn validate_card(raw: &RawCardFields, today: NaiveDate) -> std::result::Result<CardInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let number = errors.capture(Field::CardNumber, normalize_card_number(&raw.number));

    // The CVV rule still needs a brand when the number itself was refused
    let brand = match &number {
        Some(digits) => detect_brand(digits),
        None => {
            let digits: String = raw.number.chars().filter(|c| c.is_ascii_digit()).collect();
            detect_brand(&digits)
        }
    };

    let expiry = errors.capture(Field::Expiry, parse_expiry(&raw.expiry, today));
    // No CVV length to hold an unrecognised network to; the number error covers it
    let cvv = if brand.is_supported() {
        errors.capture(Field::Cvv, validate_cvv(&raw.cvv, brand))
    } else {
        None
    };
    let holder_name = errors.capture(Field::HolderName, validate_holder_name(&raw.holder_name));

    match (number, expiry, cvv, holder_name) {
        (Some(number_digits), Some((expiry_month, expiry_year)), Some(cvv), Some(holder_name))
            if errors.is_empty() =>
        {
            Ok(CardInput {
                number_digits,
                expiry_month,
                expiry_year,
                cvv,
                brand,
                holder_name,
            })
        }
        _ => Err(errors),
    }
}
