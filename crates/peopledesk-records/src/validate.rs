//! Field checks shared by the record validators.
//!
//! Every check takes the collection and field name so the resulting
//! [`StoreError::Validation`] points at the offending value.

use chrono::NaiveDate;
use peopledesk_store::{Result, StoreError};

/// Non-blank text.
pub fn non_empty(collection: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(
            Some(collection),
            field,
            "must not be empty",
        ));
    }
    Ok(())
}

/// A plausible email address: one `@` with text on both sides and a dot in
/// the domain.
pub fn email(collection: &str, field: &str, value: &str) -> Result<()> {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    });
    if !valid || value.chars().any(char::is_whitespace) {
        return Err(StoreError::validation(
            Some(collection),
            field,
            format!("'{value}' is not an email address"),
        ));
    }
    Ok(())
}

/// `end` (if set) is on or after `start`.
pub fn date_order(
    collection: &str,
    field: &str,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<()> {
    match end {
        Some(end) if end < start => Err(StoreError::validation(
            Some(collection),
            field,
            format!("{end} is before {start}"),
        )),
        _ => Ok(()),
    }
}

/// Integer within `min..=max`.
pub fn in_range(collection: &str, field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(StoreError::validation(
            Some(collection),
            field,
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}

/// A `YYYY-MM` pay or review period.
pub fn period(collection: &str, field: &str, value: &str) -> Result<()> {
    let parsed = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d");
    if value.len() != 7 || parsed.is_err() {
        return Err(StoreError::validation(
            Some(collection),
            field,
            format!("'{value}' is not a YYYY-MM period"),
        ));
    }
    Ok(())
}

/// ISO 4217-style currency code: three uppercase letters.
pub fn currency(collection: &str, field: &str, value: &str) -> Result<()> {
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(StoreError::validation(
            Some(collection),
            field,
            format!("'{value}' is not a currency code"),
        ));
    }
    Ok(())
}
