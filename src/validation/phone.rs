//! Mobile number canonicalization.

use std::collections::HashMap;
use std::sync::Mutex;

use super::ValidationError;

/// Local subscriber numbers are nine digits once the trunk `0` is dropped.
const SUBSCRIBER_DIGITS: usize = 9;

/// Canonicalizes a user-typed phone number to `<prefix><9 digits>`.
pub fn normalize_phone(raw: &str, country_prefix: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();

    let candidate = if digits.len() == SUBSCRIBER_DIGITS + 1 && digits.starts_with('0') {
        format!("{}{}", country_prefix, &digits[1..])
    } else if digits.len() == SUBSCRIBER_DIGITS {
        format!("{}{}", country_prefix, digits)
    } else {
        digits
    };

    if candidate.len() != country_prefix.len() + SUBSCRIBER_DIGITS
        || !candidate.starts_with(country_prefix)
    {
        return Err(ValidationError::new(
            "phone_number",
            format!(
                "invalid phone number format, expected 07XXXXXXXX or {}XXXXXXXXX",
                country_prefix
            ),
        ));
    }

    Ok(candidate)
}

/// Process-lifetime memo over [`normalize_phone`].
pub struct PhoneNormalizer {
    country_prefix: String,
    cache: Mutex<HashMap<String, String>>,
}

impl PhoneNormalizer {
    pub fn new(country_prefix: impl Into<String>) -> Self {
        Self {
            country_prefix: country_prefix.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn normalize(&self, raw: &str) -> Result<String, ValidationError> {
        if let Some(hit) = self.lock().get(raw) {
            return Ok(hit.clone());
        }

        let normalized = normalize_phone(raw, &self.country_prefix)?;
        self.lock().insert(raw.to_string(), normalized.clone());
        Ok(normalized)
    }

    pub fn cached_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned memo only ever holds complete entries.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
