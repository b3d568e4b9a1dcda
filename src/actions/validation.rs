//! Declarative reading of untyped action payloads.
//!
//! A [`Payload`] walks a JSON object field by field, collecting a
//! [`FieldError`] for every missing or malformed field instead of stopping at
//! the first one. Values returned before [`Payload::finish`] succeeds must not
//! be used; required readers return placeholders when the field is invalid.
//! Keys that no reader asks for (a client-sent `orgId`, for instance) are ignored.
//! `null` is treated the same as an absent key.

use regex::Regex;
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use uuid::Uuid;

use super::{ActionError, FieldError};

const ROOT_FIELD: &str = "input";
const MAX_ID_LIST: usize = 1000;

/// Phone numbers: optional leading `+`, then 7 to 20 digits and separators.
pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^\+?[0-9 ().-]{7,20}$").is_ok_and(|re| re.is_match(phone))
}

/// Calendar dates as `YYYY-MM-DD`.
pub fn valid_date(date: &str) -> bool {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").is_ok_and(|re| re.is_match(date))
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub struct Payload<'a> {
    fields: Option<&'a Map<String, Value>>,
    errors: Vec<FieldError>,
}

impl<'a> Payload<'a> {
    /// Accepts an object or `null` (an action without arguments).
    #[must_use]
    pub fn new(input: &'a Value) -> Self {
        match input {
            Value::Object(map) => Self {
                fields: Some(map),
                errors: Vec::new(),
            },
            Value::Null => Self {
                fields: None,
                errors: Vec::new(),
            },
            _ => Self {
                fields: None,
                errors: vec![FieldError::new(ROOT_FIELD, "Expected an object")],
            },
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_null())
    }

    fn reject(&mut self, key: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(key, message));
    }

    /// Trimmed string, `None` when absent.
    pub fn optional_string(&mut self, key: &str, max_len: usize) -> Option<String> {
        match self.get(key)? {
            Value::String(value) => {
                let value = value.trim();
                if value.chars().count() > max_len {
                    self.reject(key, format!("Must be at most {max_len} characters"));
                    return None;
                }
                Some(value.to_string())
            }
            _ => {
                self.reject(key, "Expected a string");
                None
            }
        }
    }

    /// Non-empty trimmed string.
    pub fn required_string(&mut self, key: &str, max_len: usize) -> String {
        let errors_before = self.errors.len();
        match self.optional_string(key, max_len) {
            Some(value) if !value.is_empty() => value,
            _ => {
                if self.errors.len() == errors_before {
                    self.reject(key, "Required");
                }
                String::new()
            }
        }
    }

    /// Optional string that, when non-empty, must satisfy `check`.
    pub fn optional_matching(
        &mut self,
        key: &str,
        max_len: usize,
        check: fn(&str) -> bool,
        message: &str,
    ) -> Option<String> {
        let value = self.optional_string(key, max_len)?;
        if value.is_empty() || check(&value) {
            Some(value)
        } else {
            self.reject(key, message);
            None
        }
    }

    pub fn optional_uuid(&mut self, key: &str) -> Option<Uuid> {
        match self.get(key)? {
            Value::String(value) => match Uuid::parse_str(value.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    self.reject(key, "Expected a UUID");
                    None
                }
            },
            _ => {
                self.reject(key, "Expected a UUID");
                None
            }
        }
    }

    pub fn required_uuid(&mut self, key: &str) -> Uuid {
        if self.get(key).is_none() {
            self.reject(key, "Required");
            return Uuid::nil();
        }
        self.optional_uuid(key).unwrap_or_default()
    }

    /// List of UUIDs; duplicates are dropped keeping the first occurrence.
    pub fn uuid_list(&mut self, key: &str) -> Vec<Uuid> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        let Value::Array(items) = value else {
            self.reject(key, "Expected a list of UUIDs");
            return Vec::new();
        };
        if items.len() > MAX_ID_LIST {
            self.reject(key, format!("Must contain at most {MAX_ID_LIST} entries"));
            return Vec::new();
        }

        let mut ids = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item.as_str().map(|raw| Uuid::parse_str(raw.trim())) {
                Some(Ok(id)) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                _ => self.reject(format!("{key}[{index}]").as_str(), "Expected a UUID"),
            }
        }
        ids
    }

    /// Integer within `range`, `default` when absent.
    pub fn u32_in(&mut self, key: &str, range: RangeInclusive<u32>, default: u32) -> u32 {
        let Some(value) = self.get(key) else {
            return default;
        };
        match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) if range.contains(&n) => n,
            _ => {
                self.reject(
                    key,
                    format!(
                        "Expected an integer between {} and {}",
                        range.start(),
                        range.end()
                    ),
                );
                default
            }
        }
    }

    /// String parsed by `parse`, `None` when absent.
    pub fn optional_enum<T>(
        &mut self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Option<T> {
        let value = self.get(key)?;
        match value.as_str().and_then(parse) {
            Some(parsed) => Some(parsed),
            None => {
                self.reject(key, format!("Expected one of: {expected}"));
                None
            }
        }
    }

    pub fn required_enum<T: Default>(
        &mut self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> T {
        if self.get(key).is_none() {
            self.reject(key, "Required");
            return T::default();
        }
        self.optional_enum(key, parse, expected).unwrap_or_default()
    }

    /// Record a cross-field constraint failure.
    pub fn fail(&mut self, key: &str, message: &str) {
        self.reject(key, message);
    }

    /// Accept or reject the payload as a whole.
    ///
    /// # Errors
    /// Returns `ActionError::Validation` with every collected field error.
    pub fn finish(self) -> Result<(), ActionError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ActionError::Validation(self.errors))
        }
    }
}
