//! Splitting of dump payloads into `field: value` pairs.

use std::num::{ParseFloatError, ParseIntError};

use serde::Serialize;
use thiserror::Error;

const ENTRY_SEPARATOR: &str = ", ";
const FIELD_SEPARATOR: &str = ": ";

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,
    #[error("malformed payload entry '{0}'")]
    MalformedEntry(String),
    #[error("duplicate payload field '{0}'")]
    DuplicateField(String),
    #[error("missing payload field '{0}'")]
    MissingField(String),
    #[error("invalid integer '{value}' for field {field}: {source}")]
    InvalidInteger {
        field: String,
        value: String,
        source: ParseIntError,
    },
    #[error("invalid number '{value}' for field {field}: {source}")]
    InvalidNumber {
        field: String,
        value: String,
        source: ParseFloatError,
    },
}

/// Ordered `field: value` pairs of one dump payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFields {
    entries: Vec<(String, String)>,
}

impl PayloadFields {
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        if payload.trim().is_empty() {
            return Err(PayloadError::Empty);
        }

        let mut entries: Vec<(String, String)> = Vec::new();
        for entry in payload.split(ENTRY_SEPARATOR) {
            let (field, value) = entry
                .split_once(FIELD_SEPARATOR)
                .ok_or_else(|| PayloadError::MalformedEntry(entry.to_string()))?;
            let field = field.trim();
            if field.is_empty() {
                return Err(PayloadError::MalformedEntry(entry.to_string()));
            }
            if entries.iter().any(|(existing, _)| existing == field) {
                return Err(PayloadError::DuplicateField(field.to_string()));
            }
            entries.push((field.to_string(), value.trim().to_string()));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.find(field).is_some()
    }

    pub fn get(&self, field: &str) -> Result<&str, PayloadError> {
        self.find(field)
            .ok_or_else(|| PayloadError::MissingField(field.to_string()))
    }

    pub fn get_i32(&self, field: &str) -> Result<i32, PayloadError> {
        let value = self.get(field)?;
        value
            .parse::<i32>()
            .map_err(|source| PayloadError::InvalidInteger {
                field: field.to_string(),
                value: value.to_string(),
                source,
            })
    }

    pub fn get_u32(&self, field: &str) -> Result<u32, PayloadError> {
        let value = self.get(field)?;
        value
            .parse::<u32>()
            .map_err(|source| PayloadError::InvalidInteger {
                field: field.to_string(),
                value: value.to_string(),
                source,
            })
    }

    pub fn get_f64(&self, field: &str) -> Result<f64, PayloadError> {
        let value = self.get(field)?;
        value
            .parse::<f64>()
            .map_err(|source| PayloadError::InvalidNumber {
                field: field.to_string(),
                value: value.to_string(),
                source,
            })
    }

    /// Optional variant of [`Self::get_u32`]: absent fields are `Ok(None)`.
    pub fn opt_u32(&self, field: &str) -> Result<Option<u32>, PayloadError> {
        if self.contains(field) {
            self.get_u32(field).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_i32(&self, field: &str) -> Result<Option<i32>, PayloadError> {
        if self.contains(field) {
            self.get_i32(field).map(Some)
        } else {
            Ok(None)
        }
    }

    fn find(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}
