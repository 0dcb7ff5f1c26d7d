use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Registration input fields that can carry a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Phone,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation and contract errors exposed by `signalwatch-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: Field },
    #[error("{field} length {len} exceeds max {max}")]
    TooLong { field: Field, len: usize, max: usize },
    #[error("email must be a valid address: '{value}'")]
    InvalidEmail { value: String },
    #[error("phone must be an international number such as +1234567890: '{value}'")]
    InvalidPhone { value: String },
    #[error("an account with this {field} is already registered")]
    AlreadyRegistered { field: Field },

    #[error("verification token must be 'w' followed by 8 digits: '{value}'")]
    InvalidToken { value: String },
    #[error("account id must be a positive integer: '{value}'")]
    InvalidAccountId { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unix timestamp {seconds} is out of range")]
    TimestampOutOfRange { seconds: i64 },
}

impl ValidationError {
    /// Registration field the error belongs to, if any.
    pub const fn field(&self) -> Option<Field> {
        match self {
            Self::Required { field }
            | Self::TooLong { field, .. }
            | Self::AlreadyRegistered { field } => Some(*field),
            Self::InvalidEmail { .. } => Some(Field::Email),
            Self::InvalidPhone { .. } => Some(Field::Phone),
            _ => None,
        }
    }
}

/// Every validation failure found for one registration attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether any error is attached to `field`.
    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|error| error.field() == Some(field))
    }

    /// Messages grouped by field name, in the shape form layers render.
    pub fn by_field(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            let key = error.field().map_or("general", Field::as_str);
            grouped.entry(key).or_default().push(error.to_string());
        }
        grouped
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
