//! Field checks applied to a registration candidate before anything is stored.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Candidate, Field, ValidationError, ValidationErrors};

pub const MAX_FIELD_LEN: usize = 255;

// ASCII digits only; `\d` would also admit other scripts' digits.
static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{1,14}$").ok());

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").ok());

fn pattern_matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

/// Candidate with surrounding whitespace removed from every text field.
pub fn normalize(candidate: Candidate) -> Candidate {
    Candidate {
        name: candidate.name.trim().to_string(),
        email: candidate.email.trim().to_string(),
        phone: candidate.phone.trim().to_string(),
        password_hash: candidate.password_hash,
    }
}

/// Shape checks that need no storage access. Every violation is collected.
pub fn check_fields(candidate: &Candidate) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    check_text(&mut errors, Field::Name, &candidate.name);

    if check_text(&mut errors, Field::Email, &candidate.email) && !pattern_matches(&EMAIL, &candidate.email)
    {
        errors.push(ValidationError::InvalidEmail {
            value: candidate.email.clone(),
        });
    }

    if candidate.phone.is_empty() {
        errors.push(ValidationError::Required { field: Field::Phone });
    } else if !pattern_matches(&PHONE, &candidate.phone) {
        errors.push(ValidationError::InvalidPhone {
            value: candidate.phone.clone(),
        });
    }

    errors
}

/// Pushes `Required`/`TooLong` for `field`; `true` when the value passed both.
fn check_text(errors: &mut ValidationErrors, field: Field, value: &str) -> bool {
    if value.is_empty() {
        errors.push(ValidationError::Required { field });
        return false;
    }
    let len = value.chars().count();
    if len > MAX_FIELD_LEN {
        errors.push(ValidationError::TooLong {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
        return false;
    }
    true
}
