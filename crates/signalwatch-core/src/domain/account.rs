use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const TOKEN_PREFIX: char = 'w';
const TOKEN_DIGITS: usize = 8;

/// Store-assigned account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value <= 0 {
            return Err(ValidationError::InvalidAccountId {
                value: value.to_string(),
            });
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let value = input
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidAccountId {
                value: input.to_owned(),
            })?;
        Self::new(value)
    }
}

/// Single-use correlation token: `w` followed by eight digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationToken(String);

impl VerificationToken {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let mut chars = trimmed.chars();
        let well_formed = chars.next() == Some(TOKEN_PREFIX)
            && trimmed.len() == TOKEN_DIGITS + 1
            && chars.all(|ch| ch.is_ascii_digit());

        if !well_formed {
            return Err(ValidationError::InvalidToken {
                value: input.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Token for the eight-digit `number`; callers keep it below 10^8.
    pub(crate) fn from_number(number: u32) -> Self {
        Self(format!("{TOKEN_PREFIX}{number:0width$}", width = TOKEN_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VerificationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for VerificationToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VerificationToken> for String {
    fn from(value: VerificationToken) -> Self {
        value.0
    }
}

/// Identifier the messaging channel reports for the confirming user
/// (a Telegram chat id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalChannelId(String);

impl ExternalChannelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExternalChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration input. The password arrives already hashed by the caller's
/// hashing policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
}

/// Persisted account with its verification state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verification_token: Option<VerificationToken>,
    pub external_channel_id: Option<ExternalChannelId>,
}

impl Account {
    /// Verified exactly when the channel id is set and the token is cleared.
    pub fn is_verified(&self) -> bool {
        self.external_channel_id.is_some() && self.verification_token.is_none()
    }
}

/// Values handed to the store for a new pending account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub verification_token: VerificationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_from_number_is_zero_padded() {
        let token = VerificationToken::from_number(10_000_001);
        assert_eq!(token.as_str(), "w10000001");
        assert_eq!(VerificationToken::from_number(42).as_str(), "w00000042");
    }

    #[test]
    fn token_parse_rejects_wrong_shape() {
        assert!(VerificationToken::parse("w12345678").is_ok());
        assert!(VerificationToken::parse("x12345678").is_err());
        assert!(VerificationToken::parse("w1234567").is_err());
        assert!(VerificationToken::parse("w1234567a").is_err());
    }

    #[test]
    fn verified_requires_channel_id_and_cleared_token() {
        let mut account = Account {
            id: AccountId::new(1).expect("valid id"),
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            phone: "+15551234567".to_string(),
            password_hash: "hash".to_string(),
            verification_token: Some(VerificationToken::from_number(12_345_678)),
            external_channel_id: None,
        };
        assert!(!account.is_verified());

        account.external_channel_id = Some(ExternalChannelId::new("42"));
        assert!(!account.is_verified());

        account.verification_token = None;
        assert!(account.is_verified());
    }

    #[test]
    fn account_id_rejects_non_positive() {
        assert!("0".parse::<AccountId>().is_err());
        assert!("abc".parse::<AccountId>().is_err());
        assert_eq!("7".parse::<AccountId>().expect("valid").get(), 7);
    }
}
