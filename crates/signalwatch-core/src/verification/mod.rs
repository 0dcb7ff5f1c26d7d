//! # Messaging-Channel Verification
//!
//! Registration creates a pending account and hands back a bot deep link.
//! The user opens the link, the bot relays the token back through
//! [`VerificationFlow::confirm`], and the page polling
//! [`VerificationFlow::poll`] receives a session grant once the account is
//! confirmed.
//!
//! An account is verified exactly when it has a channel id and no pending
//! token. Confirmation is one conditional update in the store, so a token
//! confirms at most one account at most once; replays and forged tokens are
//! silently ignored.

mod link;
mod token;
mod validate;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::store::{AccountStore, StoreError, UniqueField};
use crate::{
    Account, AccountId, Candidate, ExternalChannelId, Field, NewAccount, ValidationError,
    ValidationErrors, VerificationToken,
};

pub use link::{start_payload, token_from_start_message, ConfirmationLink, PAYLOAD_SEPARATOR};
pub use token::TokenGenerator;
pub use validate::{check_fields, normalize, MAX_FIELD_LEN};

pub const DEFAULT_LINK_BASE: &str = "https://t.me";
pub const DEFAULT_BOT_USERNAME: &str = "signalwatch_bot";
pub const DEFAULT_STATIC_PREFIX: &str = "w48135207";
pub const DEFAULT_MAX_TOKEN_ATTEMPTS: u32 = 32;
pub const DEFAULT_REDIRECT: &str = "/home";

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("registration rejected: {0}")]
    Invalid(ValidationErrors),

    #[error("account {account_id} not found")]
    NotFound { account_id: AccountId },

    #[error("no free verification token after {attempts} attempts")]
    TokenSpaceExhausted { attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<ValidationErrors> for VerificationError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Invalid(errors)
    }
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub link_base: String,
    pub bot_username: String,
    pub static_prefix: String,
    /// Token draws per registration before giving up.
    pub max_token_attempts: u32,
    pub redirect: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            link_base: DEFAULT_LINK_BASE.to_string(),
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            static_prefix: DEFAULT_STATIC_PREFIX.to_string(),
            max_token_attempts: DEFAULT_MAX_TOKEN_ATTEMPTS,
            redirect: DEFAULT_REDIRECT.to_string(),
        }
    }
}

impl VerificationConfig {
    /// Defaults with `SIGNALWATCH_BOT_USERNAME` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(username) = std::env::var("SIGNALWATCH_BOT_USERNAME") {
            if !username.trim().is_empty() {
                config.bot_username = username.trim().to_string();
            }
        }
        config
    }

    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = username.into();
        self
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub account: Account,
    pub confirmation_link: ConfirmationLink,
}

/// What the session layer needs to log a verified account in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionGrant {
    pub account_id: AccountId,
    pub remember: bool,
    pub redirect: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Pending,
    Verified { grant: SessionGrant },
}

impl PollOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Inbound confirmation relayed by the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationCallback {
    /// Token as received; it is not trusted to be well formed.
    pub token: String,
    pub channel_id: ExternalChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Verified { account_id: AccountId },
    Ignored,
}

pub struct VerificationFlow {
    config: VerificationConfig,
    store: Arc<dyn AccountStore>,
    tokens: TokenGenerator,
}

impl VerificationFlow {
    pub fn new(
        config: VerificationConfig,
        store: Arc<dyn AccountStore>,
        tokens: TokenGenerator,
    ) -> Self {
        Self {
            config,
            store,
            tokens,
        }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Validate `candidate`, persist it as a pending account and build its
    /// confirmation link. Never grants a session.
    pub fn register(&self, candidate: Candidate) -> Result<Registration, VerificationError> {
        let candidate = normalize(candidate);
        let mut errors = check_fields(&candidate);

        if !errors.has(Field::Email) && self.store.email_taken(&candidate.email)? {
            errors.push(ValidationError::AlreadyRegistered {
                field: Field::Email,
            });
        }
        if !errors.has(Field::Phone) && self.store.phone_taken(&candidate.phone)? {
            errors.push(ValidationError::AlreadyRegistered {
                field: Field::Phone,
            });
        }
        errors.into_result()?;

        let attempts = self.config.max_token_attempts;
        for _ in 0..attempts {
            let token = self.tokens.next_token();
            if self.store.token_pending(&token)? {
                continue;
            }

            let pending = NewAccount {
                name: candidate.name.clone(),
                email: candidate.email.clone(),
                phone: candidate.phone.clone(),
                password_hash: candidate.password_hash.clone(),
                verification_token: token.clone(),
            };

            match self.store.create(pending) {
                Ok(account) => {
                    tracing::info!(account_id = %account.id, "account registered, awaiting confirmation");
                    let confirmation_link = ConfirmationLink::build(
                        &self.config.link_base,
                        &self.config.bot_username,
                        &self.config.static_prefix,
                        &token,
                    );
                    return Ok(Registration {
                        account,
                        confirmation_link,
                    });
                }
                // Raced with another registration drawing the same token.
                Err(StoreError::Conflict {
                    field: UniqueField::VerificationToken,
                }) => continue,
                Err(StoreError::Conflict {
                    field: UniqueField::Email,
                }) => return Err(already_registered(Field::Email)),
                Err(StoreError::Conflict {
                    field: UniqueField::Phone,
                }) => return Err(already_registered(Field::Phone)),
                Err(error) => return Err(error.into()),
            }
        }

        tracing::error!(attempts, "verification token space exhausted");
        Err(VerificationError::TokenSpaceExhausted { attempts })
    }

    /// Read-only verification check; a verified account yields a grant on
    /// every call.
    pub fn poll(&self, account_id: AccountId) -> Result<PollOutcome, VerificationError> {
        let account = self
            .store
            .find(account_id)?
            .ok_or(VerificationError::NotFound { account_id })?;

        if !account.is_verified() {
            return Ok(PollOutcome::Pending);
        }

        Ok(PollOutcome::Verified {
            grant: SessionGrant {
                account_id: account.id,
                remember: true,
                redirect: self.config.redirect.clone(),
            },
        })
    }

    /// Apply a confirmation callback. Unknown, consumed or malformed tokens
    /// change nothing and report [`ConfirmOutcome::Ignored`].
    pub fn confirm(
        &self,
        callback: ConfirmationCallback,
    ) -> Result<ConfirmOutcome, VerificationError> {
        let Ok(token) = VerificationToken::parse(&callback.token) else {
            tracing::debug!(channel_id = %callback.channel_id, "ignoring malformed confirmation token");
            return Ok(ConfirmOutcome::Ignored);
        };

        match self.store.confirm(&token, &callback.channel_id)? {
            Some(account_id) => {
                tracing::info!(
                    %account_id,
                    channel_id = %callback.channel_id,
                    "account verified"
                );
                Ok(ConfirmOutcome::Verified { account_id })
            }
            None => {
                tracing::debug!(channel_id = %callback.channel_id, "confirmation matched no pending account");
                Ok(ConfirmOutcome::Ignored)
            }
        }
    }

    /// Confirm from a raw bot message such as `/start w48135207--w98429842`.
    pub fn confirm_start_message(
        &self,
        text: &str,
        channel_id: ExternalChannelId,
    ) -> Result<ConfirmOutcome, VerificationError> {
        let Some(token) = token_from_start_message(text) else {
            return Ok(ConfirmOutcome::Ignored);
        };
        self.confirm(ConfirmationCallback {
            token: token.to_string(),
            channel_id,
        })
    }
}

fn already_registered(field: Field) -> VerificationError {
    VerificationError::Invalid(ValidationError::AlreadyRegistered { field }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAccountStore;

    fn flow(store: Arc<MemoryAccountStore>) -> VerificationFlow {
        VerificationFlow::new(
            VerificationConfig::default(),
            store,
            TokenGenerator::with_seed(11),
        )
    }

    fn candidate(email: &str, phone: &str) -> Candidate {
        Candidate {
            name: "Ada".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password_hash: "$2y$hash".to_string(),
        }
    }

    #[test]
    fn duplicate_email_and_phone_are_field_errors() {
        let store = Arc::new(MemoryAccountStore::new());
        let flow = flow(store.clone());
        flow.register(candidate("a@x.com", "+15551234567"))
            .expect("first registration");

        let error = flow
            .register(candidate("a@x.com", "+15551234567"))
            .expect_err("duplicate");
        let VerificationError::Invalid(errors) = error else {
            panic!("expected validation errors, got {error:?}");
        };
        assert!(errors.errors().contains(&ValidationError::AlreadyRegistered {
            field: Field::Email
        }));
        assert!(errors.errors().contains(&ValidationError::AlreadyRegistered {
            field: Field::Phone
        }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn exhausted_token_space_is_reported() {
        let store = Arc::new(MemoryAccountStore::new());
        let seeded = VerificationFlow::new(
            VerificationConfig::default(),
            store.clone(),
            TokenGenerator::with_seed(5),
        );
        seeded
            .register(candidate("a@x.com", "+15551234567"))
            .expect("first registration");

        // Same seed: every draw the second flow makes is already pending.
        let replay = VerificationFlow::new(
            VerificationConfig {
                max_token_attempts: 1,
                ..VerificationConfig::default()
            },
            store,
            TokenGenerator::with_seed(5),
        );
        let error = replay
            .register(candidate("b@x.com", "+15557654321"))
            .expect_err("token collision");
        assert!(matches!(
            error,
            VerificationError::TokenSpaceExhausted { attempts: 1 }
        ));
    }

    #[test]
    fn malformed_callback_token_is_ignored() {
        let flow = flow(Arc::new(MemoryAccountStore::new()));
        let outcome = flow
            .confirm(ConfirmationCallback {
                token: "'; DROP TABLE accounts; --".to_string(),
                channel_id: ExternalChannelId::new("1"),
            })
            .expect("ignored");
        assert_eq!(outcome, ConfirmOutcome::Ignored);
    }

    #[test]
    fn start_message_confirms_pending_account() {
        let store = Arc::new(MemoryAccountStore::new());
        let flow = flow(store);
        let registration = flow
            .register(candidate("a@x.com", "+15551234567"))
            .expect("registered");
        let token = registration
            .account
            .verification_token
            .clone()
            .expect("pending token");

        let outcome = flow
            .confirm_start_message(
                &format!("/start {DEFAULT_STATIC_PREFIX}--{token}"),
                ExternalChannelId::new("777"),
            )
            .expect("confirmed");
        assert_eq!(
            outcome,
            ConfirmOutcome::Verified {
                account_id: registration.account.id
            }
        );

        let outcome = flow
            .poll(registration.account.id)
            .expect("known account");
        assert!(outcome.is_verified());
    }
}
