//! # Domain Models
//!
//! Strongly-typed values shared by the catalog cache and the verification
//! flow. Identifiers and tokens validate their shape at construction, so a
//! `VerificationToken` in hand is always `w` plus eight digits and an
//! `AccountId` is always positive.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Account`] | Stored account with verification state |
//! | [`Candidate`] | Registration input |
//! | [`AccountId`] | Store-assigned identifier |
//! | [`VerificationToken`] | Single-use correlation token |
//! | [`ExternalChannelId`] | Messaging channel identity of the confirming user |
//! | [`UtcDateTime`] | UTC timestamp |

mod account;
mod timestamp;

pub use account::{
    Account, AccountId, Candidate, ExternalChannelId, NewAccount, VerificationToken,
};
pub use timestamp::UtcDateTime;
