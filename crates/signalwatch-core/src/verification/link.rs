use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::VerificationToken;

/// Separator between the static segment and the token in a start payload.
pub const PAYLOAD_SEPARATOR: &str = "--";

/// Deep link that opens the bot with a start payload of
/// `<static prefix>--<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfirmationLink(String);

impl ConfirmationLink {
    pub fn build(
        base_url: &str,
        bot_username: &str,
        static_prefix: &str,
        token: &VerificationToken,
    ) -> Self {
        Self(format!(
            "{}/{}?start={}",
            base_url.trim_end_matches('/'),
            bot_username.trim_start_matches('@'),
            start_payload(static_prefix, token)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConfirmationLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn start_payload(static_prefix: &str, token: &VerificationToken) -> String {
    format!("{static_prefix}{PAYLOAD_SEPARATOR}{token}")
}

/// Token candidate carried by a `/start <payload>` bot message.
///
/// The static prefix is ignored: the token is whatever follows the last
/// separator, or the whole payload when there is none. Returns `None` for
/// messages that are not `/start` or have no payload.
pub fn token_from_start_message(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix("/start")?;
    // "/start@botname payload" is how groups address a specific bot.
    let rest = match rest.strip_prefix('@') {
        Some(addressed) => addressed.split_once(' ').map_or("", |(_, payload)| payload),
        None => rest,
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let payload = rest.trim();
    if payload.is_empty() {
        return None;
    }

    let token = payload
        .rsplit_once(PAYLOAD_SEPARATOR)
        .map_or(payload, |(_, token)| token);
    (!token.is_empty()).then_some(token)
}
