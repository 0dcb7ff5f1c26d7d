use std::sync::Mutex;

use crate::VerificationToken;

const TOKEN_MIN: u32 = 10_000_000;
const TOKEN_MAX: u32 = 99_999_999;

/// Random source for verification tokens.
///
/// Not cryptographic: it only has to keep pending tokens hard to guess in the
/// window between registration and confirmation.
#[derive(Debug)]
pub struct TokenGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Reproducible sequence for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    pub fn next_token(&self) -> VerificationToken {
        let number = match self.rng.lock() {
            Ok(mut rng) => rng.u32(TOKEN_MIN..=TOKEN_MAX),
            Err(poisoned) => poisoned.into_inner().u32(TOKEN_MIN..=TOKEN_MAX),
        };
        VerificationToken::from_number(number)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}
