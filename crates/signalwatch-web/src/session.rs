//! In-process session table fed by verification grants.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use signalwatch_core::{AccountId, SessionGrant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "signalwatch_session";

/// Lifetime of a remembered session cookie.
const REMEMBER_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: AccountId,
    pub remember: bool,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    expires_at: Instant,
}

/// Sessions expire together with their cookie. Expired entries are dropped
/// whenever a new session is issued, so the table holds at most the sessions
/// opened within one lifetime.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(REMEMBER_MAX_AGE_SECS))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Open a session for `grant` and return its id. Every call opens a new
    /// session; repeated polls each get their own until they expire.
    pub fn issue(&self, grant: &SessionGrant) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Instant::now();
        let entry = Entry {
            session: Session {
                account_id: grant.account_id,
                remember: grant.remember,
            },
            expires_at: now + self.ttl,
        };
        let mut sessions = match self.sessions.write() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(id.clone(), entry);
        id
    }

    /// Live session behind `id`.
    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = match self.sessions.read() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .get(id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.session.clone())
    }

    pub fn len(&self) -> usize {
        match self.sessions.read() {
            Ok(sessions) => sessions.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Set-Cookie` value for session `id`.
pub fn session_cookie(id: &str, remember: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if remember {
        cookie.push_str(&format!("; Max-Age={REMEMBER_MAX_AGE_SECS}"));
    }
    cookie
}
