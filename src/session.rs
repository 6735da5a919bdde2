//! Per-caller session state and the check that decides whether a session
//! still grants access to the protected list.

use axum::http::{HeaderMap, header};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::{
    clock::{self, Remaining, Timestamp},
    config::Config,
};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "pg_session";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub authenticated: bool,
    /// `Config::passcode_version` at the moment authentication succeeded.
    pub passcode_version_at_login: i64,
    pub login_time: Option<Timestamp>,
}

impl Session {
    /// The session written after a successful passcode submission.
    pub fn authenticated(config: &Config, now: Timestamp) -> Self {
        Self {
            authenticated: true,
            passcode_version_at_login: config.passcode_version,
            login_time: Some(now),
        }
    }
}

/// Whether `session` is currently allowed to see the protected list.
///
/// The activation window is deliberately not re-checked here: a session
/// granted while the window was open stays valid for the life of the
/// session. Only a passcode version bump or the session store's own
/// expiry ends it.
pub fn is_authorized(session: &Session, config: &Config) -> bool {
    session.authenticated && session.passcode_version_at_login == config.passcode_version
}

/// Time left in the activation window, or `None` if the passcode was never
/// activated, the window has closed, or the recorded expiry is unreadable.
pub fn remaining_window(config: &Config, now: Timestamp) -> Option<Remaining> {
    let expires_at = clock::parse_timestamp(config.expires_at.as_deref()?).ok()?;
    (now <= expires_at).then(|| Remaining::new(expires_at - now))
}

// ── Store ─────────────────────────────────────────────────────────────────────

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// In-memory sessions keyed by cookie token, with a sliding idle lifetime.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live session and slide its expiry. Expired entries are
    /// removed and reported as absent.
    pub async fn get(&self, token: &str) -> Option<Session> {
        // One write lock for both the check and the slide so a concurrent
        // removal cannot land in between.
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(token)?;
        if entry.last_seen.elapsed() < self.ttl {
            entry.last_seen = Instant::now();
            Some(entry.session.clone())
        } else {
            entries.remove(token);
            None
        }
    }

    pub async fn set(&self, token: &str, session: Session) {
        self.entries.write().await.insert(
            token.to_string(),
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
    }

    pub async fn remove(&self, token: &str) {
        self.entries.write().await.remove(token);
    }

    /// Drop every session idle for longer than the lifetime. Returns how
    /// many were removed.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.last_seen.elapsed() < self.ttl);
        before - entries.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

// ── Cookies ───────────────────────────────────────────────────────────────────

pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(str::trim)
        .find_map(|part| part.strip_prefix(&prefix))
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

pub fn new_session_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
