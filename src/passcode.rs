//! Passcode validation and the one-way activation state machine.
//!
//! The validity window does not start when an administrator saves the
//! passcode. It starts on the first successful submission, which stamps
//! `first_used_at`/`expires_at` into the config exactly once. After that the
//! window only ever closes; reopening it takes an administrator clearing the
//! timestamps or changing the passcode.

use crate::{
    clock::{self, Timestamp},
    config::{Config, ConfigStore, StoreError},
};

/// Activation attempts before giving up on a contended config file.
const MAX_ATTEMPTS: usize = 3;

/// Where the passcode stands, derived from [`Config`] at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasscodeState {
    Unconfigured,
    /// Configured but never used.
    Inactive,
    Active,
    Expired,
    /// `expires_at` is present but cannot be parsed. Treated as closed.
    Corrupt,
}

impl PasscodeState {
    pub fn of(config: &Config, now: Timestamp) -> Self {
        if !config.is_configured() {
            return Self::Unconfigured;
        }
        let (Some(_), Some(expires_raw)) = (&config.first_used_at, &config.expires_at) else {
            return Self::Inactive;
        };
        match clock::parse_timestamp(expires_raw) {
            Ok(expires_at) if now <= expires_at => Self::Active,
            Ok(_) => Self::Expired,
            Err(_) => Self::Corrupt,
        }
    }
}

/// Why a submission was refused. `Display` is the short machine-facing
/// reason; [`LoginFailure::user_message`] is what the caller is shown.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("not configured")]
    NotConfigured,
    #[error("empty passcode")]
    EmptyPasscode,
    #[error("incorrect passcode")]
    Incorrect,
    #[error("expired, locked")]
    ExpiredLocked,
    #[error("expired")]
    Expired,
    #[error("corrupt state")]
    CorruptState,
    #[error("storage error")]
    Storage,
}

impl LoginFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "No passcode has been set up yet. Please contact the administrator."
            }
            Self::EmptyPasscode => "Please enter the passcode.",
            Self::Incorrect => "The passcode is incorrect.",
            Self::ExpiredLocked => {
                "The passcode has expired. Please ask the administrator to reset it."
            }
            Self::Expired => "The passcode has expired.",
            Self::CorruptState => {
                "The passcode state is damaged. Please ask the administrator to reset it."
            }
            Self::Storage => "The login could not be recorded. Please try again.",
        }
    }
}

/// Outcome of a pure validation pass, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// First use: persist this record, then admit.
    Activate(Config),
    /// Window already open; nothing to write.
    Admit,
}

/// Validate `candidate` against a config snapshot.
///
/// Only surrounding whitespace of the candidate is ignored; the comparison
/// is otherwise exact.
pub fn decide(candidate: &str, config: &Config, now: Timestamp) -> Result<Decision, LoginFailure> {
    let state = PasscodeState::of(config, now);
    if state == PasscodeState::Unconfigured {
        return Err(LoginFailure::NotConfigured);
    }

    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(LoginFailure::EmptyPasscode);
    }
    if candidate != config.stored_passcode {
        return Err(LoginFailure::Incorrect);
    }

    match state {
        PasscodeState::Unconfigured => Err(LoginFailure::NotConfigured),
        // A window end past the calendar's range cannot be recorded.
        PasscodeState::Inactive => config
            .activated_at(now)
            .map(Decision::Activate)
            .ok_or(LoginFailure::CorruptState),
        PasscodeState::Active => Ok(Decision::Admit),
        // An unlocked passcode is still not reopened by a matching resubmission.
        PasscodeState::Expired if config.locked_after_expire => {
            Err(LoginFailure::ExpiredLocked)
        }
        PasscodeState::Expired => Err(LoginFailure::Expired),
        PasscodeState::Corrupt => Err(LoginFailure::CorruptState),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginSuccess {
    /// This submission opened the window.
    pub activated: bool,
    /// The config as it stands after the submission.
    pub config: Config,
}

/// Validate a submission and, on first use, persist the activation.
///
/// `config` is the snapshot the request loaded. Activation is written with
/// compare-and-swap against that snapshot; if another writer got there
/// first, the fresh record is re-read and the decision made again, so the
/// loser of an activation race simply finds the window already open.
/// Nothing is reported as a success until the activation is durable.
pub async fn submit<S: ConfigStore>(
    store: &S,
    candidate: &str,
    config: Config,
    now: Timestamp,
) -> Result<LoginSuccess, LoginFailure> {
    let mut snapshot = config;

    for _ in 0..MAX_ATTEMPTS {
        let next = match decide(candidate, &snapshot, now)? {
            Decision::Admit => {
                return Ok(LoginSuccess {
                    activated: false,
                    config: snapshot,
                });
            }
            Decision::Activate(next) => next,
        };

        match store.compare_and_swap(&snapshot, &next).await {
            Ok(()) => {
                tracing::info!(
                    first_used_at = next.first_used_at.as_deref().unwrap_or_default(),
                    expires_at = next.expires_at.as_deref().unwrap_or_default(),
                    "Passcode activated"
                );
                return Ok(LoginSuccess {
                    activated: true,
                    config: next,
                });
            }
            Err(StoreError::Conflict) => {
                tracing::debug!("Config changed during activation, re-reading");
                snapshot = store.load().await.map_err(reload_failure)?;
            }
            Err(e) => {
                tracing::error!("Cannot persist passcode activation: {}", e);
                return Err(LoginFailure::Storage);
            }
        }
    }

    tracing::warn!("Giving up on passcode activation after {MAX_ATTEMPTS} conflicting writes");
    Err(LoginFailure::Storage)
}

fn reload_failure(e: StoreError) -> LoginFailure {
    tracing::error!("Cannot re-read config after conflict: {}", e);
    match e {
        StoreError::Missing(_) | StoreError::Malformed { .. } => LoginFailure::NotConfigured,
        _ => LoginFailure::Storage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    /// In-memory store with switchable failure modes.
    #[derive(Default)]
    struct MemoryStore {
        config: Mutex<Config>,
        fail_writes: bool,
        /// Written by a "concurrent" caller just before the next swap.
        interloper: Mutex<Option<Config>>,
        always_conflict: bool,
        writes: Mutex<usize>,
    }

    impl MemoryStore {
        fn with(config: Config) -> Self {
            Self {
                config: Mutex::new(config),
                ..Self::default()
            }
        }

        fn current(&self) -> Config {
            self.config.lock().unwrap().clone()
        }
    }

    impl ConfigStore for MemoryStore {
        async fn load(&self) -> Result<Config, StoreError> {
            Ok(self.current())
        }

        async fn compare_and_swap(&self, expected: &Config, new: &Config) -> Result<(), StoreError> {
            if let Some(other) = self.interloper.lock().unwrap().take() {
                *self.config.lock().unwrap() = other;
            }
            if self.always_conflict {
                return Err(StoreError::Conflict);
            }
            if self.fail_writes {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            let mut current = self.config.lock().unwrap();
            if *current != *expected {
                return Err(StoreError::Conflict);
            }
            *current = new.clone();
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn t0() -> Timestamp {
        clock::parse_timestamp("2025-03-01T09:00:00+08:00").unwrap()
    }

    fn fresh(locked: bool) -> Config {
        Config {
            stored_passcode: "abc123".into(),
            ttl_hours: 5,
            locked_after_expire: locked,
            passcode_version: 1,
            ..Config::default()
        }
    }

    async fn login(store: &MemoryStore, candidate: &str, now: Timestamp) -> Result<LoginSuccess, LoginFailure> {
        submit(store, candidate, store.current(), now).await
    }

    #[test]
    fn state_derivation() {
        let now = t0();
        assert_eq!(PasscodeState::of(&Config::default(), now), PasscodeState::Unconfigured);
        assert_eq!(PasscodeState::of(&fresh(true), now), PasscodeState::Inactive);

        let active = fresh(true).activated_at(now).unwrap();
        assert_eq!(
            PasscodeState::of(&active, now + Duration::hours(5)),
            PasscodeState::Active
        );
        assert_eq!(
            PasscodeState::of(&active, now + Duration::hours(5) + Duration::seconds(1)),
            PasscodeState::Expired
        );
    }

    #[test]
    fn half_recorded_activation_counts_as_inactive() {
        let config = Config {
            expires_at: Some("2025-03-01T14:00:00+08:00".into()),
            ..fresh(true)
        };
        assert_eq!(PasscodeState::of(&config, t0()), PasscodeState::Inactive);
    }

    #[tokio::test]
    async fn scenario_locked_lifecycle() {
        let store = MemoryStore::with(fresh(true));
        let t0 = t0();

        let first = login(&store, "abc123", t0).await.unwrap();
        assert!(first.activated);
        let stamped = store.current();
        assert_eq!(stamped.first_used_at.as_deref(), Some("2025-03-01T09:00:00+08:00"));
        assert_eq!(stamped.expires_at.as_deref(), Some("2025-03-01T14:00:00+08:00"));
        assert_eq!(first.config, stamped);

        let again = login(&store, "abc123", t0 + Duration::hours(1)).await.unwrap();
        assert!(!again.activated);
        assert_eq!(store.current(), stamped);

        assert_eq!(
            login(&store, "wrong", t0 + Duration::hours(2)).await,
            Err(LoginFailure::Incorrect)
        );
        assert_eq!(
            login(&store, "abc123", t0 + Duration::hours(6)).await,
            Err(LoginFailure::ExpiredLocked)
        );
        assert_eq!(store.current(), stamped);
    }

    #[tokio::test]
    async fn scenario_unlocked_expiry_does_not_reactivate() {
        let store = MemoryStore::with(fresh(false));
        let t0 = t0();
        login(&store, "abc123", t0).await.unwrap();
        let stamped = store.current();

        assert_eq!(
            login(&store, "abc123", t0 + Duration::hours(6)).await,
            Err(LoginFailure::Expired)
        );
        assert_eq!(store.current(), stamped);
    }

    #[tokio::test]
    async fn locked_expiry_fails_on_every_retry() {
        let store = MemoryStore::with(fresh(true));
        let t0 = t0();
        login(&store, "abc123", t0).await.unwrap();

        for minutes in [301, 302, 600, 60 * 24 * 30] {
            assert_eq!(
                login(&store, "abc123", t0 + Duration::minutes(minutes)).await,
                Err(LoginFailure::ExpiredLocked)
            );
        }
        assert_eq!(*store.writes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unconfigured_rejects_everything() {
        let store = MemoryStore::with(Config::default());
        for candidate in ["", "   ", "abc123", "anything"] {
            assert_eq!(
                login(&store, candidate, t0()).await,
                Err(LoginFailure::NotConfigured)
            );
        }
        assert_eq!(*store.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_and_whitespace_candidates() {
        let store = MemoryStore::with(fresh(true));
        assert_eq!(login(&store, "", t0()).await, Err(LoginFailure::EmptyPasscode));
        assert_eq!(login(&store, " \t\n", t0()).await, Err(LoginFailure::EmptyPasscode));
        assert!(!store.current().is_activated());
    }

    #[tokio::test]
    async fn candidate_is_trimmed_but_otherwise_exact() {
        let store = MemoryStore::with(fresh(true));
        assert_eq!(login(&store, "ABC123", t0()).await, Err(LoginFailure::Incorrect));
        assert_eq!(login(&store, "abc 123", t0()).await, Err(LoginFailure::Incorrect));
        assert!(login(&store, "  abc123\n", t0()).await.unwrap().activated);
    }

    #[tokio::test]
    async fn window_uses_ttl_at_activation_time() {
        let config = Config {
            ttl_hours: 48,
            ..fresh(true)
        };
        let store = MemoryStore::with(config);
        login(&store, "abc123", t0()).await.unwrap();

        let mut changed = store.current();
        changed.ttl_hours = 1;
        *store.config.lock().unwrap() = changed;

        // Still open: the recorded expiry, not the new ttl, decides.
        let later = login(&store, "abc123", t0() + Duration::hours(47)).await.unwrap();
        assert!(!later.activated);
        assert_eq!(store.current().expires_at.as_deref(), Some("2025-03-03T09:00:00+08:00"));
    }

    #[tokio::test]
    async fn unrepresentable_window_is_refused_without_writing() {
        let config = Config {
            ttl_hours: u32::MAX,
            ..fresh(true)
        };
        let store = MemoryStore::with(config.clone());
        assert_eq!(login(&store, "abc123", t0()).await, Err(LoginFailure::CorruptState));
        assert_eq!(store.current(), config);
        assert_eq!(*store.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_expiry_fails_closed() {
        let config = Config {
            first_used_at: Some("2025-03-01T09:00:00+08:00".into()),
            expires_at: Some("tomorrow-ish".into()),
            ..fresh(false)
        };
        let store = MemoryStore::with(config.clone());
        assert_eq!(login(&store, "abc123", t0()).await, Err(LoginFailure::CorruptState));
        assert_eq!(store.current(), config);
    }

    #[tokio::test]
    async fn wrong_passcode_beats_corrupt_state() {
        let config = Config {
            first_used_at: Some("x".into()),
            expires_at: Some("y".into()),
            ..fresh(true)
        };
        let store = MemoryStore::with(config);
        assert_eq!(login(&store, "nope", t0()).await, Err(LoginFailure::Incorrect));
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_login() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::with(fresh(true))
        };
        assert_eq!(login(&store, "abc123", t0()).await, Err(LoginFailure::Storage));
        assert!(!store.current().is_activated());
    }

    #[tokio::test]
    async fn losing_an_activation_race_admits_without_reactivating() {
        let store = MemoryStore::with(fresh(true));
        let winner = fresh(true).activated_at(t0()).unwrap();
        *store.interloper.lock().unwrap() = Some(winner.clone());

        let outcome = login(&store, "abc123", t0() + Duration::seconds(2)).await.unwrap();
        assert!(!outcome.activated);
        assert_eq!(outcome.config, winner);
        assert_eq!(store.current(), winner);
    }

    #[tokio::test]
    async fn reset_during_login_is_respected() {
        let store = MemoryStore::with(fresh(true));
        let reset = Config {
            stored_passcode: "new-secret".into(),
            passcode_version: 2,
            ..fresh(true)
        };
        *store.interloper.lock().unwrap() = Some(reset.clone());

        assert_eq!(login(&store, "abc123", t0()).await, Err(LoginFailure::Incorrect));
        assert_eq!(store.current(), reset);
    }

    #[tokio::test]
    async fn endless_contention_surfaces_as_storage_error() {
        let store = MemoryStore {
            always_conflict: true,
            ..MemoryStore::with(fresh(true))
        };
        assert_eq!(login(&store, "abc123", t0()).await, Err(LoginFailure::Storage));
    }

    #[test]
    fn failure_reasons() {
        assert_eq!(LoginFailure::NotConfigured.to_string(), "not configured");
        assert_eq!(LoginFailure::ExpiredLocked.to_string(), "expired, locked");
        assert_eq!(LoginFailure::CorruptState.to_string(), "corrupt state");
        assert_eq!(LoginFailure::Storage.to_string(), "storage error");
        assert!(LoginFailure::ExpiredLocked.user_message().contains("administrator"));
    }
}
