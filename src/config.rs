//! Admin-managed passcode settings and the JSON file that holds them.
//!
//! The record is mutated by exactly one code path (passcode activation) and
//! otherwise edited by hand or by external tooling, so loading is lenient
//! about field types and unknown fields are carried through on save.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};
use tokio::io::AsyncWriteExt;

use crate::clock::{self, Timestamp};

pub const DEFAULT_TTL_HOURS: u32 = 5;
pub const DEFAULT_PASSCODE_VERSION: i64 = 1;
/// One hundred years. Longer windows fall back to the default.
pub const MAX_TTL_HOURS: u32 = 24 * 365 * 100;

/// The persisted passcode configuration (`admin.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret. Empty means not configured.
    #[serde(
        rename = "user_passcode",
        default,
        deserialize_with = "de_passcode"
    )]
    pub stored_passcode: String,

    #[serde(default = "default_ttl_hours", deserialize_with = "de_ttl_hours")]
    pub ttl_hours: u32,

    /// Raw RFC 3339 strings. Kept unparsed so a damaged value can be told
    /// apart from an absent one.
    #[serde(default, deserialize_with = "de_timestamp")]
    pub first_used_at: Option<String>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub expires_at: Option<String>,

    #[serde(default = "default_true", deserialize_with = "de_locked")]
    pub locked_after_expire: bool,

    #[serde(
        default = "default_passcode_version",
        deserialize_with = "de_passcode_version"
    )]
    pub passcode_version: i64,

    /// Fields owned by other tooling.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stored_passcode: String::new(),
            ttl_hours: DEFAULT_TTL_HOURS,
            first_used_at: None,
            expires_at: None,
            locked_after_expire: true,
            passcode_version: DEFAULT_PASSCODE_VERSION,
            extra: serde_json::Map::new(),
        }
    }
}

impl Config {
    pub fn is_configured(&self) -> bool {
        !self.stored_passcode.is_empty()
    }

    /// Both activation timestamps are recorded.
    pub fn is_activated(&self) -> bool {
        self.first_used_at.is_some() && self.expires_at.is_some()
    }

    pub fn ttl(&self) -> Duration {
        Duration::hours(i64::from(self.ttl_hours))
    }

    /// A copy of this record with the window opened at `now`.
    ///
    /// Both timestamps are written together; `expires_at` is fixed here and
    /// never recomputed from a later `ttl_hours`. `None` if the window end
    /// is not representable.
    pub fn activated_at(&self, now: Timestamp) -> Option<Self> {
        let expires = now.checked_add_signed(self.ttl())?;
        Some(Self {
            first_used_at: Some(clock::format_timestamp(&now)),
            expires_at: Some(clock::format_timestamp(&expires)),
            ..self.clone()
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn default_ttl_hours() -> u32 {
    DEFAULT_TTL_HOURS
}

fn default_true() -> bool {
    true
}

fn default_passcode_version() -> i64 {
    DEFAULT_PASSCODE_VERSION
}

/// Accept numeric passcodes (`"user_passcode": 123456`) as their string form.
fn de_passcode<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Numbers and numeric strings are accepted; anything else, including zero
/// or more than `MAX_TTL_HOURS`, falls back to the default window.
fn de_ttl_hours<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let hours = match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|h| u32::try_from(h).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(hours
        .filter(|h| (1..=MAX_TTL_HOURS).contains(h))
        .unwrap_or(DEFAULT_TTL_HOURS))
}

/// `null` keeps the default (locked); otherwise `0`, `""` and `false` unlock.
fn de_locked<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => true,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn de_passcode_version<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let version = match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(version.unwrap_or(DEFAULT_PASSCODE_VERSION))
}

/// `null`, `""` and non-string values all mean "absent".
fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("configuration file {} not found", .0.display())]
    Missing(PathBuf),
    #[error("configuration file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration changed concurrently")]
    Conflict,
    #[error("timed out waiting for the configuration lock")]
    LockTimeout,
}

/// Durable home of the [`Config`] singleton.
///
/// Writers never overwrite blindly: `compare_and_swap` only replaces the
/// record if it still equals the snapshot the caller decided on.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Config, StoreError>> + Send;

    fn compare_and_swap(
        &self,
        expected: &Config,
        new: &Config,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// [`ConfigStore`] backed by a pretty-printed JSON file.
///
/// Writes go to `<file>.tmp` and are renamed into place, so readers see
/// either the old or the new record, never a partial one. The
/// read-compare-write cycle runs under an in-process lock whose acquisition
/// is bounded by `lock_timeout`.
pub struct JsonConfigStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
    lock_timeout: std::time::Duration,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: std::time::Duration) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Config, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(self.path.clone()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        // Strip UTF-8 BOM left behind by some editors.
        let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
        Config::from_json(text).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, config: &Config) -> Result<(), StoreError> {
        let json = config
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = tmp_path(&self.path);

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Cannot remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<Config, StoreError> {
        self.read().await
    }

    async fn compare_and_swap(&self, expected: &Config, new: &Config) -> Result<(), StoreError> {
        let _guard = tokio::time::timeout(self.lock_timeout, self.lock.lock())
            .await
            .map_err(|_| StoreError::LockTimeout)?;

        let current = self.read().await?;
        if current != *expected {
            return Err(StoreError::Conflict);
        }
        self.write(new).await
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
