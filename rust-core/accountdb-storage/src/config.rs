// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Store configuration.
//
// Defaults match the historical deployment: `account.db`, bucket
// `accountbucket`, the bucket wiped on every start, one second to get the
// write lock. Each field can be overridden from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`StoreConfig::path`].
pub const ENV_PATH: &str = "ACCOUNTDB_PATH";
/// Environment variable overriding [`StoreConfig::bucket`].
pub const ENV_BUCKET: &str = "ACCOUNTDB_BUCKET";
/// Environment variable overriding [`StoreConfig::startup`] (`reset` or `preserve`).
pub const ENV_STARTUP: &str = "ACCOUNTDB_STARTUP";
/// Environment variable overriding [`StoreConfig::lock_timeout`], in milliseconds.
pub const ENV_LOCK_TIMEOUT_MS: &str = "ACCOUNTDB_LOCK_TIMEOUT_MS";

/// What happens to an existing bucket when the store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupPolicy {
    /// Drop the bucket and recreate it empty.
    #[default]
    Reset,
    /// Keep the bucket and its records; create it only if missing.
    Preserve,
}

impl FromStr for StartupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(StartupPolicy::Reset),
            "preserve" => Ok(StartupPolicy::Preserve),
            other => Err(format!("unknown startup policy '{other}' (expected reset|preserve)")),
        }
    }
}

/// Configuration for [`crate::store::RecordStore::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file.
    pub path: PathBuf,
    /// Name of the bucket (redb table) holding the records.
    pub bucket: String,
    /// Bucket handling at open.
    pub startup: StartupPolicy,
    /// Upper bound on waiting for the write lock.
    #[serde(with = "duration_ms")]
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("account.db"),
            bucket: "accountbucket".to_string(),
            startup: StartupPolicy::Reset,
            lock_timeout: Duration::from_secs(1),
        }
    }
}

impl StoreConfig {
    /// Config for a database file at `path`, everything else default.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the startup policy.
    pub fn with_startup(mut self, startup: StartupPolicy) -> Self {
        self.startup = startup;
        self
    }

    /// Set the bucket name.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the write lock timeout.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Defaults, overridden by `ACCOUNTDB_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_PATH).filter(|v| !v.is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(bucket) = lookup(ENV_BUCKET).filter(|v| !v.is_empty()) {
            config.bucket = bucket;
        }
        if let Some(raw) = lookup(ENV_STARTUP) {
            match raw.parse() {
                Ok(policy) => config.startup = policy,
                Err(err) => warn!(var = ENV_STARTUP, %err, "ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.lock_timeout = Duration::from_millis(ms),
                Err(err) => warn!(var = ENV_LOCK_TIMEOUT_MS, value = %raw, %err, "ignoring invalid value"),
            }
        }

        config
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
