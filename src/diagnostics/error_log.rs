//! # Error Log Store
//!
//! Bounded, throttled, append-only log of failed requests for diagnostics.
//! Recording is best-effort and synchronous under one lock, so it can never
//! slow down or break the primary call path, and insert/evict/throttle-check
//! stay atomic even under re-entrant use.
//!
//! Throttling keys failures by `(source, method, path, status, error)`.
//! Rate-limit-flavored failures are the dominant noise in practice and get a
//! much longer suppression window than ordinary ones. A separate single-slot
//! "most recent error" value is overwritten on every record, suppressed or
//! not, so a UI can always show the latest failure.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::transport::ErrorSource;

/// Maximum retained log entries
pub const MAX_LOG_ENTRIES: usize = 20;

/// Maximum tracked throttle keys
pub const MAX_THROTTLE_KEYS: usize = 200;

const ORDINARY_THROTTLE_WINDOW: Duration = Duration::from_secs(10);
const RATE_LIMIT_THROTTLE_WINDOW: Duration = Duration::from_secs(300);

/// One recorded failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// Unique identifier for this entry
    pub id: String,

    /// Unix timestamp (seconds) when the failure was recorded
    pub at: u64,

    /// HTTP method of the failed call
    pub method: String,

    /// Request path of the failed call
    pub path: String,

    /// Server-reported status; absent for transport-level faults
    pub status: Option<u16>,

    /// Human-readable failure detail
    pub error: Option<String>,

    /// Which transport produced the failure
    pub source: ErrorSource,
}

impl ErrorLogEntry {
    pub fn new(
        source: ErrorSource,
        method: impl Into<String>,
        path: impl Into<String>,
        status: Option<u16>,
        error: Option<String>,
    ) -> Self {
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            id: Uuid::new_v4().to_string(),
            at,
            method: method.into(),
            path: path.into(),
            status,
            error,
            source,
        }
    }

    fn throttle_key(&self) -> ThrottleKey {
        ThrottleKey {
            source: self.source,
            method: self.method.clone(),
            path: self.path.clone(),
            status: self.status,
            error: self.error.clone().unwrap_or_default(),
        }
    }

    /// Whether this failure looks like rate limiting (HTTP 429 or
    /// rate-limit wording in the error text)
    fn is_rate_limit_flavored(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }
        self.error.as_deref().map_or(false, |text| {
            let text = text.to_ascii_lowercase();
            text.contains("rate limit") || text.contains("too many requests")
        })
    }
}

/// Failure signature used for suppression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThrottleKey {
    source: ErrorSource,
    method: String,
    path: String,
    status: Option<u16>,
    error: String,
}

struct LogInner {
    entries: VecDeque<ErrorLogEntry>,
    last_error: Option<ErrorLogEntry>,
    throttle: HashMap<ThrottleKey, Instant>,
}

/// Bounded, throttled store of failed requests
pub struct ErrorLogStore {
    inner: Mutex<LogInner>,
    max_entries: usize,
    max_throttle_keys: usize,
    ordinary_window: Duration,
    rate_limit_window: Duration,
}

impl Default for ErrorLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorLogStore {
    pub fn new() -> Self {
        Self::with_limits(
            MAX_LOG_ENTRIES,
            MAX_THROTTLE_KEYS,
            ORDINARY_THROTTLE_WINDOW,
            RATE_LIMIT_THROTTLE_WINDOW,
        )
    }

    /// Store with explicit bounds and windows
    pub fn with_limits(
        max_entries: usize,
        max_throttle_keys: usize,
        ordinary_window: Duration,
        rate_limit_window: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                last_error: None,
                throttle: HashMap::new(),
            }),
            max_entries,
            max_throttle_keys,
            ordinary_window,
            rate_limit_window,
        }
    }

    /// Record one failure, suppressing repeats of the same signature within
    /// its throttle window
    pub fn record(&self, entry: ErrorLogEntry) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        // the "most recent error" slot ignores throttling entirely
        inner.last_error = Some(entry.clone());

        let key = entry.throttle_key();
        let window = if entry.is_rate_limit_flavored() {
            self.rate_limit_window
        } else {
            self.ordinary_window
        };

        if let Some(last_seen) = inner.throttle.get(&key) {
            if now.duration_since(*last_seen) < window {
                debug!(
                    method = %entry.method,
                    path = %entry.path,
                    status = ?entry.status,
                    "duplicate failure suppressed"
                );
                return;
            }
        }

        if !inner.throttle.contains_key(&key) && inner.throttle.len() >= self.max_throttle_keys {
            let oldest = inner
                .throttle
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.throttle.remove(&oldest);
            }
        }
        inner.throttle.insert(key, now);

        if inner.entries.len() >= self.max_entries {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    /// Retained entries, newest first
    pub fn recent(&self) -> Vec<ErrorLogEntry> {
        self.inner.lock().entries.iter().rev().cloned().collect()
    }

    /// The most recent failure, independent of throttling
    pub fn last_error(&self) -> Option<ErrorLogEntry> {
        self.inner.lock().last_error.clone()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Number of tracked throttle keys
    pub fn throttle_size(&self) -> usize {
        self.inner.lock().throttle.len()
    }

    /// Drop all entries, the last-error slot and the throttle state
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.last_error = None;
        inner.throttle.clear();
    }
}
