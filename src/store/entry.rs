//! Stored Entry Module
//!
//! A raw value held by the in-memory store, with optional expiry.

use chrono::{DateTime, Duration, Utc};

// == Stored Entry ==
/// A single stored value with metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored tagged string
    pub value: String,
    /// None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry, expiring `ttl_seconds` from now when set.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        Self {
            value,
            expires_at: ttl_seconds.map(|ttl| expiry_from(Utc::now(), ttl)),
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }

    // == Touch ==
    /// Pushes the expiry out to `ttl_seconds` from now, if that is later.
    ///
    /// Entries without an expiry count as living forever and are unchanged.
    /// Returns whether the expiry moved.
    pub fn extend_expiry(&mut self, ttl_seconds: u64) -> bool {
        let candidate = expiry_from(Utc::now(), ttl_seconds);
        match self.expires_at {
            Some(current) if candidate > current => {
                self.expires_at = Some(candidate);
                true
            }
            _ => false,
        }
    }

    /// Remaining lifetime in milliseconds, `None` if the entry never expires.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let remaining = expires - Utc::now();
            remaining.num_milliseconds().max(0) as u64
        })
    }
}

fn expiry_from(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
