//! wvp-schemas
//!
//! Shared data shapes for the wave ledger client.
//!
//! - [`RawEntry`] is the shape handed to us by the ledger collaborator, from
//!   both the full fetch and the live feed. Every field is optional because the
//!   collaborator is not trusted to fill them.
//! - [`Entry`] is the single canonical representation used everywhere past the
//!   boundary. Both input channels go through [`Entry::from_raw`] before any
//!   merge, so fetch results and pushed events compare equal when they describe
//!   the same wave.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text shown in place of an empty message.
pub const BLANK_MESSAGE: &str = "<blank message>";

// ---------------------------------------------------------------------------
// RawEntry
// ---------------------------------------------------------------------------

/// One logged wave exactly as the ledger collaborator returned it.
///
/// `timestamp` is Unix seconds. Field aliases cover the names used by the
/// contract read call (`waver`) and the event payload (`from`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, alias = "waver", alias = "from", alias = "address")]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RawEntry {
    pub fn new(author: impl Into<String>, timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            timestamp: Some(timestamp),
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A normalized, immutable wave.
///
/// Equality and hashing cover all three fields: the ledger has no entry id,
/// so `(author, timestamp, message)` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entry {
    author: String,
    timestamp: i64,
    message: String,
}

impl Entry {
    /// Build an entry from already-trusted parts (tests, fixtures).
    pub fn new(author: impl Into<String>, timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            timestamp,
            message: message.into(),
        }
    }

    /// Normalize a collaborator entry.
    ///
    /// The author is trimmed; the message is kept verbatim (an empty message is
    /// legal if the producer allowed it). Negative timestamps cannot be Unix
    /// seconds for a ledger write and are rejected.
    pub fn from_raw(raw: RawEntry) -> Result<Self, MalformedEntry> {
        let author = raw.author.ok_or(MalformedEntry::MissingField("author"))?;
        let author = author.trim();
        if author.is_empty() {
            return Err(MalformedEntry::EmptyAuthor);
        }
        let timestamp = raw
            .timestamp
            .ok_or(MalformedEntry::MissingField("timestamp"))?;
        if timestamp < 0 {
            return Err(MalformedEntry::NegativeTimestamp(timestamp));
        }
        let message = raw.message.ok_or(MalformedEntry::MissingField("message"))?;

        Ok(Self {
            author: author.to_string(),
            timestamp,
            message,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Unix seconds. This is the ordering key.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Wall-clock time of the wave. `None` only for timestamps chrono cannot
    /// represent.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// The message, or [`BLANK_MESSAGE`] when it is empty.
    pub fn display_message(&self) -> &str {
        if self.message.is_empty() {
            BLANK_MESSAGE
        } else {
            &self.message
        }
    }
}

impl TryFrom<RawEntry> for Entry {
    type Error = MalformedEntry;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        Entry::from_raw(raw)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time() {
            Some(t) => write!(
                f,
                "{} {} {}",
                t.to_rfc3339(),
                self.author,
                self.display_message()
            ),
            None => write!(
                f,
                "@{} {} {}",
                self.timestamp,
                self.author,
                self.display_message()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// MalformedEntry
// ---------------------------------------------------------------------------

/// An entry from fetch or feed that cannot be normalized. Always recoverable:
/// the entry is dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEntry {
    MissingField(&'static str),
    EmptyAuthor,
    NegativeTimestamp(i64),
}

impl fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedEntry::MissingField(field) => write!(f, "missing field '{field}'"),
            MalformedEntry::EmptyAuthor => write!(f, "author is empty"),
            MalformedEntry::NegativeTimestamp(ts) => {
                write!(f, "timestamp {ts} is not a unix second count")
            }
        }
    }
}

impl std::error::Error for MalformedEntry {}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The account address of an established session. Opaque to this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
