//! Syncable metadata fields and their values
//!
//! A [`SyncField`] names one piece of user metadata that both MVidarr and a
//! media server track for the same video (play count, rating, ...). The
//! [`FieldValue`] enum carries the value of such a field in a form that can
//! be compared across systems.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Absolute difference below which two numeric values are considered equal
pub const NUMERIC_TOLERANCE: f64 = 0.01;

/// A metadata field subject to bidirectional conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncField {
    PlayCount,
    LastPlayed,
    Rating,
    Favorite,
    WatchedStatus,
    Tags,
    Notes,
}

impl SyncField {
    /// Every syncable field, in the order they are walked during a diff
    pub const ALL: [SyncField; 7] = [
        SyncField::PlayCount,
        SyncField::LastPlayed,
        SyncField::Rating,
        SyncField::Favorite,
        SyncField::WatchedStatus,
        SyncField::Tags,
        SyncField::Notes,
    ];

    /// Returns the snake_case name used in configuration and storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncField::PlayCount => "play_count",
            SyncField::LastPlayed => "last_played",
            SyncField::Rating => "rating",
            SyncField::Favorite => "favorite",
            SyncField::WatchedStatus => "watched_status",
            SyncField::Tags => "tags",
            SyncField::Notes => "notes",
        }
    }

    /// Whether the field is synchronized when configuration does not say
    ///
    /// Tags and notes are free-form and off unless explicitly enabled.
    #[must_use]
    pub const fn enabled_by_default(&self) -> bool {
        !matches!(self, SyncField::Tags | SyncField::Notes)
    }
}

impl Display for SyncField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| DomainError::UnknownField(s.to_string()))
    }
}

/// The value of a [`SyncField`] on one side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Count(u64),
    Timestamp(DateTime<Utc>),
    Rating(f64),
    Flag(bool),
    Tags(Vec<String>),
    Text(String),
}

impl FieldValue {
    /// Short name of the value kind, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            FieldValue::Count(_) => "count",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Rating(_) => "rating",
            FieldValue::Flag(_) => "flag",
            FieldValue::Tags(_) => "tags",
            FieldValue::Text(_) => "text",
        }
    }

    /// Returns true when the two values should be treated as different
    ///
    /// Numeric values differ only beyond [`NUMERIC_TOLERANCE`]; everything
    /// else uses strict inequality. Values of different kinds always differ.
    #[must_use]
    pub fn differs_from(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Count(a), FieldValue::Count(b)) => {
                (*a as f64 - *b as f64).abs() > NUMERIC_TOLERANCE
            }
            (FieldValue::Rating(a), FieldValue::Rating(b)) => (a - b).abs() > NUMERIC_TOLERANCE,
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a != b,
            (FieldValue::Flag(a), FieldValue::Flag(b)) => a != b,
            (FieldValue::Tags(a), FieldValue::Tags(b)) => a != b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a != b,
            _ => true,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Rating(r) => write!(f, "{r:.1}"),
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Tags(tags) => write!(f, "[{}]", tags.join(", ")),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}
