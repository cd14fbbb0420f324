//! Domain types: trackers, clicks, sign-ups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracker. Allocated sequentially starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackerId(pub u64);

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrackerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A short link pointing at a destination URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: TrackerId,
    /// Destination of the redirect.
    pub url: String,
    /// Number of recorded clicks.
    pub count: u64,
    /// Owner of the tracker.
    pub user: String,
}

/// Campaign attribution carried on a tracker link.
///
/// Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub medium: String,
}

impl Attribution {
    /// Create an attribution from its three fields.
    #[must_use]
    pub fn new(
        campaign: impl Into<String>,
        source: impl Into<String>,
        medium: impl Into<String>,
    ) -> Self {
        Self {
            campaign: campaign.into(),
            source: source.into(),
            medium: medium.into(),
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaign.is_empty() && self.source.is_empty() && self.medium.is_empty()
    }
}

/// A recorded visit to a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Click {
    pub remote_addr: String,
    pub user_agent: String,
    pub attribution: Attribution,
    /// Unix timestamp in seconds.
    pub date: i64,
}

/// A captured email sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUp {
    pub email_addr: String,
    pub remote_addr: String,
    pub user_agent: String,
    /// Unix timestamp in seconds.
    pub date: i64,
}
