//! # Filter Module
//!
//! Equality filters over the attribution fields of recorded clicks.

use crate::links::LinkBuilder;
use crate::{Attribution, Click};
use serde::{Deserialize, Serialize};

pub const CAMPAIGN: &str = "campaign";
pub const SOURCE: &str = "source";
pub const MEDIUM: &str = "medium";

/// Filter keys in the order they appear in query strings.
pub const FILTER_KEYS: [&str; 3] = [CAMPAIGN, MEDIUM, SOURCE];

/// A click filter. Empty fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickFilter {
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub medium: String,
}

impl ClickFilter {
    /// Filter that matches every click.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// True when no field constrains the result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaign.is_empty() && self.source.is_empty() && self.medium.is_empty()
    }

    /// Value of the filter named `key`, if the key is known.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            CAMPAIGN => Some(&self.campaign),
            SOURCE => Some(&self.source),
            MEDIUM => Some(&self.medium),
            _ => None,
        }
    }

    /// Copy of this filter with `key` set. Unknown keys are ignored.
    #[must_use]
    pub fn with(&self, key: &str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        if let Some(slot) = next.slot_mut(key) {
            *slot = value.into();
        }
        next
    }

    /// Copy of this filter with `key` cleared. Unknown keys are ignored.
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        self.with(key, String::new())
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            CAMPAIGN => Some(&mut self.campaign),
            SOURCE => Some(&mut self.source),
            MEDIUM => Some(&mut self.medium),
            _ => None,
        }
    }

    /// Whether an attribution passes every non-empty field of the filter.
    #[must_use]
    pub fn matches(&self, attribution: &Attribution) -> bool {
        (self.campaign.is_empty() || self.campaign == attribution.campaign)
            && (self.source.is_empty() || self.source == attribution.source)
            && (self.medium.is_empty() || self.medium == attribution.medium)
    }

    /// Whether a click passes the filter.
    #[must_use]
    pub fn matches_click(&self, click: &Click) -> bool {
        self.matches(&click.attribution)
    }

    /// Active (non-empty) filters in query-string order.
    pub fn active(&self) -> impl Iterator<Item = (&'static str, &str)> {
        FILTER_KEYS
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .filter(|(_, value)| !value.is_empty())
    }

    /// Link builder for `path` carrying the active filters.
    #[must_use]
    pub fn links(&self, path: impl Into<String>) -> LinkBuilder {
        LinkBuilder::new(path).with_params(self.active())
    }
}

impl From<Attribution> for ClickFilter {
    fn from(attribution: Attribution) -> Self {
        Self {
            campaign: attribution.campaign,
            source: attribution.source,
            medium: attribution.medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ClickFilter::none();
        assert!(filter.is_empty());
        assert!(filter.matches(&Attribution::default()));
        assert!(filter.matches(&Attribution::new("a", "b", "c")));
    }

    #[test]
    fn every_set_field_must_match() {
        let filter = ClickFilter::none().with(CAMPAIGN, "launch").with(MEDIUM, "email");
        assert!(filter.matches(&Attribution::new("launch", "newsletter", "email")));
        assert!(!filter.matches(&Attribution::new("launch", "newsletter", "social")));
        assert!(!filter.matches(&Attribution::new("", "", "email")));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let filter = ClickFilter::none().with("referrer", "x");
        assert!(filter.is_empty());
        assert_eq!(filter.get("referrer"), None);
    }

    #[test]
    fn without_clears_a_field() {
        let filter = ClickFilter::none().with(SOURCE, "twitter").without(SOURCE);
        assert!(filter.is_empty());
    }

    #[test]
    fn active_lists_set_fields_in_key_order() {
        let filter = ClickFilter::none().with(SOURCE, "twitter").with(CAMPAIGN, "launch");
        let active: Vec<_> = filter.active().collect();
        assert_eq!(active, vec![(CAMPAIGN, "launch"), (SOURCE, "twitter")]);
    }

    #[test]
    fn links_carry_active_filters() {
        let filter = ClickFilter::none().with(MEDIUM, "qr code");
        let links = filter.links("/trackers/7/clicks");
        assert_eq!(links.url(), "/trackers/7/clicks?medium=qr+code");
        assert_eq!(links.without(MEDIUM), "/trackers/7/clicks?");
    }
}
