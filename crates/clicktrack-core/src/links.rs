//! # Links Module
//!
//! URL builders for trackers and paged listings.
//!
//! Query strings are form-urlencoded with keys in sorted order, so the same
//! parameters always produce the same URL.

use crate::{Attribution, Error, Result, Tracker};
use std::collections::BTreeMap;
use url::Url;
use url::form_urlencoded::Serializer;

/// Host of the chart service that renders QR codes.
pub const QR_CHART_URL: &str = "//chart.apis.google.com/chart";

/// Side length of the rendered QR code.
pub const QR_SIZE: &str = "300x300";

/// Query parameter selecting the page number.
pub const PAGE_PARAM: &str = "page";

/// Encode key/value pairs as a form-urlencoded query string.
///
/// Pairs are encoded in iteration order.
pub fn encode_query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

/// Check that `raw` is an absolute `http` or `https` URL.
///
/// Returns the URL in normalized form.
pub fn validate_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed.into()),
        scheme => Err(Error::InvalidUrl(format!(
            "{raw}: unsupported scheme or missing host ({scheme})"
        ))),
    }
}

// =============================================================================
// LINK BUILDER
// =============================================================================

/// Builds URLs for a listing path plus a sorted set of query parameters.
///
/// Used for page navigation and filter links on paged views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBuilder {
    path: String,
    params: BTreeMap<String, String>,
}

impl LinkBuilder {
    /// Create a builder for `path` with no parameters.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add parameters, skipping empty values.
    #[must_use]
    pub fn with_params<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let value = value.as_ref();
            if !value.is_empty() {
                self.params.insert(key.as_ref().to_string(), value.to_string());
            }
        }
        self
    }

    /// URL of the listing with the current parameters.
    #[must_use]
    pub fn url(&self) -> String {
        let query = encode_query(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        format!("{}?{}", self.path, query)
    }

    /// URL with `key` set to `value`. An empty value drops `key` instead.
    #[must_use]
    pub fn with(&self, key: &str, value: &str) -> String {
        let mut next = self.clone();
        if value.is_empty() {
            next.params.remove(key);
        } else {
            next.params.insert(key.to_string(), value.to_string());
        }
        next.url()
    }

    /// URL with `key` removed.
    #[must_use]
    pub fn without(&self, key: &str) -> String {
        let mut next = self.clone();
        next.params.remove(key);
        next.url()
    }

    /// URL of a given 1-based page.
    #[must_use]
    pub fn page_url(&self, page: usize) -> String {
        self.with(PAGE_PARAM, &page.to_string())
    }

    /// The listing path without a query.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

// =============================================================================
// TRACKER URLS
// =============================================================================

fn attribution_pairs(attribution: &Attribution) -> impl Iterator<Item = (&'static str, &str)> {
    [
        (crate::filter::CAMPAIGN, attribution.campaign.as_str()),
        (crate::filter::MEDIUM, attribution.medium.as_str()),
        (crate::filter::SOURCE, attribution.source.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
}

impl Tracker {
    /// Public link that records a click and redirects.
    ///
    /// Always ends in `?`, followed by the non-empty attribution fields.
    #[must_use]
    pub fn self_url(&self, attribution: &Attribution) -> String {
        format!(
            "/trackers/{}?{}",
            self.id,
            encode_query(attribution_pairs(attribution))
        )
    }

    #[must_use]
    pub fn edit_url(&self) -> String {
        format!("/trackers/{}/edit", self.id)
    }

    #[must_use]
    pub fn clicks_url(&self) -> String {
        format!("/trackers/{}/clicks", self.id)
    }

    /// Listing builder for this tracker's clicks.
    #[must_use]
    pub fn clicks_links(&self) -> LinkBuilder {
        LinkBuilder::new(self.clicks_url())
    }

    /// Chart service URL rendering a QR code of the public link.
    ///
    /// `base_url` is the externally visible origin, e.g. `https://example.org`.
    #[must_use]
    pub fn qr_code_url(&self, base_url: &str, attribution: &Attribution) -> String {
        let target = format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            self.self_url(attribution)
        );
        let query = encode_query([
            ("chl", target.as_str()),
            ("choe", "UTF-8"),
            ("chs", QR_SIZE),
            ("cht", "qr"),
        ]);
        format!("{QR_CHART_URL}?{query}")
    }
}
