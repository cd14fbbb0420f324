//! JSON view models.
//!
//! Views carry every URL a client needs to navigate: page links, filter
//! links, tracker links. Clients never assemble query strings themselves.

use clicktrack_core::filter::FILTER_KEYS;
use clicktrack_core::{Attribution, Click, ClickFilter, Cursor, LinkBuilder, Page, SignUp, Tracker};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerView {
    pub id: u64,
    pub url: String,
    pub count: u64,
    pub user: String,
    pub self_url: String,
    pub edit_url: String,
    pub clicks_url: String,
    pub qr_code_url: String,
}

impl TrackerView {
    #[must_use]
    pub fn new(tracker: &Tracker, base_url: &str) -> Self {
        let plain = Attribution::default();
        Self {
            id: tracker.id.0,
            url: tracker.url.clone(),
            count: tracker.count,
            user: tracker.user.clone(),
            self_url: tracker.self_url(&plain),
            edit_url: tracker.edit_url(),
            clicks_url: tracker.clicks_url(),
            qr_code_url: tracker.qr_code_url(base_url, &plain),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub number: usize,
    pub url: String,
    pub current: bool,
}

/// Page navigation for any listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNav {
    pub current: usize,
    pub page_count: usize,
    pub total: usize,
    pub self_url: String,
    pub next_url: Option<String>,
    pub prev_url: Option<String>,
    pub pages: Vec<PageLink>,
    /// Start cursor of every page.
    pub markers: Vec<Cursor>,
}

impl PageNav {
    #[must_use]
    pub fn new<T>(page: &Page<T>, links: &LinkBuilder) -> Self {
        Self {
            current: page.current,
            page_count: page.page_count,
            total: page.total,
            self_url: links.url(),
            next_url: page.next_page().map(|n| links.page_url(n)),
            prev_url: page.prev_page().map(|n| links.page_url(n)),
            pages: page
                .page_links()
                .map(|(number, current)| PageLink {
                    number,
                    url: links.page_url(number),
                    current,
                })
                .collect(),
            markers: page.markers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerPageView {
    pub nav: PageNav,
    pub trackers: Vec<TrackerView>,
}

/// An active click filter and the URL that drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilter {
    pub key: String,
    pub value: String,
    pub remove_url: String,
}

/// Links that narrow the listing to one of a click's attribution values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterUrls {
    pub campaign: Option<String>,
    pub source: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickView {
    pub remote_addr: String,
    pub user_agent: String,
    pub campaign: String,
    pub source: String,
    pub medium: String,
    pub date: i64,
    pub filter_urls: FilterUrls,
}

impl ClickView {
    #[must_use]
    pub fn new(click: Click, links: &LinkBuilder) -> Self {
        let narrow = |key: &str, value: &str| (!value.is_empty()).then(|| links.with(key, value));
        let Attribution {
            campaign,
            source,
            medium,
        } = click.attribution;
        Self {
            filter_urls: FilterUrls {
                campaign: narrow(clicktrack_core::filter::CAMPAIGN, &campaign),
                source: narrow(clicktrack_core::filter::SOURCE, &source),
                medium: narrow(clicktrack_core::filter::MEDIUM, &medium),
            },
            remote_addr: click.remote_addr,
            user_agent: click.user_agent,
            campaign,
            source,
            medium,
            date: click.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPageView {
    pub tracker: TrackerView,
    pub filters: Vec<ActiveFilter>,
    pub nav: PageNav,
    pub clicks: Vec<ClickView>,
}

impl ClickPageView {
    #[must_use]
    pub fn new(tracker: &Tracker, filter: &ClickFilter, page: Page<Click>, base_url: &str) -> Self {
        let links = filter.links(tracker.clicks_url());
        let filters = FILTER_KEYS
            .into_iter()
            .filter_map(|key| {
                let value = filter.get(key)?;
                (!value.is_empty()).then(|| ActiveFilter {
                    key: key.to_string(),
                    value: value.to_string(),
                    remove_url: links.without(key),
                })
            })
            .collect();
        Self {
            tracker: TrackerView::new(tracker, base_url),
            filters,
            nav: PageNav::new(&page, &links),
            clicks: page
                .items
                .into_iter()
                .map(|click| ClickView::new(click, &links))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpPageView {
    pub nav: PageNav,
    pub signups: Vec<SignUp>,
}
