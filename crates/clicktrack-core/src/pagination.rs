//! # Pagination Module
//!
//! Cursor-based pagination with precomputed page markers.
//!
//! A listing is a sequence of `(key, row)` pairs in display order (newest
//! first, i.e. descending keys). Page boundaries are found by scanning the keys
//! once and recording every `per_page`-th one; each recorded key becomes the
//! cursor where that page starts. Page `n` therefore starts at marker `n - 1`,
//! and an explicit cursor may start a page anywhere in the listing.

use crate::cursor::Cursor;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default number of rows per page.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Keys where each page starts, given keys in display order.
///
/// An empty listing has no markers.
pub fn page_markers<K>(keys: impl IntoIterator<Item = K>, per_page: usize) -> Vec<K> {
    let per_page = per_page.max(1);
    keys.into_iter()
        .enumerate()
        .filter(|(i, _)| i % per_page == 0)
        .map(|(_, key)| key)
        .collect()
}

/// Number of pages for a marker list. Never less than one.
#[must_use]
pub fn page_count(markers: usize) -> usize {
    markers.max(1)
}

// =============================================================================
// PAGE REQUEST
// =============================================================================

/// Which page to show: a 1-based page number or an explicit cursor.
///
/// A cursor takes precedence over a page number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    /// The first page.
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    /// A 1-based page number.
    #[must_use]
    pub fn page(page: usize) -> Self {
        Self {
            page: Some(page),
            cursor: None,
        }
    }

    /// Start at a cursor.
    #[must_use]
    pub fn at(cursor: Cursor) -> Self {
        Self {
            page: None,
            cursor: Some(cursor),
        }
    }
}

// =============================================================================
// PAGE
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Current page number (1-based).
    pub current: usize,
    /// Total number of pages (at least 1).
    pub page_count: usize,
    /// Total number of rows across all pages.
    pub total: usize,
    /// Rows on this page.
    pub items: Vec<T>,
    /// Start cursor of every page, in page order.
    pub markers: Vec<Cursor>,
}

impl<T> Page<T> {
    /// Next page number, or `None` on the last page.
    #[must_use]
    pub fn next_page(&self) -> Option<usize> {
        (self.current < self.page_count).then(|| self.current + 1)
    }

    /// Previous page number, or `None` on the first page.
    #[must_use]
    pub fn prev_page(&self) -> Option<usize> {
        (self.current > 1).then(|| self.current - 1)
    }

    /// Every page number, flagged when it is the current one.
    pub fn page_links(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        (1..=self.page_count).map(|n| (n, n == self.current))
    }

    /// Start cursor of a 1-based page.
    #[must_use]
    pub fn cursor_for(&self, page: usize) -> Option<&Cursor> {
        page.checked_sub(1).and_then(|i| self.markers.get(i))
    }

    /// Transform the rows, keeping the page bookkeeping.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current: self.current,
            page_count: self.page_count,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
            markers: self.markers,
        }
    }
}

/// Cut one page out of a listing.
///
/// `rows` must be in display order, i.e. sorted by descending key.
pub fn paginate<K, V>(rows: Vec<(K, V)>, per_page: usize, request: &PageRequest) -> Result<Page<V>>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
{
    let per_page = per_page.max(1);
    let total = rows.len();
    let marker_keys = page_markers(rows.iter().map(|(key, _)| key.clone()), per_page);
    let pages = page_count(marker_keys.len());

    let (current, start) = match &request.cursor {
        Some(cursor) => {
            let key: K = cursor.decode()?;
            // The page holding `key` is the last one whose marker is not older.
            let current = marker_keys.iter().filter(|m| **m >= key).count().max(1);
            let start = rows.partition_point(|(k, _)| *k > key);
            (current, start)
        }
        None => {
            let page = request.page.unwrap_or(1);
            if page == 0 {
                return Err(Error::InvalidPage("pages start at 1".to_string()));
            }
            if page > pages {
                return Err(Error::PageOutOfRange {
                    page,
                    page_count: pages,
                });
            }
            (page, (page - 1) * per_page)
        }
    };

    let markers = marker_keys
        .iter()
        .map(Cursor::encode)
        .collect::<Result<Vec<_>>>()?;
    let items = rows
        .into_iter()
        .skip(start)
        .take(per_page)
        .map(|(_, row)| row)
        .collect();

    Ok(Page {
        current,
        page_count: pages,
        total,
        items,
        markers,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Rows keyed `n..1`, newest first, with the key as the row.
    fn listing(n: u64) -> Vec<(u64, u64)> {
        (1..=n).rev().map(|k| (k, k)).collect()
    }

    #[test]
    fn markers_every_per_page() {
        let keys = vec![50u64, 40, 30, 20, 10];
        assert_eq!(page_markers(keys, 2), vec![50, 30, 10]);
    }

    #[test]
    fn no_rows_no_markers_one_page() {
        let markers = page_markers(Vec::<u64>::new(), 20);
        assert!(markers.is_empty());
        assert_eq!(page_count(markers.len()), 1);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_page() {
        let page = paginate(listing(40), 20, &PageRequest::first()).unwrap();
        assert_eq!(page.page_count, 2);
        assert_eq!(page.next_page(), Some(2));

        let last = paginate(listing(40), 20, &PageRequest::page(2)).unwrap();
        assert_eq!(last.items.len(), 20);
        assert_eq!(last.next_page(), None);
    }

    #[test]
    fn first_page_of_empty_listing() {
        let page = paginate(listing(0), 20, &PageRequest::first()).unwrap();
        assert_eq!(page.current, 1);
        assert_eq!(page.page_count, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.prev_page(), None);
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn page_numbers_select_slices() {
        let page = paginate(listing(45), 20, &PageRequest::page(3)).unwrap();
        assert_eq!(page.current, 3);
        assert_eq!(page.items, (1..=5).rev().collect::<Vec<_>>());
        assert_eq!(page.prev_page(), Some(2));
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn page_zero_is_invalid() {
        let err = paginate(listing(5), 20, &PageRequest::page(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidPage(_)));
    }

    #[test]
    fn page_past_end_is_out_of_range() {
        let err = paginate(listing(5), 2, &PageRequest::page(4)).unwrap_err();
        assert!(matches!(
            err,
            Error::PageOutOfRange {
                page: 4,
                page_count: 3
            }
        ));
    }

    #[test]
    fn marker_cursor_matches_page_number() {
        let first = paginate(listing(10), 3, &PageRequest::first()).unwrap();
        let cursor = first.cursor_for(3).cloned().unwrap();

        let by_cursor = paginate(listing(10), 3, &PageRequest::at(cursor)).unwrap();
        let by_number = paginate(listing(10), 3, &PageRequest::page(3)).unwrap();
        assert_eq!(by_cursor, by_number);
    }

    #[test]
    fn cursor_between_markers_starts_mid_page() {
        let cursor = Cursor::encode(&8u64).unwrap();
        let page = paginate(listing(10), 3, &PageRequest::at(cursor)).unwrap();
        // Markers are 10, 7, 4, 1; key 8 lives on page 1.
        assert_eq!(page.current, 1);
        assert_eq!(page.items, vec![8, 7, 6]);
    }

    #[test]
    fn cursor_for_missing_key_starts_at_next_older_row() {
        let rows = vec![(30u64, "c"), (20, "b"), (10, "a")];
        let cursor = Cursor::encode(&25u64).unwrap();
        let page = paginate(rows, 2, &PageRequest::at(cursor)).unwrap();
        assert_eq!(page.items, vec!["b", "a"]);
    }

    #[test]
    fn cursor_takes_precedence_over_page() {
        let cursor = Cursor::encode(&2u64).unwrap();
        let request = PageRequest {
            page: Some(1),
            cursor: Some(cursor),
        };
        let page = paginate(listing(10), 3, &request).unwrap();
        assert_eq!(page.items, vec![2, 1]);
    }

    #[test]
    fn page_links_flag_current() {
        let page = paginate(listing(5), 2, &PageRequest::page(2)).unwrap();
        let links: Vec<_> = page.page_links().collect();
        assert_eq!(links, vec![(1, false), (2, true), (3, false)]);
    }

    #[test]
    fn map_keeps_bookkeeping() {
        let page = paginate(listing(5), 2, &PageRequest::page(2)).unwrap();
        let mapped = page.clone().map(|k| k * 10);
        assert_eq!(mapped.items, vec![30, 20]);
        assert_eq!(mapped.markers, page.markers);
        assert_eq!(mapped.current, 2);
    }

    proptest! {
        #[test]
        fn pages_partition_the_listing(n in 0u64..200, per_page in 1usize..30) {
            let first = paginate(listing(n), per_page, &PageRequest::first()).unwrap();
            let expected_pages = (n as usize).div_ceil(per_page).max(1);
            prop_assert_eq!(first.page_count, expected_pages);

            let mut seen = Vec::new();
            for p in 1..=first.page_count {
                let page = paginate(listing(n), per_page, &PageRequest::page(p)).unwrap();
                prop_assert!(page.items.len() <= per_page);
                seen.extend(page.items);
            }
            prop_assert_eq!(seen, (1..=n).rev().collect::<Vec<_>>());
        }
    }
}
