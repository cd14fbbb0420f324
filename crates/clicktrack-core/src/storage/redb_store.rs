//! redb-backed store.
//!
//! ## Tables
//!
//! | table             | key                          | value              |
//! |-------------------|------------------------------|--------------------|
//! | `trackers`        | tracker id                   | postcard `Tracker` |
//! | `clicks`          | `(tracker id, date, seq)`    | postcard `Click`   |
//! | `signups`         | `(date, seq)`                | postcard `SignUp`  |
//! | `processed_tasks` | task id                      | task timestamp     |
//! | `meta`            | counter name                 | next value         |
//!
//! Listings walk key ranges backwards, so every listing is newest first.
//! `seq` is a store-wide counter that keeps keys unique when dates collide.

use crate::filter::ClickFilter;
use crate::links::validate_url;
use crate::pagination::{Page, PageRequest, paginate};
use crate::{Click, Error, Result, SignUp, Tracker, TrackerId};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use serde::Serialize;
use std::path::Path;

type ClickKey = (u64, i64, u64);
type SignUpKey = (i64, u64);

const TRACKERS: TableDefinition<u64, &[u8]> = TableDefinition::new("trackers");
const CLICKS: TableDefinition<ClickKey, &[u8]> = TableDefinition::new("clicks");
const SIGNUPS: TableDefinition<SignUpKey, &[u8]> = TableDefinition::new("signups");
const PROCESSED_TASKS: TableDefinition<&str, i64> = TableDefinition::new("processed_tasks");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_TRACKER_ID: &str = "next_tracker_id";
const NEXT_SEQ: &str = "next_seq";

/// Result of applying a click task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click was logged; `count` is the tracker's new click count.
    Recorded { count: u64 },
    /// The task id was seen before; nothing changed.
    Duplicate,
}

/// Row counts for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub trackers: u64,
    pub clicks: u64,
    pub signups: u64,
    pub processed_tasks: u64,
}

/// The application datastore.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// Take the next value of a named counter, starting at `first`.
fn take_next(meta: &mut Table<'_, &'static str, u64>, name: &str, first: u64) -> Result<u64> {
    let value = meta.get(name)?.map(|guard| guard.value()).unwrap_or(first);
    meta.insert(name, value.saturating_add(1))?;
    Ok(value)
}

/// Whether `task_id` was already applied; marks it applied otherwise.
fn claim_task(
    tasks: &mut Table<'_, &'static str, i64>,
    task_id: &str,
    processed_at: i64,
) -> Result<bool> {
    if tasks.get(task_id)?.is_some() {
        return Ok(false);
    }
    tasks.insert(task_id, processed_at)?;
    Ok(true)
}

impl Store {
    /// Open the database at `path`, creating it and its tables if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(TRACKERS)?;
            txn.open_table(CLICKS)?;
            txn.open_table(SIGNUPS)?;
            txn.open_table(PROCESSED_TASKS)?;
            txn.open_table(META)?;
        }
        txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // TRACKERS
    // =========================================================================

    /// Create a tracker with a zero click count.
    pub fn create_tracker(&self, url: &str, user: &str) -> Result<Tracker> {
        let url = validate_url(url)?;
        let txn = self.db.begin_write()?;
        let tracker = {
            let mut meta = txn.open_table(META)?;
            let id = TrackerId(take_next(&mut meta, NEXT_TRACKER_ID, 1)?);
            let tracker = Tracker {
                id,
                url,
                count: 0,
                user: user.to_string(),
            };
            let mut trackers = txn.open_table(TRACKERS)?;
            trackers.insert(id.0, postcard::to_allocvec(&tracker)?.as_slice())?;
            tracker
        };
        txn.commit()?;
        Ok(tracker)
    }

    /// Look up a tracker.
    pub fn tracker(&self, id: TrackerId) -> Result<Option<Tracker>> {
        let txn = self.db.begin_read()?;
        let trackers = txn.open_table(TRACKERS)?;
        let Some(row) = trackers.get(id.0)? else {
            return Ok(None);
        };
        Ok(Some(postcard::from_bytes(row.value())?))
    }

    /// Point a tracker at a new destination.
    pub fn update_tracker_url(&self, id: TrackerId, url: &str) -> Result<Tracker> {
        let url = validate_url(url)?;
        let txn = self.db.begin_write()?;
        let tracker = {
            let mut trackers = txn.open_table(TRACKERS)?;
            let mut tracker: Tracker = match trackers.get(id.0)? {
                Some(row) => postcard::from_bytes(row.value())?,
                None => return Err(Error::TrackerNotFound(id)),
            };
            tracker.url = url;
            trackers.insert(id.0, postcard::to_allocvec(&tracker)?.as_slice())?;
            tracker
        };
        txn.commit()?;
        Ok(tracker)
    }

    /// One page of trackers, newest first, optionally only one user's.
    pub fn trackers_page(
        &self,
        user: Option<&str>,
        request: &PageRequest,
        per_page: usize,
    ) -> Result<Page<Tracker>> {
        let txn = self.db.begin_read()?;
        let trackers = txn.open_table(TRACKERS)?;

        let mut rows = Vec::new();
        for entry in trackers.iter()?.rev() {
            let (key, value) = entry?;
            let tracker: Tracker = postcard::from_bytes(value.value())?;
            if user.is_none_or(|u| tracker.user == u) {
                rows.push((key.value(), tracker));
            }
        }
        paginate(rows, per_page, request)
    }

    // =========================================================================
    // CLICKS
    // =========================================================================

    /// Apply a click task: bump the tracker's count and log the click.
    ///
    /// Runs as a single write transaction. A task id that was already applied
    /// is reported as [`ClickOutcome::Duplicate`] and changes nothing, so a
    /// redelivered task is never counted twice.
    pub fn record_click(
        &self,
        task_id: &str,
        tracker_id: TrackerId,
        click: &Click,
    ) -> Result<ClickOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut tasks = txn.open_table(PROCESSED_TASKS)?;
            if !claim_task(&mut tasks, task_id, click.date)? {
                ClickOutcome::Duplicate
            } else {
                let mut trackers = txn.open_table(TRACKERS)?;
                let mut tracker: Tracker = match trackers.get(tracker_id.0)? {
                    Some(row) => postcard::from_bytes(row.value())?,
                    None => return Err(Error::TrackerNotFound(tracker_id)),
                };
                tracker.count = tracker.count.saturating_add(1);
                trackers.insert(tracker_id.0, postcard::to_allocvec(&tracker)?.as_slice())?;

                let mut meta = txn.open_table(META)?;
                let seq = take_next(&mut meta, NEXT_SEQ, 0)?;
                let mut clicks = txn.open_table(CLICKS)?;
                clicks.insert(
                    (tracker_id.0, click.date, seq),
                    postcard::to_allocvec(click)?.as_slice(),
                )?;

                ClickOutcome::Recorded {
                    count: tracker.count,
                }
            }
        };
        if outcome == ClickOutcome::Duplicate {
            txn.abort()?;
        } else {
            txn.commit()?;
        }
        Ok(outcome)
    }

    /// One page of a tracker's clicks, newest first.
    ///
    /// Page markers are computed over the filtered sequence, so page numbers
    /// stay dense when a filter is active.
    pub fn clicks_page(
        &self,
        tracker_id: TrackerId,
        filter: &ClickFilter,
        request: &PageRequest,
        per_page: usize,
    ) -> Result<Page<Click>> {
        // A cursor only resolves within the tracker it was issued for.
        if let Some(cursor) = &request.cursor {
            let (owner, _, _): ClickKey = cursor.decode()?;
            if owner != tracker_id.0 {
                return Err(Error::InvalidCursor);
            }
        }

        let txn = self.db.begin_read()?;
        let clicks = txn.open_table(CLICKS)?;
        let range = (tracker_id.0, i64::MIN, 0)..=(tracker_id.0, i64::MAX, u64::MAX);

        let mut rows = Vec::new();
        for entry in clicks.range(range)?.rev() {
            let (key, value) = entry?;
            let click: Click = postcard::from_bytes(value.value())?;
            if filter.matches_click(&click) {
                rows.push((key.value(), click));
            }
        }
        paginate(rows, per_page, request)
    }

    // =========================================================================
    // SIGN-UPS
    // =========================================================================

    /// Store a sign-up. Returns `false` when the task id was already applied.
    pub fn add_signup(&self, task_id: &str, signup: &SignUp) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let inserted = {
            let mut tasks = txn.open_table(PROCESSED_TASKS)?;
            if claim_task(&mut tasks, task_id, signup.date)? {
                let mut meta = txn.open_table(META)?;
                let seq = take_next(&mut meta, NEXT_SEQ, 0)?;
                let mut signups = txn.open_table(SIGNUPS)?;
                signups.insert((signup.date, seq), postcard::to_allocvec(signup)?.as_slice())?;
                true
            } else {
                false
            }
        };
        if inserted {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(inserted)
    }

    /// One page of sign-ups, newest first.
    pub fn signups_page(&self, request: &PageRequest, per_page: usize) -> Result<Page<SignUp>> {
        let txn = self.db.begin_read()?;
        let signups = txn.open_table(SIGNUPS)?;

        let mut rows = Vec::new();
        for entry in signups.iter()?.rev() {
            let (key, value) = entry?;
            rows.push((key.value(), postcard::from_bytes::<SignUp>(value.value())?));
        }
        paginate(rows, per_page, request)
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    pub fn stats(&self) -> Result<StoreStats> {
        let txn = self.db.begin_read()?;
        Ok(StoreStats {
            trackers: txn.open_table(TRACKERS)?.len()?,
            clicks: txn.open_table(CLICKS)?.len()?,
            signups: txn.open_table(SIGNUPS)?.len()?,
            processed_tasks: txn.open_table(PROCESSED_TASKS)?.len()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::{CAMPAIGN, SOURCE};
    use crate::{Attribution, Cursor};
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.redb")).unwrap();
        (dir, store)
    }

    fn click(date: i64, campaign: &str, source: &str) -> Click {
        Click {
            remote_addr: "203.0.113.9".to_string(),
            user_agent: "test-agent".to_string(),
            attribution: Attribution::new(campaign, source, ""),
            date,
        }
    }

    fn signup(date: i64, email: &str) -> SignUp {
        SignUp {
            email_addr: email.to_string(),
            remote_addr: "198.51.100.4".to_string(),
            user_agent: "test-agent".to_string(),
            date,
        }
    }

    #[test]
    fn tracker_ids_are_sequential() {
        let (_dir, store) = store();
        let a = store.create_tracker("https://example.org/a", "ann").unwrap();
        let b = store.create_tracker("https://example.org/b", "bob").unwrap();
        assert_eq!(a.id, TrackerId(1));
        assert_eq!(b.id, TrackerId(2));
        assert_eq!(b.count, 0);
    }

    #[test]
    fn create_rejects_invalid_url() {
        let (_dir, store) = store();
        let err = store.create_tracker("mailto:someone@example.org", "ann").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert_eq!(store.stats().unwrap().trackers, 0);
    }

    #[test]
    fn tracker_lookup() {
        let (_dir, store) = store();
        let created = store.create_tracker("https://example.org/", "ann").unwrap();
        assert_eq!(store.tracker(created.id).unwrap(), Some(created));
        assert_eq!(store.tracker(TrackerId(99)).unwrap(), None);
    }

    #[test]
    fn update_url() {
        let (_dir, store) = store();
        let created = store.create_tracker("https://example.org/old", "ann").unwrap();
        let updated = store
            .update_tracker_url(created.id, "https://example.org/new")
            .unwrap();
        assert_eq!(updated.url, "https://example.org/new");
        assert_eq!(store.tracker(created.id).unwrap().unwrap().url, updated.url);

        let err = store
            .update_tracker_url(TrackerId(42), "https://example.org/")
            .unwrap_err();
        assert!(matches!(err, Error::TrackerNotFound(TrackerId(42))));
    }

    #[test]
    fn record_click_counts_and_logs() {
        let (_dir, store) = store();
        let tracker = store.create_tracker("https://example.org/", "ann").unwrap();

        let outcome = store.record_click("task-1", tracker.id, &click(100, "", "")).unwrap();
        assert_eq!(outcome, ClickOutcome::Recorded { count: 1 });
        let outcome = store.record_click("task-2", tracker.id, &click(101, "", "")).unwrap();
        assert_eq!(outcome, ClickOutcome::Recorded { count: 2 });

        assert_eq!(store.tracker(tracker.id).unwrap().unwrap().count, 2);
        assert_eq!(store.stats().unwrap().clicks, 2);
    }

    #[test]
    fn redelivered_click_task_is_applied_once() {
        let (_dir, store) = store();
        let tracker = store.create_tracker("https://example.org/", "ann").unwrap();

        store.record_click("task-1", tracker.id, &click(100, "", "")).unwrap();
        let again = store.record_click("task-1", tracker.id, &click(100, "", "")).unwrap();

        assert_eq!(again, ClickOutcome::Duplicate);
        assert_eq!(store.tracker(tracker.id).unwrap().unwrap().count, 1);
        assert_eq!(store.stats().unwrap().clicks, 1);
    }

    #[test]
    fn click_for_missing_tracker_changes_nothing() {
        let (_dir, store) = store();
        let err = store.record_click("task-1", TrackerId(5), &click(1, "", "")).unwrap_err();
        assert!(matches!(err, Error::TrackerNotFound(TrackerId(5))));

        let stats = store.stats().unwrap();
        assert_eq!(stats.clicks, 0);
        assert_eq!(stats.processed_tasks, 0);
    }

    #[test]
    fn clicks_are_newest_first_per_tracker() {
        let (_dir, store) = store();
        let a = store.create_tracker("https://example.org/a", "ann").unwrap();
        let b = store.create_tracker("https://example.org/b", "ann").unwrap();

        for (i, date) in [300, 100, 200].into_iter().enumerate() {
            store
                .record_click(&format!("a-{i}"), a.id, &click(date, "", ""))
                .unwrap();
        }
        store.record_click("b-0", b.id, &click(250, "", "")).unwrap();

        let page = store
            .clicks_page(a.id, &ClickFilter::none(), &PageRequest::first(), 20)
            .unwrap();
        let dates: Vec<_> = page.items.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![300, 200, 100]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn clicks_filter_and_paginate() {
        let (_dir, store) = store();
        let t = store.create_tracker("https://example.org/", "ann").unwrap();
        for i in 0..25 {
            let source = if i % 2 == 0 { "twitter" } else { "email" };
            store
                .record_click(&format!("t-{i}"), t.id, &click(i, "launch", source))
                .unwrap();
        }

        let filter = ClickFilter::none().with(SOURCE, "twitter").with(CAMPAIGN, "launch");
        let first = store
            .clicks_page(t.id, &filter, &PageRequest::first(), 5)
            .unwrap();
        // 13 even dates in 0..25
        assert_eq!(first.total, 13);
        assert_eq!(first.page_count, 3);
        assert!(first.items.iter().all(|c| c.attribution.source == "twitter"));

        let last = store
            .clicks_page(t.id, &filter, &PageRequest::page(3), 5)
            .unwrap();
        let dates: Vec<_> = last.items.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![4, 2, 0]);

        let via_cursor = store
            .clicks_page(t.id, &filter, &PageRequest::at(first.markers[2].clone()), 5)
            .unwrap();
        assert_eq!(via_cursor.items, last.items);
    }

    #[test]
    fn foreign_cursor_is_rejected() {
        let (_dir, store) = store();
        let t = store.create_tracker("https://example.org/", "ann").unwrap();
        store.record_click("t-0", t.id, &click(1, "", "")).unwrap();

        let cursor: Cursor = "_w".parse().unwrap();
        let err = store
            .clicks_page(t.id, &ClickFilter::none(), &PageRequest::at(cursor), 5)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCursor));
    }

    #[test]
    fn cursor_from_other_tracker_is_rejected() {
        let (_dir, store) = store();
        let a = store.create_tracker("https://example.org/a", "ann").unwrap();
        let b = store.create_tracker("https://example.org/b", "ann").unwrap();
        for i in 0..3 {
            store.record_click(&format!("a-{i}"), a.id, &click(i, "", "")).unwrap();
            store.record_click(&format!("b-{i}"), b.id, &click(i, "", "")).unwrap();
        }

        let a_page = store
            .clicks_page(a.id, &ClickFilter::none(), &PageRequest::first(), 1)
            .unwrap();
        let cursor = a_page.markers[1].clone();

        let err = store
            .clicks_page(b.id, &ClickFilter::none(), &PageRequest::at(cursor.clone()), 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCursor));

        // Still valid for the listing that issued it.
        let own = store
            .clicks_page(a.id, &ClickFilter::none(), &PageRequest::at(cursor), 1)
            .unwrap();
        assert_eq!(own.current, 2);
    }

    #[test]
    fn signups_newest_first_and_deduplicated() {
        let (_dir, store) = store();
        assert!(store.add_signup("s-1", &signup(10, "a@example.org")).unwrap());
        assert!(store.add_signup("s-2", &signup(30, "b@example.org")).unwrap());
        assert!(store.add_signup("s-3", &signup(20, "c@example.org")).unwrap());
        assert!(!store.add_signup("s-2", &signup(30, "b@example.org")).unwrap());

        let page = store.signups_page(&PageRequest::first(), 20).unwrap();
        let emails: Vec<_> = page.items.iter().map(|s| s.email_addr.as_str()).collect();
        assert_eq!(emails, vec!["b@example.org", "c@example.org", "a@example.org"]);
    }

    #[test]
    fn signups_same_second_keep_insertion_order_reversed() {
        let (_dir, store) = store();
        store.add_signup("s-1", &signup(10, "first@example.org")).unwrap();
        store.add_signup("s-2", &signup(10, "second@example.org")).unwrap();

        let page = store.signups_page(&PageRequest::first(), 20).unwrap();
        assert_eq!(page.items[0].email_addr, "second@example.org");
    }

    #[test]
    fn trackers_page_filters_by_user() {
        let (_dir, store) = store();
        store.create_tracker("https://example.org/1", "ann").unwrap();
        store.create_tracker("https://example.org/2", "bob").unwrap();
        store.create_tracker("https://example.org/3", "ann").unwrap();

        let all = store.trackers_page(None, &PageRequest::first(), 20).unwrap();
        let ids: Vec<_> = all.items.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let ann = store.trackers_page(Some("ann"), &PageRequest::first(), 20).unwrap();
        assert_eq!(ann.total, 2);
    }

    #[test]
    fn reopen_keeps_data_and_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.redb");
        {
            let store = Store::open(&path).unwrap();
            store.create_tracker("https://example.org/", "ann").unwrap();
        }
        let store = Store::open(&path).unwrap();
        let next = store.create_tracker("https://example.org/next", "ann").unwrap();
        assert_eq!(next.id, TrackerId(2));
    }
}
