//! # Storage Module
//!
//! Persistent storage for trackers, clicks and sign-ups using redb.
//!
//! Uses the redb embedded database for:
//! - ACID transactions (the click increment-and-log step is one write)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (page views read a consistent snapshot while the worker writes)

mod redb_store;

pub use redb_store::{ClickOutcome, Store, StoreStats};
