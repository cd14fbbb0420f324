//! # Clicktrack Core
//!
//! Storage and paging logic for the Clicktrack URL shortener and the sign-up
//! capture app.
//!
//! This crate is synchronous and free of networking. The app crate
//! (`apps/clicktrack`) owns HTTP, the task queue and logging.
//!
//! ## Modules
//!
//! - [`storage`]: redb-backed [`Store`] for trackers, clicks and sign-ups
//! - [`pagination`]: page markers and cursor resolution
//! - [`cursor`]: opaque, URL-safe page cursors
//! - [`filter`]: click filters over the attribution fields
//! - [`links`]: URL builders for trackers and paged listings
//! - [`cache`]: LRU cache used for cache-aside tracker lookups

pub mod cache;
pub mod cursor;
pub mod filter;
pub mod links;
pub mod pagination;
pub mod storage;

mod error;
mod types;

pub use cache::{CacheStats, LruCache, TrackerCache};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use filter::ClickFilter;
pub use links::LinkBuilder;
pub use pagination::{Page, PageRequest};
pub use storage::{ClickOutcome, Store, StoreStats};
pub use types::*;
