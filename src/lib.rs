//! Client core of the newswave news aggregator.
//!
//! - [`storage`] - Persisted key-value store and the favorites collection
//! - [`view`] - UI-facing favorites snapshot kept in sync with the store
//! - [`api`] - Remote article service client
//! - [`query`] - Cached, de-duplicated reads with invalidation on writes
//! - [`model`] - Article and category types shared by all of the above
//! - [`config`] - `config.toml` loading
//! - [`util`] - Terminal text helpers

pub mod api;
pub mod config;
pub mod model;
pub mod query;
pub mod storage;
pub mod util;
pub mod view;
