//! Query cache layer: keyed caching, request de-duplication and
//! invalidation-on-mutation in front of the remote article service.
//!
//! - [`key`] - Tagged [`QueryKey`]s and the families invalidated together
//! - [`cache`] - Generic [`QueryCache`] (moka-backed) with read retries
//! - [`articles`] - [`ArticleQueries`], the cached facade used by callers
//!
//! # Example
//!
//! ```ignore
//! let client = HttpArticleClient::new("http://localhost:3001", timeout, None)?;
//! let queries = ArticleQueries::new(client, QueryCache::new(1000));
//!
//! let sports = queries.articles_by_category("sports").await?; // fetched
//! let again = queries.articles_by_category("sports").await?;  // cached
//! queries.create_article(&draft).await?;                      // evicts both lists
//! ```

mod articles;
mod cache;
mod key;

pub use articles::{ArticleQueries, CacheValue};
pub use cache::{QueryCache, DEFAULT_RETRIES};
pub use key::{Invalidation, QueryFamily, QueryKey};
