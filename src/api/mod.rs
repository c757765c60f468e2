//! Remote article service: the [`ArticleRepository`] capability and its
//! HTTP implementation.
//!
//! The query cache is written against the trait, so tests substitute an
//! in-process repository and the binary plugs in [`HttpArticleClient`].

mod client;

use std::future::Future;

use crate::model::{Article, ArticleDraft, ArticlePatch, Category};

pub use client::{ApiError, HttpArticleClient};

/// CRUD access to articles and read access to categories.
///
/// Every operation suspends on I/O and may fail with
/// [`ApiError::Network`] or [`ApiError::Server`]. Implementations do not
/// retry.
pub trait ArticleRepository: Send + Sync {
    fn list_articles(&self) -> impl Future<Output = Result<Vec<Article>, ApiError>> + Send;

    /// Fails with [`ApiError::NotFound`] if the id does not exist.
    fn get_article(&self, id: &str) -> impl Future<Output = Result<Article, ApiError>> + Send;

    /// Server-side filter. The meaning of an empty slug is up to the server.
    fn list_articles_by_category(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Vec<Article>, ApiError>> + Send;

    /// The server assigns the id.
    fn create_article(
        &self,
        draft: &ArticleDraft,
    ) -> impl Future<Output = Result<Article, ApiError>> + Send;

    fn update_article(
        &self,
        id: &str,
        patch: &ArticlePatch,
    ) -> impl Future<Output = Result<Article, ApiError>> + Send;

    /// Fails with [`ApiError::NotFound`] if the id does not exist.
    fn delete_article(&self, id: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, ApiError>> + Send;

    fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Category>, ApiError>> + Send;
}
