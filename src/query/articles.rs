use std::sync::Arc;

use super::cache::QueryCache;
use super::key::{Invalidation, QueryFamily, QueryKey};
use crate::api::{ApiError, ArticleRepository};
use crate::model::{Article, ArticleDraft, ArticlePatch, Category};

/// Cached value types, one per query shape.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Articles(Arc<Vec<Article>>),
    Article(Arc<Article>),
    Categories(Arc<Vec<Category>>),
    Category(Option<Arc<Category>>),
}

/// Cached reads and invalidating writes over an [`ArticleRepository`].
///
/// Invalidation is coarse: the cache cannot tell which category lists a
/// created or deleted article belongs to, so every write evicts the whole
/// article-list family. Writes that target one article also evict that
/// article's own entry.
pub struct ArticleQueries<R> {
    repo: Arc<R>,
    cache: QueryCache<CacheValue>,
}

impl<R> Clone for ArticleQueries<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            cache: self.cache.clone(),
        }
    }
}

impl<R: ArticleRepository> ArticleQueries<R> {
    pub fn new(repo: R, cache: QueryCache<CacheValue>) -> Self {
        Self {
            repo: Arc::new(repo),
            cache,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn cache(&self) -> &QueryCache<CacheValue> {
        &self.cache
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn articles(&self) -> Result<Arc<Vec<Article>>, ApiError> {
        let value = self
            .cache
            .query(QueryKey::AllArticles, move || async move {
                self.repo
                    .list_articles()
                    .await
                    .map(|a| CacheValue::Articles(Arc::new(a)))
            })
            .await?;
        match value {
            CacheValue::Articles(articles) => Ok(articles),
            other => Err(self.mismatch(QueryKey::AllArticles, &other).await),
        }
    }

    pub async fn article(&self, id: &str) -> Result<Arc<Article>, ApiError> {
        let key = QueryKey::ArticleById(id.to_string());
        let value = self
            .cache
            .query(key.clone(), move || async move {
                self.repo
                    .get_article(id)
                    .await
                    .map(|a| CacheValue::Article(Arc::new(a)))
            })
            .await?;
        match value {
            CacheValue::Article(article) => Ok(article),
            other => Err(self.mismatch(key, &other).await),
        }
    }

    pub async fn articles_by_category(&self, slug: &str) -> Result<Arc<Vec<Article>>, ApiError> {
        let key = QueryKey::ArticlesByCategory(slug.to_string());
        let value = self
            .cache
            .query(key.clone(), move || async move {
                self.repo
                    .list_articles_by_category(slug)
                    .await
                    .map(|a| CacheValue::Articles(Arc::new(a)))
            })
            .await?;
        match value {
            CacheValue::Articles(articles) => Ok(articles),
            other => Err(self.mismatch(key, &other).await),
        }
    }

    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        let value = self
            .cache
            .query(QueryKey::AllCategories, move || async move {
                self.repo
                    .list_categories()
                    .await
                    .map(|c| CacheValue::Categories(Arc::new(c)))
            })
            .await?;
        match value {
            CacheValue::Categories(categories) => Ok(categories),
            other => Err(self.mismatch(QueryKey::AllCategories, &other).await),
        }
    }

    /// `None` if no category has this slug. Absence is cached like a hit.
    pub async fn category(&self, slug: &str) -> Result<Option<Arc<Category>>, ApiError> {
        let key = QueryKey::CategoryBySlug(slug.to_string());
        let value = self
            .cache
            .query(key.clone(), move || async move {
                self.repo
                    .get_category_by_slug(slug)
                    .await
                    .map(|c| CacheValue::Category(c.map(Arc::new)))
            })
            .await?;
        match value {
            CacheValue::Category(category) => Ok(category),
            other => Err(self.mismatch(key, &other).await),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn create_article(&self, draft: &ArticleDraft) -> Result<Article, ApiError> {
        self.cache
            .mutate(
                &[Invalidation::Family(QueryFamily::ArticleLists)],
                self.repo.create_article(draft),
            )
            .await
    }

    pub async fn update_article(&self, id: &str, patch: &ArticlePatch) -> Result<Article, ApiError> {
        self.cache
            .mutate(
                &[
                    Invalidation::Family(QueryFamily::ArticleLists),
                    Invalidation::Key(QueryKey::ArticleById(id.to_string())),
                ],
                self.repo.update_article(id, patch),
            )
            .await
    }

    pub async fn delete_article(&self, id: &str) -> Result<(), ApiError> {
        self.cache
            .mutate(
                &[
                    Invalidation::Family(QueryFamily::ArticleLists),
                    Invalidation::Key(QueryKey::ArticleById(id.to_string())),
                ],
                self.repo.delete_article(id),
            )
            .await
    }

    /// An entry holds the wrong value type for its key. Evict it so the next
    /// read refetches.
    async fn mismatch(&self, key: QueryKey, found: &CacheValue) -> ApiError {
        tracing::error!(key = %key, found = ?found, "Query cache entry has unexpected type");
        let message = format!("unexpected cached value for {key}");
        self.cache.invalidate(&[Invalidation::Key(key)]).await;
        ApiError::Decode(message)
    }
}
