use std::fmt;

/// Logical identifier of a cacheable read.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum QueryKey {
    AllArticles,
    ArticlesByCategory(String),
    ArticleById(String),
    AllCategories,
    CategoryBySlug(String),
}

/// Groups of keys invalidated together.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum QueryFamily {
    /// The unfiltered article list and every category-filtered list
    ArticleLists,
    /// Every single-article entry
    Articles,
    /// The category list and every single-category entry
    Categories,
}

impl QueryKey {
    pub fn family(&self) -> QueryFamily {
        match self {
            QueryKey::AllArticles | QueryKey::ArticlesByCategory(_) => QueryFamily::ArticleLists,
            QueryKey::ArticleById(_) => QueryFamily::Articles,
            QueryKey::AllCategories | QueryKey::CategoryBySlug(_) => QueryFamily::Categories,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::AllArticles => write!(f, "articles"),
            QueryKey::ArticlesByCategory(slug) => write!(f, "articles:category:{slug}"),
            QueryKey::ArticleById(id) => write!(f, "article:id:{id}"),
            QueryKey::AllCategories => write!(f, "categories"),
            QueryKey::CategoryBySlug(slug) => write!(f, "category:slug:{slug}"),
        }
    }
}

/// What a successful mutation evicts from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Key(QueryKey),
    Family(QueryFamily),
}

impl Invalidation {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidation::Key(k) => k == key,
            Invalidation::Family(family) => key.family() == *family,
        }
    }
}

impl From<QueryKey> for Invalidation {
    fn from(key: QueryKey) -> Self {
        Invalidation::Key(key)
    }
}

impl From<QueryFamily> for Invalidation {
    fn from(family: QueryFamily) -> Self {
        Invalidation::Family(family)
    }
}
