//! Article and category value types shared by the favorites store, the
//! remote client and the query cache.
//!
//! Field names follow the resource server's JSON shape (camelCase), so the
//! same types serialize to the persisted favorites blob, the export file and
//! the HTTP request/response bodies.
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Structures
// ============================================================================

/// Origin of an article, as displayed under its title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
}

/// A single news item.
///
/// Identity is by `id` only: two values with the same `id` are the same
/// logical article even if other fields differ. The favorites collection
/// relies on this for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Paragraphs joined by a blank line.
    pub content: String,
    pub url: String,
    pub url_to_image: String,
    /// ISO-8601 timestamp, kept as the server sent it.
    pub published_at: String,
    pub source: Source,
    /// Expected to match a [`Category::slug`], not enforced.
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Article {
    /// Split `content` into its paragraphs, skipping blank ones.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Parsed `publishedAt`, or `None` if the server sent something that is
    /// not RFC 3339.
    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.published_at).ok()
    }

    /// Case-insensitive substring match against title and description.
    ///
    /// A blank query matches everything. Otherwise the query is matched as
    /// typed, surrounding whitespace included.
    pub fn matches_query(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

/// Body of an article creation request: every field except the
/// server-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: String,
    pub url_to_image: String,
    pub published_at: String,
    pub source: Source,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Partial update. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_to_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A named grouping of articles. Read-only from the client's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
    pub icon: String,
}

// ============================================================================
// Filtering
// ============================================================================

/// Category filter used by article listings. `All` disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter<'a> {
    All,
    Slug(&'a str),
}

impl<'a> From<Option<&'a str>> for CategoryFilter<'a> {
    fn from(slug: Option<&'a str>) -> Self {
        match slug {
            None | Some("all") => CategoryFilter::All,
            Some(slug) => CategoryFilter::Slug(slug),
        }
    }
}

/// Client-side filtering for article listings: category first, then a
/// case-insensitive search over title, description and category.
pub fn filter_articles<'a>(
    articles: &'a [Article],
    category: CategoryFilter<'_>,
    query: &str,
) -> Vec<&'a Article> {
    let blank = query.trim().is_empty();
    let query_lower = query.to_lowercase();
    articles
        .iter()
        .filter(|a| match category {
            CategoryFilter::All => true,
            CategoryFilter::Slug(slug) => a.category == slug,
        })
        .filter(|a| {
            blank
                || a.matches_query(&query_lower)
                || a.category.to_lowercase().contains(&query_lower)
        })
        .collect()
}
