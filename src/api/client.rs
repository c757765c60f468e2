use std::time::Duration;

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::ArticleRepository;
use crate::model::{Article, ArticleDraft, ArticlePatch, Category};

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from the remote article service.
///
/// Payloads are rendered to strings so the error is `Clone`: the query cache
/// hands one failure to every caller waiting on the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Connection, DNS, TLS failure or timeout
    #[error("Network error: {0}")]
    Network(String),
    /// Non-2xx response other than 404
    #[error("Server error: status {status}: {body}")]
    Server { status: u16, body: String },
    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Response body was not the expected JSON shape
    #[error("Invalid response body: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Base URL is not an absolute http(s) URL
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// [`ArticleRepository`] over the JSON REST endpoints:
///
/// - `GET /articles` (optional `category` query param), `GET /articles/{id}`
/// - `POST /articles`, `PATCH /articles/{id}`, `DELETE /articles/{id}`
/// - `GET /categories` (optional `slug` query param)
///
/// Performs no retries; the query cache decides retry policy.
#[derive(Clone)]
pub struct HttpArticleClient {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpArticleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArticleClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpArticleClient {
    /// Build a client for the service at `base_url`.
    ///
    /// `timeout` bounds each whole request. `api_token`, if set, is sent as a
    /// bearer token and never verified client-side.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_token: Option<SecretString>,
    ) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(resource.to_string()));
        }

        if !status.is_success() {
            let body = read_limited_text(response, MAX_RESPONSE_SIZE)
                .await
                .unwrap_or_default();
            tracing::debug!(status = status.as_u16(), resource = %resource, "Server rejected request");
            return Err(ApiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(request, resource).await?;
        let text = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{resource}: {e}")))
    }
}

impl ArticleRepository for HttpArticleClient {
    async fn list_articles(&self) -> Result<Vec<Article>, ApiError> {
        let request = self.client.get(self.endpoint(&["articles"]));
        self.send_json(request, "articles").await
    }

    async fn get_article(&self, id: &str) -> Result<Article, ApiError> {
        let request = self.client.get(self.endpoint(&["articles", id]));
        self.send_json(request, &format!("article {id}")).await
    }

    async fn list_articles_by_category(&self, slug: &str) -> Result<Vec<Article>, ApiError> {
        let mut url = self.endpoint(&["articles"]);
        url.query_pairs_mut().append_pair("category", slug);
        let request = self.client.get(url);
        self.send_json(request, &format!("articles in category {slug}"))
            .await
    }

    async fn create_article(&self, draft: &ArticleDraft) -> Result<Article, ApiError> {
        let request = self.client.post(self.endpoint(&["articles"])).json(draft);
        let created: Article = self.send_json(request, "articles").await?;
        tracing::info!(id = %created.id, "Created article");
        Ok(created)
    }

    async fn update_article(&self, id: &str, patch: &ArticlePatch) -> Result<Article, ApiError> {
        let request = self
            .client
            .patch(self.endpoint(&["articles", id]))
            .json(patch);
        let updated = self.send_json(request, &format!("article {id}")).await?;
        tracing::info!(id = %id, "Updated article");
        Ok(updated)
    }

    async fn delete_article(&self, id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.endpoint(&["articles", id]));
        self.send(request, &format!("article {id}")).await?;
        tracing::info!(id = %id, "Deleted article");
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self.client.get(self.endpoint(&["categories"]));
        self.send_json(request, "categories").await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, ApiError> {
        let mut url = self.endpoint(&["categories"]);
        url.query_pairs_mut().append_pair("slug", slug);
        let request = self.client.get(url);
        let matches: Vec<Category> = self
            .send_json(request, &format!("category {slug}"))
            .await?;
        Ok(matches.into_iter().next())
    }
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::Decode("invalid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article_json(id: &str, category: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Article {id}"),
            "description": "desc",
            "content": "Para one.\n\nPara two.",
            "url": format!("https://example.com/{id}"),
            "urlToImage": format!("https://example.com/{id}.jpg"),
            "publishedAt": "2024-01-01T00:00:00Z",
            "source": { "name": "Wire" },
            "category": category
        })
    }

    fn client_for(server: &MockServer) -> HttpArticleClient {
        HttpArticleClient::new(&server.uri(), Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn test_list_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                article_json("1", "technology"),
                article_json("2", "sports"),
            ])))
            .mount(&server)
            .await;

        let articles = client_for(&server).list_articles().await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[1].category, "sports");
    }

    #[tokio::test]
    async fn test_list_articles_by_category_sends_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles"))
            .and(query_param("category", "sports"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([article_json("2", "sports")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let articles = client_for(&server)
            .list_articles_by_category("sports")
            .await
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id, "2");
    }

    #[tokio::test]
    async fn test_get_article_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
            .mount(&server)
            .await;

        let result = client_for(&server).get_article("missing").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_article_posts_draft() {
        let server = MockServer::start().await;
        let draft = ArticleDraft {
            title: "New".to_string(),
            description: "D".to_string(),
            content: "C".to_string(),
            url: "https://example.com/new".to_string(),
            url_to_image: "https://example.com/new.jpg".to_string(),
            published_at: "2024-01-01T00:00:00Z".to_string(),
            source: Source {
                name: "Wire".to_string(),
            },
            category: "business".to_string(),
            author: Some("Sarah Chen".to_string()),
        };

        Mock::given(method("POST"))
            .and(path("/articles"))
            .and(body_json(serde_json::to_value(&draft).unwrap()))
            .respond_with(ResponseTemplate::new(201).set_body_json(article_json("42", "business")))
            .expect(1)
            .mount(&server)
            .await;

        let created = client_for(&server).create_article(&draft).await.unwrap();
        assert_eq!(created.id, "42");
    }

    #[tokio::test]
    async fn test_update_article_patches_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/articles/7"))
            .and(body_json(json!({ "title": "Renamed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(article_json("7", "x")))
            .expect(1)
            .mount(&server)
            .await;

        let patch = ArticlePatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = client_for(&server).update_article("7", &patch).await.unwrap();
        assert_eq!(updated.id, "7");
    }

    #[tokio::test]
    async fn test_delete_article() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/articles/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/articles/8"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.delete_article("7").await.unwrap();
        assert!(matches!(
            client.delete_article("8").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_category_by_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(query_param("slug", "sports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "slug": "sports", "name": "Sports", "icon": "⚽" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(query_param("slug", "nope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let category = client.get_category_by_slug("sports").await.unwrap();
        assert_eq!(category.map(|c| c.name), Some("Sports".to_string()));
        assert_eq!(client.get_category_by_slug("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client_for(&server).list_categories().await;
        assert_eq!(
            result,
            Err(ApiError::Server {
                status: 500,
                body: "boom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "not": "a list" })))
            .mount(&server)
            .await;

        let result = client_for(&server).list_articles().await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpArticleClient::new(
            &server.uri(),
            Duration::from_secs(5),
            Some(SecretString::from("secret-token")),
        )
        .unwrap();
        assert!(client.list_categories().await.unwrap().is_empty());
        assert!(!format!("{client:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) is not listening on test hosts
        let client =
            HttpArticleClient::new("http://127.0.0.1:9", Duration::from_secs(2), None).unwrap();
        let result = client.list_articles().await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[test]
    fn test_base_url_validation() {
        let timeout = Duration::from_secs(1);
        assert!(HttpArticleClient::new("http://localhost:3001", timeout, None).is_ok());
        assert!(HttpArticleClient::new("https://news.example.com/api/", timeout, None).is_ok());
        assert!(matches!(
            HttpArticleClient::new("not a url", timeout, None),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpArticleClient::new("ftp://example.com", timeout, None),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            HttpArticleClient::new("https://news.example.com/api/", Duration::from_secs(1), None)
                .unwrap();
        assert_eq!(
            client.endpoint(&["articles", "5"]).as_str(),
            "https://news.example.com/api/articles/5"
        );
    }
}
