//! Client for the content-metadata service, the source of post tags and of
//! tag searches.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("content service answered with status {0}")]
    Status(StatusCode),
    #[error("invalid content response: {0}")]
    Decode(String),
    #[error("invalid content service url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait ContentMetadata: Send + Sync {
    /// Tags attached to a post.
    async fn post_tags(&self, post_id: &str) -> Result<Vec<String>, ContentError>;

    /// Ids of posts carrying `tag`, at most `page_size` of them.
    async fn posts_by_tag(&self, tag: &str, page_size: usize)
        -> Result<Vec<String>, ContentError>;
}

#[derive(Deserialize)]
struct PostTags {
    tags: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct PostPage {
    #[serde(alias = "entities")]
    posts: Option<Vec<Value>>,
}

/// Search results come either wrapped in a page object or as a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<Value>),
    Page(PostPage),
}

impl SearchResponse {
    fn post_ids(self) -> Vec<String> {
        let posts = match self {
            SearchResponse::List(posts) => posts,
            SearchResponse::Page(page) => page.posts.unwrap_or_default(),
        };
        posts.iter().filter_map(post_id).collect()
    }
}

fn post_id(post: &Value) -> Option<String> {
    match post.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

pub struct HttpContentClient {
    client: reqwest::Client,
    base_url: Url,
    tags_timeout: Duration,
    search_timeout: Duration,
}

impl HttpContentClient {
    pub fn new(
        base_url: &str,
        tags_timeout: Duration,
        search_timeout: Duration,
    ) -> Result<Self, ContentError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ContentError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ContentError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent("reco-service")
            .build()?;

        Ok(Self {
            client,
            base_url,
            tags_timeout,
            search_timeout,
        })
    }

    /// `{base}/api/posts[/{segment}]`, keeping any path prefix of the base.
    fn posts_url(&self, post_id: Option<&str>) -> Result<Url, ContentError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ContentError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["api", "posts"]);
            if let Some(post_id) = post_id {
                segments.push(post_id);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<T, ContentError> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ContentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ContentMetadata for HttpContentClient {
    #[instrument(skip(self))]
    async fn post_tags(&self, post_id: &str) -> Result<Vec<String>, ContentError> {
        let url = self.posts_url(Some(post_id))?;
        let post: PostTags = self.get_json(url, self.tags_timeout).await?;

        Ok(post
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tag| match tag {
                Value::String(tag) if !tag.is_empty() => Some(tag),
                _ => None,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn posts_by_tag(
        &self,
        tag: &str,
        page_size: usize,
    ) -> Result<Vec<String>, ContentError> {
        let mut url = self.posts_url(None)?;
        url.query_pairs_mut()
            .append_pair("tag", tag)
            .append_pair("pageSize", &page_size.to_string());

        let response: SearchResponse = self.get_json(url, self.search_timeout).await?;
        Ok(response.post_ids())
    }
}
