//! Publishing to a WordPress site through its REST API.

use crate::storage::Credentials;
use clap::ValueEnum;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const USERS_ME_PATH: &str = "/wp-json/wp/v2/users/me";
const POSTS_PATH: &str = "/wp-json/wp/v2/posts";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Request timed out")]
    Timeout,
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Success status with a body that is not a post object
    #[error("Unexpected response from site: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PublishError::Timeout
        } else if err.is_decode() {
            PublishError::Decode(err.to_string())
        } else {
            PublishError::Network(err)
        }
    }
}

/// Visibility of a created post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publish,
    #[default]
    Draft,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PostStatus::Publish => "publish",
            PostStatus::Draft => "draft",
        })
    }
}

/// Body of a create-post request.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<u64>>,
}

impl NewPost {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        excerpt: impl Into<String>,
        status: PostStatus,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            excerpt: excerpt.into(),
            status,
            categories: None,
            tags: None,
        }
    }
}

/// Result of a create-post call that reached the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub success: bool,
    pub message: String,
    pub post_id: Option<u64>,
    /// Permalink of the created post, when the site returned one.
    pub link: Option<String>,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: u64,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Clone)]
pub struct WordPressClient {
    client: reqwest::Client,
}

impl WordPressClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Check that the credentials authenticate against the site.
    ///
    /// Any failure, including an unreachable host, yields `false`.
    pub async fn validate_connection(&self, credentials: &Credentials) -> bool {
        let url = format!("{}{}", credentials.base_url(), USERS_ME_PATH);
        warn_if_plain_http(credentials.base_url());

        let result = self
            .client
            .get(&url)
            .basic_auth(
                &credentials.username,
                Some(credentials.application_password.expose_secret()),
            )
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(site = %credentials.base_url(), status = response.status().as_u16(), "Connection check rejected");
                false
            }
            Err(e) => {
                tracing::warn!(site = %credentials.base_url(), error = %e, "Connection check failed");
                false
            }
        }
    }

    /// Create a post.
    ///
    /// A non-success status is not an error: it yields an outcome with
    /// `success: false` and the response body in the message.
    ///
    /// # Errors
    ///
    /// Transport failures, and success responses that are not a post object.
    pub async fn publish(
        &self,
        credentials: &Credentials,
        post: &NewPost,
    ) -> Result<PublishOutcome, PublishError> {
        let url = format!("{}{}", credentials.base_url(), POSTS_PATH);
        warn_if_plain_http(credentials.base_url());

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &credentials.username,
                Some(credentials.application_password.expose_secret()),
            )
            .json(post)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(site = %credentials.base_url(), status = status.as_u16(), "Publish rejected");
            return Ok(PublishOutcome {
                success: false,
                message: format!("Failed to publish: {}", body.trim()),
                post_id: None,
                link: None,
            });
        }

        let created: CreatedPost = response.json().await?;
        tracing::info!(post_id = created.id, status = %post.status, "Published post");
        Ok(PublishOutcome {
            success: true,
            message: "Post published successfully".to_string(),
            post_id: Some(created.id),
            link: created.link,
        })
    }
}

fn warn_if_plain_http(base: &str) {
    if base.starts_with("http://") && !crate::util::is_secure_or_loopback(base) {
        tracing::warn!(site = %base, "Sending credentials over plain HTTP");
    }
}
