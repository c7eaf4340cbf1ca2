use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Storage Keys
// ============================================================================

/// Key holding the content library (`Vec<ContentItem>`).
pub const SCRAPED_CONTENT_KEY: &str = "scraped_content";
/// Key holding the destination site credentials.
pub const WP_CREDENTIALS_KEY: &str = "wp_credentials";
/// Key holding the publishing history (`Vec<PublishedPost>`).
pub const PUBLISHING_HISTORY_KEY: &str = "publishing_history";
/// Key holding the text-generation API key.
pub const API_KEY_KEY: &str = "chatgpt_api_key";

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Another presswire process appears to be using the database. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN surface as these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Content Library
// ============================================================================

/// One fetched unit of content, optionally paired with a rewritten variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    /// Source body as HTML.
    pub content: String,
    pub excerpt: String,
    /// Where the content was fetched from.
    pub url: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub selected: bool,
    /// Rewritten body as HTML, set only after a successful rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reformed: Option<String>,
}

impl ContentItem {
    /// Create an unselected, unrewritten item with a fresh identifier.
    ///
    /// `prefix` tags the origin (`page`, `rss`); the suffix is a random v4
    /// UUID so items created in the same millisecond never collide.
    pub fn new(
        prefix: &str,
        title: impl Into<String>,
        content: impl Into<String>,
        excerpt: impl Into<String>,
        url: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_item_id(prefix),
            title: title.into(),
            content: content.into(),
            excerpt: excerpt.into(),
            url: url.into(),
            date,
            selected: false,
            reformed: None,
        }
    }

    /// The rewritten body, if present and not blank.
    pub fn reformed_text(&self) -> Option<&str> {
        self.reformed.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// Selected and carrying a non-empty rewritten variant.
    pub fn is_publishable(&self) -> bool {
        self.selected && self.reformed_text().is_some()
    }

    /// Body sent to the destination site: the rewrite when present, else the source.
    pub fn publish_body(&self) -> &str {
        self.reformed_text().unwrap_or(&self.content)
    }
}

/// Generate a collision-resistant item identifier.
pub fn new_item_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Aggregate counts shown on the library dashboard line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub total: usize,
    pub selected: usize,
    pub reformed: usize,
}

// ============================================================================
// Credentials
// ============================================================================

/// Destination site base URL plus its Basic-auth pair.
///
/// The application password is kept in a [`SecretString`] so that `Debug`
/// output never contains it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub site_url: String,
    pub username: String,
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub application_password: SecretString,
}

impl Credentials {
    pub fn new(
        site_url: impl Into<String>,
        username: impl Into<String>,
        application_password: impl Into<String>,
    ) -> Self {
        Self {
            site_url: site_url.into(),
            username: username.into(),
            application_password: SecretString::from(application_password.into()),
        }
    }

    /// All three fields are present (non-blank).
    pub fn is_complete(&self) -> bool {
        !self.site_url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.application_password.expose_secret().trim().is_empty()
    }

    /// Site URL without trailing slashes, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.site_url.trim().trim_end_matches('/')
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("application_password", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

// ============================================================================
// Publishing History
// ============================================================================

/// A post created on the destination site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPost {
    pub post_id: u64,
    pub title: String,
    pub date: DateTime<Utc>,
    /// Permalink of the created post.
    pub url: String,
}
