//! Orchestrators tying sources, the rewriter and the publisher to the library.
//!
//! `Pipeline` is cheap to clone; clones share the database, the writer locks
//! and the per-kind batch trackers, so two clones cannot run overlapping
//! batches of the same kind.

mod batch;
mod events;
mod fetch;
mod publish;
mod rewrite;

pub use batch::{
    progress_percent, BatchGuard, BatchKind, BatchState, BatchSummary, BatchTracker, ItemOutcome,
    ItemReport, Tally,
};
pub use events::{EventBus, EventReceiver, PipelineEvent, DEFAULT_CAPACITY};

use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::publish::WordPressClient;
use crate::rewrite::Rewriter;
use crate::source::SourceClient;
use crate::storage::{ContentLibrary, Credentials, Database, PublishingHistory};

/// Reasons an orchestrator refuses to start. Reported before any network call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No URLs provided")]
    NoUrls,
    #[error("No content found in RSS feed")]
    EmptyFeed,
    #[error("API key is not set. Use `presswire api-key <KEY>` or set OPENAI_API_KEY")]
    MissingApiKey,
    #[error("No content selected")]
    NothingSelected,
    #[error("WordPress credentials are not configured. Use `presswire connect` first")]
    MissingCredentials,
    #[error("No selected content has been rewritten yet")]
    NothingToPublish,
    #[error("A {0} batch is already running")]
    BatchInProgress(BatchKind),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    library: ContentLibrary,
    history: PublishingHistory,
    source: SourceClient,
    rewriter: Rewriter,
    publisher: WordPressClient,
    events: EventBus,
    config: Arc<Config>,
    fetch_tracker: BatchTracker,
    rewrite_tracker: BatchTracker,
    publish_tracker: BatchTracker,
}

impl Pipeline {
    /// Wire every adapter to one HTTP client built from `config.http`.
    pub fn new(db: Database, config: Config) -> Result<Self, PipelineError> {
        let client = config.http.build_client()?;

        let source = SourceClient::new(client.clone(), config.http.allow_private_hosts);
        let rewriter = Rewriter::new(client.clone())
            .with_api_base(config.rewrite.api_base.as_str())
            .with_model(config.rewrite.model.as_str(), config.rewrite.temperature);
        let publisher = WordPressClient::new(client);

        Ok(Self {
            library: ContentLibrary::new(db.clone()),
            history: PublishingHistory::new(db.clone()),
            db,
            source,
            rewriter,
            publisher,
            events: EventBus::default(),
            config: Arc::new(config),
            fetch_tracker: BatchTracker::default(),
            rewrite_tracker: BatchTracker::default(),
            publish_tracker: BatchTracker::default(),
        })
    }

    pub fn library(&self) -> &ContentLibrary {
        &self.library
    }

    pub fn history(&self) -> &PublishingHistory {
        &self.history
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self, kind: BatchKind) -> &BatchTracker {
        match kind {
            BatchKind::Fetch => &self.fetch_tracker,
            BatchKind::Rewrite => &self.rewrite_tracker,
            BatchKind::Publish => &self.publish_tracker,
        }
    }

    /// Test the credentials against the site and save them only if they work.
    ///
    /// Returns whether the connection succeeded.
    pub async fn connect(&self, credentials: &Credentials) -> Result<bool, PipelineError> {
        if !credentials.is_complete() {
            return Err(PipelineError::MissingCredentials);
        }
        if !self.publisher.validate_connection(credentials).await {
            return Ok(false);
        }
        self.db.save_credentials(credentials).await?;
        tracing::info!(site = %credentials.base_url(), "Saved WordPress credentials");
        Ok(true)
    }

    fn max_concurrent(&self) -> usize {
        self.config.pipeline.max_concurrent.max(1)
    }
}
