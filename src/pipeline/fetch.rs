use super::batch::{run_batch, BatchKind, BatchSummary, ItemReport};
use super::events::PipelineEvent;
use super::{Pipeline, PipelineError};

/// Message shown for any page that could not be scraped. Detail goes to the log.
const FETCH_FAILED: &str = "Failed to fetch content from URL";

impl Pipeline {
    /// Scrape each URL into the library, one item per page.
    ///
    /// Blank entries are ignored. Each successful page is persisted before
    /// the next request starts.
    pub async fn fetch_urls<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<BatchSummary, PipelineError> {
        let urls: Vec<String> = urls
            .iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(PipelineError::NoUrls);
        }

        run_batch(
            BatchKind::Fetch,
            &self.fetch_tracker,
            &self.events,
            self.max_concurrent(),
            urls,
            |url| async move {
                let Some(item) = self.source.fetch_by_url(&url).await else {
                    return ItemReport::failure(url.as_str(), url.as_str(), FETCH_FAILED);
                };
                let (id, title) = (item.id.clone(), item.title.clone());
                match self.library.add(item).await {
                    Ok(()) => ItemReport::success(id, title, format!("Fetched {url}")),
                    Err(e) => ItemReport::failure(id, title, format!("Failed to save: {e}")),
                }
            },
        )
        .await
    }

    /// Import every entry of a feed with a single library write.
    ///
    /// Returns the number of items added.
    pub async fn fetch_feed(&self, feed_url: &str) -> Result<usize, PipelineError> {
        let feed_url = feed_url.trim();
        if feed_url.is_empty() {
            return Err(PipelineError::NoUrls);
        }

        let _guard = self
            .fetch_tracker
            .try_start(1)
            .ok_or(PipelineError::BatchInProgress(BatchKind::Fetch))?;

        let items = self.source.fetch_by_rss(feed_url).await;
        if items.is_empty() {
            return Err(PipelineError::EmptyFeed);
        }

        let added = self.library.add_many(items).await?;
        tracing::info!(url = %feed_url, added, "Imported feed");
        self.events.emit(PipelineEvent::LibraryChanged);
        Ok(added)
    }
}
