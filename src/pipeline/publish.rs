use chrono::Utc;

use super::batch::{run_batch, BatchKind, BatchSummary, ItemReport};
use super::{Pipeline, PipelineError};
use crate::publish::{NewPost, PostStatus};
use crate::storage::PublishedPost;

impl Pipeline {
    /// Publish every selected, rewritten item and record each created post.
    ///
    /// The credentials check only looks for a complete saved record; the site
    /// itself is first contacted by the per-item requests.
    pub async fn publish_selected(
        &self,
        status: PostStatus,
    ) -> Result<BatchSummary, PipelineError> {
        let credentials = self
            .db
            .load_credentials()
            .await?
            .filter(|c| c.is_complete())
            .ok_or(PipelineError::MissingCredentials)?;

        let items = self.library.publishable().await?;
        if items.is_empty() {
            return Err(PipelineError::NothingToPublish);
        }

        let credentials = &credentials;

        run_batch(
            BatchKind::Publish,
            &self.publish_tracker,
            &self.events,
            self.max_concurrent(),
            items,
            |item| async move {
                let post = NewPost::new(
                    item.title.as_str(),
                    item.publish_body(),
                    item.excerpt.as_str(),
                    status,
                );

                let outcome = match self.publisher.publish(credentials, &post).await {
                    Ok(outcome) => outcome,
                    Err(e) => return ItemReport::failure(item.id, item.title, e.to_string()),
                };
                if !outcome.success {
                    return ItemReport::failure(item.id, item.title, outcome.message);
                }

                let Some(post_id) = outcome.post_id else {
                    return ItemReport::failure(item.id, item.title, "Site returned no post id");
                };
                let url = outcome
                    .link
                    .unwrap_or_else(|| format!("{}/?p={}", credentials.base_url(), post_id));
                let record = PublishedPost {
                    post_id,
                    title: item.title.clone(),
                    date: Utc::now(),
                    url,
                };

                if let Err(e) = self.history.append(record).await {
                    tracing::warn!(post_id, error = %e, "Failed to record published post");
                }
                ItemReport::success(item.id, item.title, outcome.message)
            },
        )
        .await
    }
}
