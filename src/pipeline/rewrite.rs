use secrecy::SecretString;

use super::batch::{run_batch, BatchKind, BatchSummary, ItemReport};
use super::{Pipeline, PipelineError};
use crate::rewrite::{markup, RewriteOptions};

impl Pipeline {
    /// Resolve the API key: explicit argument, then config, then the stored key.
    ///
    /// Blank values are skipped.
    pub async fn resolve_api_key(
        &self,
        explicit: Option<SecretString>,
    ) -> Result<Option<SecretString>, PipelineError> {
        use secrecy::ExposeSecret;

        if let Some(key) = explicit.filter(|k| !k.expose_secret().trim().is_empty()) {
            return Ok(Some(key));
        }
        if let Some(key) = self
            .config
            .rewrite
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            return Ok(Some(SecretString::from(key)));
        }
        Ok(self.db.load_api_key().await?)
    }

    /// Rewrite every selected item and store the result on it.
    ///
    /// Each result is saved before the next item is sent. Items removed from
    /// the library mid-batch are reported as failures.
    pub async fn rewrite_selected(
        &self,
        options: RewriteOptions,
        api_key: Option<SecretString>,
    ) -> Result<BatchSummary, PipelineError> {
        let api_key = self
            .resolve_api_key(api_key)
            .await?
            .ok_or(PipelineError::MissingApiKey)?;

        let items = self.library.selected().await?;
        if items.is_empty() {
            return Err(PipelineError::NothingSelected);
        }

        let render_markdown = self.config.rewrite.render_markdown;
        let api_key = &api_key;
        let options = &options;

        run_batch(
            BatchKind::Rewrite,
            &self.rewrite_tracker,
            &self.events,
            self.max_concurrent(),
            items,
            |item| async move {
                let text = match self.rewriter.rewrite(&item.content, api_key, options).await {
                    Ok(text) => text,
                    Err(e) => return ItemReport::failure(item.id, item.title, e.to_string()),
                };
                let html = if render_markdown && !markup::looks_like_html(&text) {
                    markup::to_html(&text)
                } else {
                    text
                };

                match self.library.set_reformed(&item.id, html).await {
                    Ok(true) => ItemReport::success(item.id, item.title, "Rewritten"),
                    Ok(false) => ItemReport::failure(
                        item.id,
                        item.title,
                        "Item was deleted before the rewrite could be saved",
                    ),
                    Err(e) => {
                        ItemReport::failure(item.id, item.title, format!("Failed to save: {e}"))
                    }
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::pipeline::{Pipeline, PipelineError};
    use crate::rewrite::RewriteOptions;
    use crate::storage::{ContentItem, Database};
    use chrono::Utc;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_pipeline(config: Config) -> Pipeline {
        Pipeline::new(Database::open(":memory:").await.unwrap(), config).unwrap()
    }

    #[tokio::test]
    async fn test_missing_api_key_checked_first() {
        let pipeline = test_pipeline(Config::default()).await;
        let result = pipeline
            .rewrite_selected(RewriteOptions::default(), None)
            .await;
        assert!(matches!(result, Err(PipelineError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_nothing_selected() {
        let pipeline = test_pipeline(Config::default()).await;
        let item = ContentItem::new("page", "t", "c", "", "https://example.com", Utc::now());
        pipeline.library().add(item).await.unwrap();

        let result = pipeline
            .rewrite_selected(RewriteOptions::default(), Some(SecretString::from("sk")))
            .await;
        assert!(matches!(result, Err(PipelineError::NothingSelected)));
    }

    #[tokio::test]
    async fn test_api_key_precedence() {
        let mut config = Config::default();
        config.rewrite.api_key = Some("from-config".to_string());
        let pipeline = test_pipeline(config).await;
        pipeline.database().save_api_key("from-store").await.unwrap();

        let key = pipeline
            .resolve_api_key(Some(SecretString::from("explicit")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.expose_secret(), "explicit");

        let key = pipeline.resolve_api_key(None).await.unwrap().unwrap();
        assert_eq!(key.expose_secret(), "from-config");

        let pipeline = test_pipeline(Config::default()).await;
        pipeline.database().save_api_key("from-store").await.unwrap();
        let key = pipeline
            .resolve_api_key(Some(SecretString::from("  ")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.expose_secret(), "from-store");
    }

    #[tokio::test]
    async fn test_markdown_reply_stored_as_html() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-stored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "## Better\n\nWords."}}]
            })))
            .mount(&mock_server)
            .await;

        let mut config = Config::default();
        config.rewrite.api_base = mock_server.uri();
        config.rewrite.render_markdown = true;
        let pipeline = test_pipeline(config).await;
        pipeline.database().save_api_key("sk-stored").await.unwrap();

        let item = ContentItem::new(
            "page",
            "t",
            "<p>old</p>",
            "",
            "https://example.com",
            Utc::now(),
        );
        let id = item.id.clone();
        pipeline.library().add(item).await.unwrap();
        pipeline.library().toggle_select(&id).await.unwrap();

        let summary = pipeline
            .rewrite_selected(RewriteOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(summary.tally.succeeded, 1);

        let stored = pipeline.library().get(&id).await.unwrap().unwrap();
        assert_eq!(
            stored.reformed.as_deref(),
            Some("<h2>Better</h2>\n<p>Words.</p>")
        );
        assert_eq!(stored.content, "<p>old</p>");
    }

    async fn rewrite_one(config: Config, reply: &str) -> Option<String> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(&mock_server)
            .await;

        let mut config = config;
        config.rewrite.api_base = mock_server.uri();
        let pipeline = test_pipeline(config).await;

        let mut item = ContentItem::new(
            "page",
            "t",
            "<p>old</p>",
            "",
            "https://example.com",
            Utc::now(),
        );
        item.selected = true;
        let id = item.id.clone();
        pipeline.library().add(item).await.unwrap();

        pipeline
            .rewrite_selected(RewriteOptions::default(), Some(SecretString::from("sk")))
            .await
            .unwrap();
        pipeline.library().get(&id).await.unwrap().unwrap().reformed
    }

    #[tokio::test]
    async fn test_html_reply_stored_verbatim_by_default() {
        let reply = "<p>Intro paragraph.</p>\n\n    <p>Indented second paragraph.</p>";
        assert_eq!(
            rewrite_one(Config::default(), reply).await.as_deref(),
            Some(reply)
        );
    }

    #[tokio::test]
    async fn test_html_reply_not_rendered_as_markdown() {
        let mut config = Config::default();
        config.rewrite.render_markdown = true;
        let reply = "<p>Intro paragraph.</p>\n\n    <p>Indented second paragraph.</p>";
        assert_eq!(rewrite_one(config, reply).await.as_deref(), Some(reply));
    }
}
