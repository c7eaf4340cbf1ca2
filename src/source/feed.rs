use chrono::Utc;
use feed_rs::parser;

use super::SourceError;
use crate::storage::ContentItem;
use crate::util::excerpt_head;

/// Parse RSS or Atom bytes into one content item per entry.
///
/// Content prefers the full-content element (`content:encoded`) over the
/// `description` summary. Entries without a date are stamped with now.
pub fn parse_feed_items(bytes: &[u8]) -> Result<Vec<ContentItem>, SourceError> {
    let feed = parser::parse(bytes).map_err(|e| SourceError::Parse(e.to_string()))?;
    let now = Utc::now();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .map(|c| c.trim().to_string())
                .unwrap_or_default();
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let date = entry.published.or(entry.updated).unwrap_or(now);
            let excerpt = excerpt_head(&content);

            ContentItem::new("rss", title, content, excerpt, url, date)
        })
        .collect();

    Ok(items)
}
