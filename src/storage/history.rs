use anyhow::Result;

use super::schema::Database;
use super::types::{PublishedPost, PUBLISHING_HISTORY_KEY};

/// Append-only log of posts created on the destination site.
#[derive(Clone)]
pub struct PublishingHistory {
    db: Database,
}

impl PublishingHistory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<PublishedPost>> {
        let mut posts = self.load().await?;
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    pub async fn append(&self, post: PublishedPost) -> Result<()> {
        self.db
            .update_json(PUBLISHING_HISTORY_KEY, |posts: &mut Vec<PublishedPost>| {
                posts.push(post);
                Some(())
            })
            .await?;
        Ok(())
    }

    /// Drop every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let count = self
            .db
            .update_json(PUBLISHING_HISTORY_KEY, |posts: &mut Vec<PublishedPost>| {
                let count = posts.len();
                posts.clear();
                Some(count)
            })
            .await?;
        Ok(count.unwrap_or_default())
    }

    async fn load(&self) -> Result<Vec<PublishedPost>> {
        Ok(self
            .db
            .get_json(PUBLISHING_HISTORY_KEY)
            .await?
            .unwrap_or_default())
    }
}
