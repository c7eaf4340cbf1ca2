//! The content library: the persisted list of fetched items.
//!
//! Every mutation loads the whole list, transforms it and writes it back inside
//! one SQLite write transaction, so batches running side by side (in this
//! process or another one on the same file) cannot interleave their
//! read-modify-write cycles.

use anyhow::Result;

use super::schema::Database;
use super::types::{ContentItem, LibraryStats, SCRAPED_CONTENT_KEY};

/// Store object owning the `scraped_content` list.
#[derive(Clone)]
pub struct ContentLibrary {
    db: Database,
}

impl ContentLibrary {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All items in insertion order.
    pub async fn list(&self) -> Result<Vec<ContentItem>> {
        Ok(self
            .db
            .get_json::<Vec<ContentItem>>(SCRAPED_CONTENT_KEY)
            .await?
            .unwrap_or_default())
    }

    /// A copy of the item with `id`, if present.
    pub async fn get(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(self.list().await?.into_iter().find(|item| item.id == id))
    }

    /// Items with `selected` set.
    pub async fn selected(&self) -> Result<Vec<ContentItem>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|item| item.selected)
            .collect())
    }

    /// Items that are selected and carry a rewritten variant.
    pub async fn publishable(&self) -> Result<Vec<ContentItem>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(ContentItem::is_publishable)
            .collect())
    }

    pub async fn stats(&self) -> Result<LibraryStats> {
        let items = self.list().await?;
        Ok(LibraryStats {
            total: items.len(),
            selected: items.iter().filter(|i| i.selected).count(),
            reformed: items.iter().filter(|i| i.reformed_text().is_some()).count(),
        })
    }

    /// Append one item.
    pub async fn add(&self, item: ContentItem) -> Result<()> {
        self.mutate(|items| items.push(item)).await
    }

    /// Append a batch of items in a single write.
    pub async fn add_many(&self, new_items: Vec<ContentItem>) -> Result<usize> {
        let count = new_items.len();
        self.mutate(|items| items.extend(new_items)).await?;
        Ok(count)
    }

    /// Flip `selected` on the matching item.
    ///
    /// Returns the new state, or `None` (and writes nothing) if no item matches.
    pub async fn toggle_select(&self, id: &str) -> Result<Option<bool>> {
        self.mutate_if(|items| {
            items.iter_mut().find(|item| item.id == id).map(|item| {
                item.selected = !item.selected;
                item.selected
            })
        })
        .await
    }

    /// Set `selected` on every item. Returns the number of items.
    pub async fn set_all(&self, selected: bool) -> Result<usize> {
        self.mutate(|items| {
            for item in items.iter_mut() {
                item.selected = selected;
            }
            items.len()
        })
        .await
    }

    /// Delete the matching item. Returns whether one was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let removed = self
            .mutate_if(|items| {
                let before = items.len();
                items.retain(|item| item.id != id);
                (items.len() != before).then_some(())
            })
            .await?;
        Ok(removed.is_some())
    }

    /// Store the rewritten variant on the matching item.
    ///
    /// Returns false if the item was deleted in the meantime.
    pub async fn set_reformed(&self, id: &str, text: impl Into<String>) -> Result<bool> {
        let text = text.into();
        let updated = self
            .mutate_if(|items| {
                items
                    .iter_mut()
                    .find(|item| item.id == id)
                    .map(|item| item.reformed = Some(text))
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Read-modify-write the whole list in one write transaction.
    async fn mutate<R>(&self, f: impl FnOnce(&mut Vec<ContentItem>) -> R) -> Result<R> {
        let result = self
            .db
            .update_json(SCRAPED_CONTENT_KEY, |items: &mut Vec<ContentItem>| {
                Some(f(items))
            })
            .await?;
        result.ok_or_else(|| anyhow::anyhow!("library update produced no result"))
    }

    /// Like [`Self::mutate`], but only writes when `f` reports a change.
    async fn mutate_if<R>(
        &self,
        f: impl FnOnce(&mut Vec<ContentItem>) -> Option<R>,
    ) -> Result<Option<R>> {
        self.db.update_json(SCRAPED_CONTENT_KEY, f).await
    }
}
