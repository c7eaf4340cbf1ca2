mod history;
mod kv;
mod library;
mod schema;
mod settings;
mod types;

pub use history::PublishingHistory;
pub use library::ContentLibrary;
pub use schema::Database;
pub use types::{
    new_item_id, ContentItem, Credentials, DatabaseError, LibraryStats, PublishedPost,
    API_KEY_KEY, PUBLISHING_HISTORY_KEY, SCRAPED_CONTENT_KEY, WP_CREDENTIALS_KEY,
};
