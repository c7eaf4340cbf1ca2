use anyhow::Result;
use secrecy::SecretString;

use super::schema::Database;
use super::types::{Credentials, API_KEY_KEY, WP_CREDENTIALS_KEY};

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Destination site credentials, if saved.
    pub async fn load_credentials(&self) -> Result<Option<Credentials>> {
        self.get_json(WP_CREDENTIALS_KEY).await
    }

    /// Overwrite the saved credentials wholesale.
    pub async fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.set_json(WP_CREDENTIALS_KEY, credentials).await
    }

    /// Saved text-generation API key. Blank values count as unset.
    pub async fn load_api_key(&self) -> Result<Option<SecretString>> {
        let key: Option<String> = self.get_json(API_KEY_KEY).await?;
        Ok(key
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from))
    }

    pub async fn save_api_key(&self, key: &str) -> Result<()> {
        self.set_json(API_KEY_KEY, key.trim()).await
    }

    pub async fn clear_api_key(&self) -> Result<bool> {
        self.remove(API_KEY_KEY).await
    }
}
