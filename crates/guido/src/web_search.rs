use anyhow::Result;
use async_trait::async_trait;

/// A capability that answers a query with fresh information from the web
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}
