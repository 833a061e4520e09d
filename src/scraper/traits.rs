use crate::model::FetchError;

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the body of one page; a non-2xx status is an error.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
