use crate::fetch::{FetchFailure, FetchPolicy, FetchedPage};
use async_trait::async_trait;

/// Anything that can turn a URL into page content
///
/// Implementations own their retry behaviour: a returned [`FetchFailure`] is
/// final for that URL as far as the crawler is concerned.
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Fetches `url` under `policy`
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<FetchedPage, FetchFailure>;
}

#[async_trait]
impl<T: FetchPort + ?Sized> FetchPort for &T {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<FetchedPage, FetchFailure> {
        (**self).fetch(url, policy).await
    }
}

#[async_trait]
impl<T: FetchPort + ?Sized> FetchPort for Box<T> {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<FetchedPage, FetchFailure> {
        (**self).fetch(url, policy).await
    }
}
