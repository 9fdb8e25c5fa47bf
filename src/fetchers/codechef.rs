//! CodeChef "client".
//!
//! CodeChef publishes no public API, so statistics come from reading the
//! profile page with the [`ProfileExtractor`]. The profile page has no
//! submission history: activities are always empty.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::PlatformFetcher;
use crate::extractor::ProfileExtractor;
use crate::model::{FetchResult, Platform};

#[derive(Clone)]
pub struct CodechefFetcher {
    extractor: Arc<dyn ProfileExtractor>,
}

impl CodechefFetcher {
    pub fn new(extractor: Arc<dyn ProfileExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl PlatformFetcher for CodechefFetcher {
    fn platform(&self) -> Platform {
        Platform::Codechef
    }

    async fn fetch(&self, handle: &str) -> FetchResult {
        info!(handle = %handle, "CodeChef has no public API, reading profile page");

        FetchResult {
            activities: Vec::new(),
            stats: self.extractor.extract(Platform::Codechef, handle).await,
        }
    }
}
