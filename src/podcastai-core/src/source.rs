//! Text acquisition.

use async_trait::async_trait;

use crate::chunker::SourceDocument;
use crate::error::Result;

/// Fetches the source text for a topic.
///
/// Implementations must resolve the topic exactly. A topic that matches no
/// page fails with `AcquisitionError::NotFound` and a disambiguation page
/// fails with `AcquisitionError::Ambiguous`; neither falls back to a search
/// suggestion.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn fetch(&self, topic: &str) -> Result<SourceDocument>;
}
