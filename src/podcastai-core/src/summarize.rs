//! Map-reduce summarization: one highlight extraction per chunk, then a
//! single consolidation pass over all highlights.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::chunker::TextChunk;
use crate::completion::{CompletionService, sanitize_response};
use crate::config::{ModelsConfig, PromptsConfig};
use crate::error::{PodcastError, Result};

/// Condensed facts produced from all chunks of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactSummary(pub String);

impl FactSummary {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Settings for one summarization run.
#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub map_instruction: String,
    pub reduce_instruction: String,
    pub temperature: f32,
    pub concurrency: usize,
}

impl SummarizeOptions {
    pub fn from_config(prompts: &PromptsConfig, models: &ModelsConfig) -> Self {
        Self {
            map_instruction: prompts.map_instruction.clone(),
            reduce_instruction: prompts.reduce_instruction.clone(),
            temperature: models.summary_temperature,
            concurrency: models.map_concurrency.max(1),
        }
    }
}

/// Extract highlights from every chunk, in chunk order.
///
/// Requests run up to `concurrency` at a time; results are still returned in
/// the order of `chunks`. The first failure aborts the whole step.
pub async fn map_highlights(
    service: &dyn CompletionService,
    chunks: &[TextChunk],
    options: &SummarizeOptions,
) -> Result<Vec<String>> {
    let highlights: Vec<String> = stream::iter(chunks.iter())
        .map(|chunk| async move {
            let user = format!("Text: \"{}\"\nHighlights:", chunk.content);
            let response = service
                .complete(&options.map_instruction, &user, options.temperature)
                .await?;
            debug!(chunk = chunk.index, chars = response.len(), "extracted highlights");
            Ok::<_, PodcastError>(sanitize_response(&response))
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    Ok(highlights)
}

/// Consolidate highlights into one summary grouped by topic.
pub async fn reduce_highlights(
    service: &dyn CompletionService,
    highlights: &[String],
    options: &SummarizeOptions,
) -> Result<FactSummary> {
    let user = format!("Summary: {}", highlights.join("\n\n"));
    let response = service
        .complete(&options.reduce_instruction, &user, options.temperature)
        .await?;
    Ok(FactSummary(sanitize_response(&response)))
}

/// Run the full map-reduce over `chunks`.
pub async fn summarize(
    service: &dyn CompletionService,
    chunks: &[TextChunk],
    options: &SummarizeOptions,
) -> Result<FactSummary> {
    info!(chunks = chunks.len(), concurrency = options.concurrency, "summarizing");
    let highlights = map_highlights(service, chunks, options).await?;
    let summary = reduce_highlights(service, &highlights, options).await?;
    info!(chars = summary.0.len(), "summary ready");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ResponseShape;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echoes the chunk text back and records every call.
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<(String, String)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl CompletionService for RecordingService {
        async fn complete(&self, system: &str, user: &str, _temperature: f32) -> Result<String> {
            // Later chunks finish first to exercise reordering.
            if user.contains("chunk-0") {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            if let Some(marker) = self.fail_on {
                if user.contains(marker) {
                    return Err(PodcastError::provider("fake", "boom"));
                }
            }
            if system == "reduce" {
                return Ok(format!("REDUCED[{}]", user));
            }
            let tag = user
                .split('"')
                .nth(1)
                .unwrap_or_default()
                .to_string();
            Ok(format!("<think>hmm</think>hl:{}", tag))
        }

        async fn complete_structured(
            &self,
            _system: &str,
            _user: &str,
            _temperature: f32,
            _shape: &ResponseShape,
        ) -> Result<Value> {
            unreachable!()
        }
    }

    fn chunks(n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|i| TextChunk {
                index: i,
                content: format!("chunk-{}", i),
                tokens: 1,
            })
            .collect()
    }

    fn options(concurrency: usize) -> SummarizeOptions {
        SummarizeOptions {
            map_instruction: "map".to_string(),
            reduce_instruction: "reduce".to_string(),
            temperature: 0.0,
            concurrency,
        }
    }

    #[tokio::test]
    async fn test_map_then_single_reduce() {
        let service = RecordingService::default();
        let summary = summarize(&service, &chunks(3), &options(1)).await.unwrap();

        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.iter().filter(|(s, _)| s == "reduce").count(), 1);
        assert_eq!(
            summary.as_str(),
            "REDUCED[Summary: hl:chunk-0\n\nhl:chunk-1\n\nhl:chunk-2]"
        );
    }

    #[tokio::test]
    async fn test_concurrent_map_preserves_chunk_order() {
        let service = RecordingService::default();
        let highlights = map_highlights(&service, &chunks(4), &options(4)).await.unwrap();
        assert_eq!(
            highlights,
            vec!["hl:chunk-0", "hl:chunk-1", "hl:chunk-2", "hl:chunk-3"]
        );
    }

    #[tokio::test]
    async fn test_map_failure_aborts_without_reduce() {
        let service = RecordingService {
            fail_on: Some("chunk-1"),
            ..Default::default()
        };
        let result = summarize(&service, &chunks(3), &options(1)).await;

        assert!(matches!(result, Err(PodcastError::Provider { .. })));
        let calls = service.calls.lock().unwrap();
        assert!(calls.iter().all(|(s, _)| s != "reduce"));
        assert_eq!(calls.len(), 2);
    }
}
