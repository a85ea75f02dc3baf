//! ExplanationPipeline — turns question strings into `{title, explanation}`
//! pairs with caching, batching, and inter-batch pacing.
//!
//! Batches run strictly sequentially to respect provider rate limits: batch
//! N starts only after batch N-1's results are appended, and a fixed delay
//! separates batches (never trailing the last one). A rate-limit error
//! aborts the remaining batches and surfaces; any other per-batch failure
//! degrades that batch to placeholders so the bulk request still completes.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::{
    bulk_explanation_key, explanation_key, ResponseCache, AI_RESPONSES_TTL_SECS,
};
use crate::errors::AppError;
use crate::explain::prompts::{batch_explanation_prompt, single_explanation_prompt};
use crate::genai::{parse_lenient, Parsed, ProviderError, TextGenerator};

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);
/// Stored for a whole batch when the provider response cannot be used.
pub const PLACEHOLDER_EXPLANATION: &str = "Failed to generate specific explanation.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub title: String,
    pub explanation: String,
}

pub struct ExplanationPipeline {
    provider: Arc<dyn TextGenerator>,
    cache: Arc<dyn ResponseCache>,
    batch_size: usize,
    batch_delay: Duration,
}

impl ExplanationPipeline {
    pub fn new(provider: Arc<dyn TextGenerator>, cache: Arc<dyn ResponseCache>) -> Self {
        Self::with_pacing(provider, cache, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_DELAY)
    }

    /// Injectable pacing: tests substitute a small batch size and a zero
    /// delay instead of waiting out real sleeps.
    pub fn with_pacing(
        provider: Arc<dyn TextGenerator>,
        cache: Arc<dyn ResponseCache>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Explains a single question, memoized by the hash of the exact prompt.
    /// A malformed response is recovered as `{title: question, explanation:
    /// raw}` and cached too, so a sticky bad response does not keep hitting
    /// the provider.
    pub async fn explain_one(&self, question: &str) -> Result<Explanation, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question is required".to_string()));
        }

        let prompt = single_explanation_prompt(question);
        let key = explanation_key(&sha256_hex(&prompt));

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(explanation) = serde_json::from_value::<Explanation>(cached) {
                debug!("Explanation cache hit for '{question}'");
                return Ok(explanation);
            }
        }

        let raw = self.provider.generate(&prompt).await?;
        let explanation = match parse_lenient::<Explanation>(&raw) {
            Parsed::Structured(e) => e,
            Parsed::Raw(text) => {
                warn!("Explanation for '{question}' was not structured JSON; storing raw text");
                Explanation {
                    title: question.to_string(),
                    explanation: text,
                }
            }
        };

        if let Ok(value) = serde_json::to_value(&explanation) {
            self.cache.set(&key, &value, AI_RESPONSES_TTL_SECS).await;
        }
        Ok(explanation)
    }

    /// Explains a set of questions in fixed-size batches. The cache key is
    /// order-independent (sorted before hashing, duplicates preserved), so
    /// the same set requested in a different order is still a hit. Results
    /// always come back in input order.
    pub async fn explain_bulk(&self, questions: &[String]) -> Result<Vec<Explanation>, AppError> {
        if questions.is_empty() {
            return Err(AppError::Validation(
                "Questions list must not be empty".to_string(),
            ));
        }

        let key = bulk_explanation_key(&bulk_hash(questions));
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(explanations) = serde_json::from_value::<Vec<Explanation>>(cached) {
                debug!("Bulk explanation cache hit ({} questions)", questions.len());
                return Ok(explanations);
            }
        }

        let mut explanations = Vec::with_capacity(questions.len());
        let batches: Vec<&[String]> = questions.chunks(self.batch_size).collect();
        let total = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            match self.provider.generate(&batch_explanation_prompt(batch)).await {
                Ok(raw) => match parse_lenient::<Vec<Explanation>>(&raw) {
                    Parsed::Structured(items) => {
                        let mut items = items.into_iter();
                        for question in batch {
                            explanations
                                .push(items.next().unwrap_or_else(|| placeholder(question)));
                        }
                    }
                    Parsed::Raw(_) => {
                        warn!(
                            "Batch {}/{total} returned a non-array response; using placeholders",
                            index + 1
                        );
                        explanations.extend(batch.iter().map(|q| placeholder(q)));
                    }
                },
                // A quota error means the remaining batches would fail too:
                // abort and surface instead of degrading a 429 into
                // placeholders. Same for a missing credential.
                Err(ProviderError::RateLimited) => return Err(AppError::RateLimited),
                Err(ProviderError::Unconfigured) => return Err(AppError::Configuration),
                Err(e) => {
                    warn!("Batch {}/{total} provider call failed: {e}; using placeholders", index + 1);
                    explanations.extend(batch.iter().map(|q| placeholder(q)));
                }
            }
        }

        if let Ok(value) = serde_json::to_value(&explanations) {
            self.cache.set(&key, &value, AI_RESPONSES_TTL_SECS).await;
        }

        info!(
            "Generated {} explanations across {total} batches",
            explanations.len()
        );
        Ok(explanations)
    }
}

fn placeholder(question: &str) -> Explanation {
    Explanation {
        title: question.to_string(),
        explanation: PLACEHOLDER_EXPLANATION.to_string(),
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Order-independent hash of the question set. Duplicates are hashed as-is
/// (no deduplication), matching the listing semantics callers rely on.
fn bulk_hash(questions: &[String]) -> String {
    let mut sorted: Vec<&str> = questions.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sha256_hex(&sorted.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::genai::testing::ScriptedProvider;

    fn ok(text: &str) -> Result<String, ProviderError> {
        Ok(text.to_string())
    }

    fn qs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pipeline(
        responses: Vec<Result<String, ProviderError>>,
        batch_size: usize,
    ) -> (Arc<ScriptedProvider>, Arc<MemoryCache>, ExplanationPipeline) {
        let provider = Arc::new(ScriptedProvider::new(responses));
        let cache = Arc::new(MemoryCache::default());
        let pipeline = ExplanationPipeline::with_pacing(
            provider.clone(),
            cache.clone(),
            batch_size,
            Duration::ZERO,
        );
        (provider, cache, pipeline)
    }

    #[tokio::test]
    async fn test_explain_one_hits_cache_on_second_call() {
        let (provider, _cache, pipeline) = pipeline(
            vec![ok(r#"{"title": "REST", "explanation": "An architectural style."}"#)],
            DEFAULT_BATCH_SIZE,
        );

        let first = pipeline.explain_one("What is REST?").await.unwrap();
        let second = pipeline.explain_one("What is REST?").await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.title, "REST");
    }

    #[tokio::test]
    async fn test_explain_one_empty_question_is_a_validation_error() {
        let (provider, _cache, pipeline) = pipeline(vec![], DEFAULT_BATCH_SIZE);
        let err = pipeline.explain_one("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_explain_one_malformed_response_is_cached_fallback() {
        let (provider, _cache, pipeline) = pipeline(
            vec![ok("REST is just how the web talks.")],
            DEFAULT_BATCH_SIZE,
        );

        let first = pipeline.explain_one("What is REST?").await.unwrap();
        assert_eq!(first.title, "What is REST?");
        assert_eq!(first.explanation, "REST is just how the web talks.");

        // The fallback was cached too: no second provider call.
        let second = pipeline.explain_one("What is REST?").await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_explain_one_surfaces_rate_limit() {
        let (_provider, _cache, pipeline) =
            pipeline(vec![Err(ProviderError::RateLimited)], DEFAULT_BATCH_SIZE);
        let err = pipeline.explain_one("What is REST?").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited));
    }

    #[tokio::test]
    async fn test_bulk_empty_list_is_a_validation_error() {
        let (_provider, _cache, pipeline) = pipeline(vec![], DEFAULT_BATCH_SIZE);
        let err = pipeline.explain_bulk(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bulk_key_is_order_independent() {
        let (provider, _cache, pipeline) = pipeline(
            vec![ok(
                r#"[{"title": "A", "explanation": "a"}, {"title": "B", "explanation": "b"}]"#,
            )],
            DEFAULT_BATCH_SIZE,
        );

        pipeline.explain_bulk(&qs(&["A?", "B?"])).await.unwrap();
        let reordered = pipeline.explain_bulk(&qs(&["B?", "A?"])).await.unwrap();

        // Second call was a cache hit despite the different order.
        assert_eq!(provider.calls(), 1);
        assert_eq!(reordered.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_partitions_into_sequential_batches() {
        let (provider, _cache, pipeline) = pipeline(
            vec![
                ok(r#"[{"title": "1", "explanation": "x"}, {"title": "2", "explanation": "x"}]"#),
                ok(r#"[{"title": "3", "explanation": "x"}, {"title": "4", "explanation": "x"}]"#),
                ok(r#"[{"title": "5", "explanation": "x"}]"#),
            ],
            2,
        );

        let result = pipeline
            .explain_bulk(&qs(&["q1", "q2", "q3", "q4", "q5"]))
            .await
            .unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(result.len(), 5);
        let titles: Vec<&str> = result.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_bulk_rate_limit_aborts_remaining_batches() {
        let (provider, cache, pipeline) = pipeline(
            vec![
                ok(r#"[{"title": "1", "explanation": "x"}, {"title": "2", "explanation": "x"}]"#),
                Err(ProviderError::RateLimited),
                ok(r#"[{"title": "never", "explanation": "reached"}]"#),
            ],
            2,
        );

        let err = pipeline
            .explain_bulk(&qs(&["q1", "q2", "q3", "q4", "q5"]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateLimited));
        // Third batch never attempted, nothing cached.
        assert_eq!(provider.calls(), 2);
        assert!(cache
            .get(&bulk_explanation_key(&bulk_hash(&qs(&[
                "q1", "q2", "q3", "q4", "q5"
            ]))))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_bulk_non_rate_limit_failure_degrades_to_placeholders() {
        let (_provider, _cache, pipeline) = pipeline(
            vec![
                ok(r#"[{"title": "X", "explanation": "x"}, {"title": "Y", "explanation": "y"}]"#),
                Err(ProviderError::Unavailable("boom".to_string())),
            ],
            2,
        );

        let result = pipeline.explain_bulk(&qs(&["X?", "Y?", "Z?"])).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].title, "X");
        assert_eq!(result[1].title, "Y");
        assert_eq!(result[2].title, "Z?");
        assert_eq!(result[2].explanation, PLACEHOLDER_EXPLANATION);
    }

    #[tokio::test]
    async fn test_bulk_non_array_response_degrades_whole_batch() {
        let (_provider, _cache, pipeline) =
            pipeline(vec![ok("Sorry, I can't help with that.")], DEFAULT_BATCH_SIZE);

        let result = pipeline.explain_bulk(&qs(&["A?", "B?"])).await.unwrap();
        assert!(result
            .iter()
            .all(|e| e.explanation == PLACEHOLDER_EXPLANATION));
    }

    #[tokio::test]
    async fn test_bulk_short_array_pads_missing_tail_with_placeholders() {
        let (_provider, _cache, pipeline) = pipeline(
            vec![ok(r#"[{"title": "A", "explanation": "a"}]"#)],
            DEFAULT_BATCH_SIZE,
        );

        let result = pipeline.explain_bulk(&qs(&["A?", "B?"])).await.unwrap();
        assert_eq!(result[0].title, "A");
        assert_eq!(result[1].explanation, PLACEHOLDER_EXPLANATION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_paces_batches_but_not_after_the_last() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok(r#"[{"title": "1", "explanation": "x"}]"#),
            ok(r#"[{"title": "2", "explanation": "x"}]"#),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let pipeline = ExplanationPipeline::with_pacing(
            provider.clone(),
            cache,
            1,
            Duration::from_secs(1),
        );

        let started = tokio::time::Instant::now();
        pipeline.explain_bulk(&qs(&["q1", "q2"])).await.unwrap();

        // One inter-batch delay for two batches; none trailing.
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_bulk_hash_preserves_duplicates() {
        assert_ne!(
            bulk_hash(&qs(&["A?", "A?", "B?"])),
            bulk_hash(&qs(&["A?", "B?"]))
        );
        assert_eq!(bulk_hash(&qs(&["B?", "A?"])), bulk_hash(&qs(&["A?", "B?"])));
    }
}
