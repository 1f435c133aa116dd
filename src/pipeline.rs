use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::aggregate;
use crate::chunk::{self, Chunk};
use crate::config::Config;
use crate::dispatch::{ModelTransport, retry};
use crate::error::VerdictError;
use crate::limiter::RateLimiter;
use crate::parse;
use crate::schema::CanonicalReview;
use crate::truncation;

/// Floor for the halved re-attempt budget — below this, splitting further
/// cannot help an output-ceiling problem.
const MIN_CHUNK_BUDGET_BYTES: usize = 1024;

/// One independent thing being reviewed: a commit or a file group.
/// Immutable once created.
#[derive(Debug, Clone)]
pub struct ReviewUnit {
    pub content: String,
    pub key: String,
    pub label: String,
    pub size_bytes: usize,
}

impl ReviewUnit {
    pub fn new(content: String, key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            size_bytes: content.len(),
            content,
            key: key.into(),
            label: label.into(),
        }
    }
}

/// One batch entry: identity plus a deferred content fetch. The fetches fan
/// out concurrently; dispatch stays funnelled through the shared limiter.
pub struct BatchItem<F> {
    pub key: String,
    pub label: String,
    pub fetch: F,
}

/// Finished review for one unit, ready for the reporting side.
#[derive(Debug, Serialize)]
pub struct UnitReview {
    pub key: String,
    pub label: String,
    pub review: CanonicalReview,
}

/// The resilient review pipeline: chunk → rate-limited dispatch with retry →
/// normalize/parse/repair → truncation feedback → aggregate. Every path out
/// of here produces a schema-valid review; model-originated failures never
/// escape.
pub struct ReviewPipeline<T: ModelTransport> {
    transport: T,
    limiter: RateLimiter,
    config: Config,
}

impl<T: ModelTransport> ReviewPipeline<T> {
    pub fn new(transport: T, config: Config) -> Self {
        let limiter = RateLimiter::new(
            Duration::from_millis(config.min_request_interval_ms),
            config.max_requests_per_minute,
        );
        Self {
            transport,
            limiter,
            config,
        }
    }

    /// The shared rate limiter (exposed for inspection in tests).
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Review one unit end to end. Chunk dispatch is sequential: chunk order
    /// matters for deterministic aggregation and the rate limit is shared.
    pub async fn review_unit(&self, unit: &ReviewUnit) -> CanonicalReview {
        let budget = self.config.chunk_budget_bytes();
        let chunks = chunk::split(&unit.content, budget);
        tracing::info!(
            unit = %unit.key,
            chunks = chunks.len(),
            size_bytes = unit.size_bytes,
            "reviewing unit"
        );

        let mut reviews = Vec::with_capacity(chunks.len());
        let mut weights = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            reviews.push(self.review_chunk(unit, chunk, budget).await);
            weights.push(chunk.source_files.len().max(1) as u32);
        }

        aggregate::combine(reviews, &weights)
    }

    /// Review several independent units. Content fetches run concurrently up
    /// to `batch_size`; results keep input order so aggregation downstream
    /// stays deterministic. A failed fetch yields that unit's fallback
    /// review, never a batch-wide error.
    pub async fn review_batch<F>(&self, items: Vec<BatchItem<F>>) -> Vec<UnitReview>
    where
        F: Future<Output = Result<String, VerdictError>> + Send,
    {
        let prepared: Vec<(String, String, Result<String, VerdictError>)> =
            stream::iter(items.into_iter().map(|item| async move {
                (item.key, item.label, item.fetch.await)
            }))
            .buffered(self.config.batch_size)
            .collect()
            .await;

        let mut out = Vec::with_capacity(prepared.len());
        for (key, label, content) in prepared {
            let review = match content {
                Ok(content) => {
                    let unit = ReviewUnit::new(content, key.clone(), label.clone());
                    self.review_unit(&unit).await
                }
                Err(e) => {
                    tracing::warn!(
                        unit = %key,
                        error = %e.user_message(),
                        "content preparation failed, emitting fallback review"
                    );
                    CanonicalReview::fallback()
                }
            };
            out.push(UnitReview { key, label, review });
        }
        out
    }

    /// One chunk through dispatch and parsing, with the truncation feedback
    /// loop: a result that looks cut short earns one re-attempt at half the
    /// byte budget; whatever comes back second is accepted.
    async fn review_chunk(&self, unit: &ReviewUnit, chunk: &Chunk, budget: usize) -> CanonicalReview {
        let review = self.dispatch_and_parse(unit, chunk).await;

        let halved = budget / 2;
        if !truncation::looks_truncated(&review) || halved < MIN_CHUNK_BUDGET_BYTES {
            return review;
        }

        let sub_chunks = chunk::split(&chunk.content, halved);
        if sub_chunks.len() < 2 {
            // Could not actually reduce the input; keep what we have.
            return review;
        }

        tracing::info!(
            unit = %unit.key,
            chunk = chunk.index,
            sub_chunks = sub_chunks.len(),
            "suspected truncation, re-attempting at half budget"
        );

        let mut reviews = Vec::with_capacity(sub_chunks.len());
        let mut weights = Vec::with_capacity(sub_chunks.len());
        for sub in &sub_chunks {
            reviews.push(self.dispatch_and_parse(unit, sub).await);
            weights.push(sub.source_files.len().max(1) as u32);
        }
        aggregate::combine(reviews, &weights)
    }

    /// Rate-limited dispatch with retry, then total parsing. Retry
    /// exhaustion and non-retryable transport errors both collapse to the
    /// fallback review here.
    async fn dispatch_and_parse(&self, unit: &ReviewUnit, chunk: &Chunk) -> CanonicalReview {
        let prompt = build_prompt(unit, chunk);
        match retry::call_with_retry(
            &self.transport,
            &self.limiter,
            &prompt,
            self.config.max_tokens,
            self.config.retry_attempts,
        )
        .await
        {
            Ok(raw) => parse::parse_review(&raw),
            Err(e) => {
                tracing::warn!(
                    unit = %unit.key,
                    chunk = chunk.index,
                    error = %e.user_message(),
                    "dispatch failed, returning fallback review"
                );
                CanonicalReview::fallback()
            }
        }
    }
}

/// Instructions sent ahead of every chunk. The schema description keeps the
/// model's output close enough to strict JSON that the repair heuristics
/// have something to work with.
const REVIEW_INSTRUCTIONS: &str = "You are an expert code reviewer. Review the following change \
and respond with ONLY a JSON object, no prose and no markdown fences, using this shape: \
{\"score\": 1-10, \"confidence\": 1-10, \"summary\": \"...\", \
\"issues\": [{\"severity\": \"critical|high|medium|low\", \"description\": \"...\", \
\"suggestion\": \"...\", \"category\": \"security|performance|quality|style|testing|documentation|accessibility|dependencies\", \
\"citation\": \"...\", \"auto_fixable\": false}], \
\"suggestions\": [\"...\"], \"security\": [\"...\"], \"performance\": [\"...\"], \
\"dependencies\": [\"...\"], \"accessibility\": [\"...\"], \"sources\": [\"...\"]}";

fn build_prompt(unit: &ReviewUnit, chunk: &Chunk) -> String {
    let mut prompt = String::with_capacity(chunk.content.len() + 512);
    prompt.push_str(REVIEW_INSTRUCTIONS);
    prompt.push_str("\n\nReviewing: ");
    prompt.push_str(&unit.label);
    if chunk.total > 1 {
        prompt.push_str(&format!(
            "\nThis is part {} of {}; review only what is shown.",
            chunk.index + 1,
            chunk.total
        ));
    }
    prompt.push_str("\n\n");
    prompt.push_str(&chunk.content);
    prompt
}
