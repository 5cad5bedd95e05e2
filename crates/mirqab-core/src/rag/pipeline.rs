//! The Moraqib query orchestrator and guarded answer generation.
//!
//! Sequences classification, retrieval, context assembly, and generation
//! for one question, collecting provenance along the way. The store and
//! the generation capability are injected, never global.
//!
//! Failure handling is local to each stage: a store failure degrades to
//! an empty result set, a generation failure degrades to a fixed
//! apologetic answer. No failure propagates to the caller and nothing is
//! retried.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{DetectionReport, QueryResult, RetrievalFilter};
use crate::store::ReportStore;

use super::context::assemble_context;
use super::strategy::{classify, RetrievalStrategy};

/// Sampling parameters passed to the generation capability.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    /// Deterministic-leaning sampling with a bounded output cap, suited
    /// to factual report summarization.
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }
}

/// External text-generation capability.
///
/// Implementations must enforce their own request timeout: a call may
/// fail but must not hang indefinitely.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Fixed answer substituted whenever generation fails. The raw error is
/// logged but never surfaced to the end user.
pub const FAILURE_ANSWER: &str =
    "I'm sorry, I encountered an error processing your question.";

/// Guardrail instruction prepended to every prompt. Enforcement is
/// prompt-level only; the pipeline does not verify the answer stayed
/// within context.
pub const SYSTEM_INSTRUCTION: &str = "\
You are 'Moraqib,' a specialized AI assistant for the 'Mirqab' camouflaged soldier detection system. Your one and only function is to answer questions based exclusively on the detection reports provided in the 'Context'.

Your Rules:

1. ANALYZE the provided 'Context' (which contains detection reports) to answer the user's 'Query'. Each report contains: timestamp, location, soldier count, environment description, attire/camouflage details, and equipment information.

2. If the answer is in the Context, provide it clearly and concisely. You may summarize, count, or filter information from multiple reports based on the query.

3. When users ask about specific topics (e.g., \"woodland areas\", \"camouflage uniforms\", \"equipment\"), search through ALL provided reports and extract relevant information even if the exact keywords don't match. Use semantic understanding:
   - \"woodland\" relates to: forest, trees, vegetation, wooded areas
   - \"camouflage\" relates to: uniform patterns, attire, clothing, gear
   - \"equipment\" relates to: weapons, rifles, tactical gear, backpacks, helmets, vests

4. If the Context contains reports but they don't match the specific query criteria (e.g., asking about \"desert\" when only \"woodland\" reports exist), clearly state: \"Based on the available reports, I found X detections, but none match the specific criteria of [user's request]. The available reports show: [brief summary].\"

5. If the Context is completely empty or contains no relevant information, respond with: \"I'm sorry, I can only provide information found in the Mirqab detection reports.\"

6. You are forbidden from answering any general knowledge questions, engaging in chit-chat, or discussing any topic outside of the provided detection reports.

7. When summarizing reports, always cite the report ID (e.g., \"According to report MIR-20251024-0001...\").

8. If asked about counts, count the reports accurately and show your work (e.g., \"Found 3 reports: MIR-001, MIR-002, MIR-003\").

9. If asked about time periods (e.g., \"last night\", \"yesterday\"), only use reports that fall within that time range based on their timestamps.

10. Be helpful and informative - extract maximum value from the provided reports to answer the user's question.";

/// Default cap on reports fed into one context block.
pub const DEFAULT_RETRIEVAL_LIMIT: i64 = 50;

/// Default cap on report ids echoed back in `reports_used`.
pub const DEFAULT_PREVIEW_IDS: usize = 10;

/// The Moraqib RAG pipeline: retrieval, context assembly, and guarded
/// generation over an injected store and generator.
pub struct MoraqibPipeline {
    store: Arc<dyn ReportStore>,
    generator: Arc<dyn Generator>,
    params: GenerationParams,
    limit: i64,
    preview_ids: usize,
}

impl MoraqibPipeline {
    pub fn new(store: Arc<dyn ReportStore>, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            params: GenerationParams::default(),
            limit: DEFAULT_RETRIEVAL_LIMIT,
            preview_ids: DEFAULT_PREVIEW_IDS,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_preview_ids(mut self, preview_ids: usize) -> Self {
        self.preview_ids = preview_ids;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Run one question through the pipeline. Always returns a
    /// well-formed result; stage failures degrade rather than propagate.
    pub async fn query(&self, question: &str) -> QueryResult {
        let reports = self.retrieve(question).await;
        let context = assemble_context(&reports);
        let answer = self.generate_answer(question, &context).await;

        QueryResult {
            success: true,
            question: question.to_string(),
            answer,
            reports_count: reports.len(),
            reports_used: reports
                .iter()
                .take(self.preview_ids)
                .map(|r| r.report_id.clone())
                .collect(),
            error: None,
        }
    }

    /// Retrieve the reports for a question according to its classified
    /// strategy. A store failure is recovered as "zero reports" so the
    /// pipeline continues to the empty-context sentinel.
    async fn retrieve(&self, question: &str) -> Vec<DetectionReport> {
        let classified = classify(question, Utc::now());
        tracing::debug!(strategy = ?classified.strategy, device = ?classified.device_id, "classified query");

        let result = match &classified.strategy {
            RetrievalStrategy::TimeFiltered { start, end } => {
                self.store
                    .query_reports(
                        &RetrievalFilter::between(*start, *end, self.limit)
                            .with_device(classified.device_id.clone()),
                    )
                    .await
            }
            RetrievalStrategy::General | RetrievalStrategy::RecentFallback => {
                self.store
                    .query_reports(
                        &RetrievalFilter::recent(self.limit)
                            .with_device(classified.device_id.clone()),
                    )
                    .await
            }
            RetrievalStrategy::Keyword(keywords) => {
                match self.store.search_reports(keywords, self.limit).await {
                    // Explicit Keyword -> RecentFallback transition on an
                    // empty result set.
                    Ok(reports) if reports.is_empty() => {
                        tracing::debug!("keyword search empty, falling back to recent reports");
                        self.store
                            .query_reports(&RetrievalFilter::recent(self.limit))
                            .await
                    }
                    other => other,
                }
            }
        };

        match result {
            Ok(reports) => reports,
            Err(err) => {
                tracing::warn!(error = %err, "report retrieval failed; continuing with empty context");
                Vec::new()
            }
        }
    }

    /// Build the guarded prompt and invoke the generation capability.
    /// Any failure yields the fixed apologetic answer.
    async fn generate_answer(&self, question: &str, context: &str) -> String {
        let prompt = build_prompt(context, question);

        let started = Instant::now();
        let outcome = self.generator.generate(&prompt, &self.params).await;
        let latency_ms = started.elapsed().as_millis();

        match outcome {
            Ok(answer) => {
                tracing::info!(latency_ms, chars = answer.len(), "answer generated");
                answer.trim().to_string()
            }
            Err(err) => {
                tracing::warn!(latency_ms, error = %err, "answer generation failed");
                FAILURE_ANSWER.to_string()
            }
        }
    }
}

/// Concatenate the guardrail instruction, the context block, and the raw
/// user question into the final prompt.
fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\nContext (Detection Reports):\n{context}\n\nUser Query: {question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, NewReport};
    use crate::store::memory::InMemoryStore;
    use anyhow::bail;
    use chrono::{DateTime, Duration, Utc};

    /// Returns the prompt it was given, so tests can inspect what the
    /// generator would see.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    /// Simulates a transport failure or timeout in the generation
    /// capability.
    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            bail!("request timed out after 30s")
        }
    }

    /// A store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl crate::store::ReportStore for BrokenStore {
        async fn save_report(&self, _report: &NewReport) -> Result<String> {
            bail!("store unreachable")
        }
        async fn get_report(
            &self,
            _report_id: &str,
        ) -> Result<Option<DetectionReport>> {
            bail!("store unreachable")
        }
        async fn set_image_urls(
            &self,
            _report_id: &str,
            _snapshot_url: &str,
            _segmented_url: &str,
        ) -> Result<()> {
            bail!("store unreachable")
        }
        async fn query_reports(
            &self,
            _filter: &RetrievalFilter,
        ) -> Result<Vec<DetectionReport>> {
            bail!("store unreachable")
        }
        async fn search_reports(
            &self,
            _keywords: &str,
            _limit: i64,
        ) -> Result<Vec<DetectionReport>> {
            bail!("store unreachable")
        }
        async fn device_ids(&self) -> Result<Vec<String>> {
            bail!("store unreachable")
        }
        async fn statistics(&self) -> Result<crate::store::StoreStatistics> {
            bail!("store unreachable")
        }
    }

    fn report_at(timestamp: DateTime<Utc>, environment: &str, attire: &str) -> NewReport {
        NewReport {
            timestamp,
            location: GeoPoint::unknown(),
            soldier_count: 2,
            environment: environment.to_string(),
            attire_and_camouflage: attire.to_string(),
            equipment: "rifle".to_string(),
            source_device_id: "Pi-001".to_string(),
            image_snapshot_url: String::new(),
            segmented_image_url: String::new(),
            ai_summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_apologetic_answer() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_report(&report_at(Utc::now(), "woodland", "camouflage uniform"))
            .await
            .unwrap();

        let pipeline = MoraqibPipeline::new(store, Arc::new(FailingGenerator));
        let result = pipeline.query("show me all detections").await;

        // The query itself succeeded; only the answer degraded.
        assert!(result.success);
        assert_eq!(result.answer, FAILURE_ANSWER);
        assert_eq!(result.reports_count, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty_context() {
        let pipeline = MoraqibPipeline::new(Arc::new(BrokenStore), Arc::new(EchoGenerator));
        let result = pipeline.query("show me all detections").await;

        assert!(result.success);
        assert_eq!(result.reports_count, 0);
        assert!(result.reports_used.is_empty());
        // The generator still ran, with the empty-context sentinel.
        assert!(result.answer.contains("No detection reports found."));
    }

    #[tokio::test]
    async fn test_yesterday_query_retrieves_only_yesterday_reports() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());

        let yesterday_10am = (now - Duration::days(1))
            .date_naive()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        let today_10am = now
            .date_naive()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();

        store
            .save_report(&report_at(yesterday_10am, "woodland", "camouflage"))
            .await
            .unwrap();
        store
            .save_report(&report_at(today_10am, "urban", "plain fatigues"))
            .await
            .unwrap();

        let pipeline = MoraqibPipeline::new(store, Arc::new(EchoGenerator));
        let result = pipeline.query("How many detections yesterday?").await;

        assert_eq!(result.reports_count, 1);
        assert_eq!(result.reports_used.len(), 1);
        assert!(result.answer.contains("Detection Reports (Total: 1):"));
        assert!(result.answer.contains("woodland"));
    }

    #[tokio::test]
    async fn test_keyword_retrieval_surfaces_matching_report() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_report(&report_at(Utc::now(), "urban ruins", "grey fatigues"))
            .await
            .unwrap();
        store
            .save_report(&report_at(
                Utc::now(),
                "woodland",
                "camouflage uniform",
            ))
            .await
            .unwrap();

        let pipeline = MoraqibPipeline::new(store, Arc::new(EchoGenerator));
        let result = pipeline
            .query("describe any woodland camouflage equipment observed")
            .await;

        assert_eq!(result.reports_count, 1);
        assert!(result.answer.contains("woodland"));
        assert!(!result.answer.contains("urban ruins"));
    }

    #[tokio::test]
    async fn test_empty_keyword_results_fall_back_to_recent() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_report(&report_at(Utc::now(), "urban ruins", "grey fatigues"))
            .await
            .unwrap();

        let pipeline = MoraqibPipeline::new(store, Arc::new(EchoGenerator));
        // Keyword strategy ("mountain") matches nothing; fallback must
        // still surface the stored report.
        let result = pipeline
            .query("describe the mountain terrain sightings near the border")
            .await;

        assert!(result.success);
        assert_eq!(result.reports_count, 1);
        assert!(result.answer.contains("urban ruins"));
    }

    #[tokio::test]
    async fn test_prompt_carries_guardrails_context_and_question() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_report(&report_at(Utc::now(), "woodland", "camouflage"))
            .await
            .unwrap();

        let pipeline = MoraqibPipeline::new(store, Arc::new(EchoGenerator));
        let result = pipeline.query("show me all detections").await;

        assert!(result.answer.starts_with("You are 'Moraqib,'"));
        assert!(result.answer.contains("Context (Detection Reports):"));
        assert!(result.answer.contains("User Query: show me all detections"));
        assert!(result.answer.ends_with("Answer:"));
    }

    #[tokio::test]
    async fn test_reports_used_is_truncated_to_preview_count() {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..15 {
            store
                .save_report(&report_at(
                    Utc::now() - Duration::minutes(i),
                    "woodland",
                    "camouflage",
                ))
                .await
                .unwrap();
        }

        let pipeline = MoraqibPipeline::new(store, Arc::new(EchoGenerator));
        let result = pipeline.query("show me all detections").await;

        assert_eq!(result.reports_count, 15);
        assert_eq!(result.reports_used.len(), DEFAULT_PREVIEW_IDS);
    }
}
