//! Suite orchestration: send → wait → extract → judge → record
//!
//! Cases run strictly one after another on a single live session; a timeout
//! or failed verdict is recorded with diagnostics and artifacts, never
//! retried. Infrastructure errors (driver gone, embedding service down)
//! abort the run instead of being booked as case failures.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use chatgauge_core::report::{failure_summary, judgment_attachments};
use chatgauge_core::{
    assess, strip_sources, Attachment, CoreError, Dataset, Judgment, Language, PromptCase,
    ResponseWaiter, SimilarityScorer,
};

use crate::capture::ArtifactSink;
use crate::checks::{looks_clean, missing_phrases, LinkAllowlist};
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::session::{selectors, ChatSession};

/// How long the latest answer region may take to appear after a send.
const ANSWER_APPEAR_TIMEOUT_MS: u64 = 45_000;

/// Polling schedule while watching for loading markers mid-stream.
const MARKER_POLLS: u32 = 30;
const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of one check or judged case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub section: String,
    pub passed: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub artifacts: Vec<PathBuf>,
}

impl CaseResult {
    fn new(id: impl Into<String>, section: &str, started: Instant) -> Self {
        Self {
            id: id.into(),
            section: section.to_string(),
            passed: false,
            duration_ms: started.elapsed().as_millis() as u64,
            judgment: None,
            attachments: Vec::new(),
            error: None,
            artifacts: Vec::new(),
        }
    }
}

/// Aggregate over a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<CaseResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self { total: results.len(), passed, failed: results.len() - passed, duration_ms, results }
    }
}

/// Outcome of asking one prompt: a settled answer, or a case already marked
/// failed because the stream never stabilized.
enum Asked {
    Answer(String),
    TimedOut(CaseResult),
}

pub struct SuiteRunner {
    config: SuiteConfig,
    scorer: SimilarityScorer,
    waiter: ResponseWaiter,
    sink: ArtifactSink,
    allowlist: LinkAllowlist,
}

impl SuiteRunner {
    /// Bring up the runner. Connecting the embedding models here keeps a
    /// broken scorer a run-level failure instead of a misleading string of
    /// per-case ones.
    pub async fn new(config: SuiteConfig) -> E2eResult<Self> {
        let scorer = SimilarityScorer::connect(&config.embedding).await?;
        let sink = ArtifactSink::new(config.reports_dir.clone())?;
        let waiter = ResponseWaiter::new(config.waiter.clone());
        Ok(Self { config, scorer, waiter, sink, allowlist: LinkAllowlist::government_default() })
    }

    /// Send a prompt and wait for the settled, citation-stripped answer.
    async fn ask(&self, session: &mut ChatSession, prompt: &str) -> E2eResult<String> {
        session.send_prompt(prompt).await?;
        let mut region = session.answer_region(ANSWER_APPEAR_TIMEOUT_MS).await?;
        let raw = self.waiter.wait_for_final(&mut region).await?;
        Ok(strip_sources(&raw).to_string())
    }

    /// Like [`Self::ask`], but a stabilization timeout becomes a failed
    /// [`CaseResult`] (with artifacts) rather than an error.
    async fn ask_case(
        &self,
        session: &mut ChatSession,
        id: &str,
        section: &str,
        prompt: &str,
        started: Instant,
    ) -> E2eResult<Asked> {
        match self.ask(session, prompt).await {
            Ok(answer) => Ok(Asked::Answer(answer)),
            Err(E2eError::Core(CoreError::Timeout { last_seen })) => {
                error!("[{}] answer never stabilized", id);
                let mut result = CaseResult::new(id, section, started);
                result.error = Some(format!("answer never stabilized; last seen:\n{last_seen}"));
                result.attachments.push(Attachment::new("prompt", prompt));
                result.attachments.push(Attachment::new("last_seen", last_seen));
                result.artifacts = self.sink.capture_failure(session, id).await;
                Ok(Asked::TimedOut(result))
            }
            Err(other) => Err(other),
        }
    }

    /// Golden-reference similarity cases.
    pub async fn run_golden(
        &self,
        session: &mut ChatSession,
        dataset: &Dataset,
    ) -> E2eResult<Vec<CaseResult>> {
        let mut results = Vec::new();
        for case in dataset.golden_cases() {
            results.push(self.run_judged_case(session, case).await?);
        }
        Ok(results)
    }

    async fn run_judged_case(
        &self,
        session: &mut ChatSession,
        case: &PromptCase,
    ) -> E2eResult<CaseResult> {
        let started = Instant::now();
        info!("[{}] asking: {}", case.id, case.user);

        let answer = match self.ask_case(session, &case.id, "golden", &case.user, started).await? {
            Asked::Answer(answer) => answer,
            Asked::TimedOut(result) => return Ok(result),
        };

        let judgment = assess(&self.scorer, case, &answer).await?;
        let mut result = CaseResult::new(&case.id, "golden", started);
        result.attachments = judgment_attachments(case, &answer, &judgment);
        result.passed = judgment.passed;

        if !judgment.passed {
            result.error = Some(failure_summary(case, &judgment));
            result.artifacts = self.sink.capture_failure(session, &case.id).await;
            error!("✗ {}", result.error.as_deref().unwrap_or_default());
        } else {
            info!("✓ {} ({} ms)", case.id, result.duration_ms);
        }
        result.judgment = Some(judgment);
        Ok(result)
    }

    /// EN↔AR intent consistency over paired cases: the same question in both
    /// languages must produce semantically matching answers.
    pub async fn run_consistency(
        &self,
        session: &mut ChatSession,
        dataset: &Dataset,
    ) -> E2eResult<Vec<CaseResult>> {
        let mut results = Vec::new();

        for (en, ar) in dataset.language_pairs() {
            let started = Instant::now();
            let id = format!("{}_consistency", en.base_id());

            let answer_en = match self.ask_case(session, &id, "consistency", &en.user, started).await? {
                Asked::Answer(a) => a,
                Asked::TimedOut(result) => {
                    results.push(result);
                    continue;
                }
            };
            let answer_ar = match self.ask_case(session, &id, "consistency", &ar.user, started).await? {
                Asked::Answer(a) => a,
                Asked::TimedOut(result) => {
                    results.push(result);
                    continue;
                }
            };

            let score = self.scorer.cross_language(&answer_en, &answer_ar).await?;
            let threshold = en.consistency_threshold().max(ar.consistency_threshold());

            let mut result = CaseResult::new(&id, "consistency", started);
            result.passed = score >= threshold;
            result.attachments = vec![
                Attachment::new("prompt_en", &en.user),
                Attachment::new("prompt_ar", &ar.user),
                Attachment::new("answer_en", &answer_en),
                Attachment::new("answer_ar", &answer_ar),
                Attachment::new("xl_similarity", format!("{score:.3}")),
            ];
            if !result.passed {
                result.error =
                    Some(format!("EN–AR consistency too low ({score:.2}, threshold {threshold:.2})"));
                result.artifacts = self.sink.capture_failure(session, &id).await;
            }
            results.push(result);
        }

        Ok(results)
    }

    /// Streaming/formatting/trust checks driven by the first English case,
    /// plus fallback probes.
    pub async fn run_quality(
        &self,
        session: &mut ChatSession,
        dataset: &Dataset,
    ) -> E2eResult<Vec<CaseResult>> {
        let mut results = Vec::new();

        if let Some(case) = dataset.by_language(Language::En).first().copied() {
            results.push(self.check_loading_markers(session, case).await?);
            results.push(self.check_clean_format(session, case).await?);
            results.push(self.check_link_allowlist(session, case).await?);
        }

        for probe in dataset.fallback_probes() {
            results.push(self.check_fallback(session, probe).await?);
        }

        Ok(results)
    }

    /// The UI must show progress feedback while an answer is generated.
    async fn check_loading_markers(
        &self,
        session: &mut ChatSession,
        case: &PromptCase,
    ) -> E2eResult<CaseResult> {
        let started = Instant::now();
        let id = "loading_markers_appear";

        session.send_prompt(&case.user).await?;
        session.wait_visible(selectors::LATEST_ANSWER, ANSWER_APPEAR_TIMEOUT_MS).await?;

        let markers = &self.waiter.config().loading_markers;
        let mut seen = false;
        for _ in 0..MARKER_POLLS {
            let text = session.inner_text(selectors::LATEST_ANSWER).await.unwrap_or_default();
            if markers.iter().any(|m| text.contains(m.as_str())) {
                seen = true;
                break;
            }
            sleep(MARKER_POLL_INTERVAL).await;
        }

        // Let the stream finish before the next check reuses the session.
        let mut region = session.answer_region(ANSWER_APPEAR_TIMEOUT_MS).await?;
        let _ = self.waiter.wait_for_final(&mut region).await;

        let mut result = CaseResult::new(id, "quality", started);
        result.passed = seen;
        if !seen {
            result.error = Some("no loading indicators observed while streaming".to_string());
            result.artifacts = self.sink.capture_failure(session, id).await;
        }
        Ok(result)
    }

    /// Answers must not carry scripts or grossly broken markup.
    async fn check_clean_format(
        &self,
        session: &mut ChatSession,
        case: &PromptCase,
    ) -> E2eResult<CaseResult> {
        let started = Instant::now();
        let id = "response_format_clean";

        let answer = match self.ask_case(session, id, "quality", &case.user, started).await? {
            Asked::Answer(a) => a,
            Asked::TimedOut(result) => return Ok(result),
        };

        let mut result = CaseResult::new(id, "quality", started);
        result.passed = looks_clean(&answer);
        result.attachments.push(Attachment::new("answer_text", &answer));
        if !result.passed {
            result.error = Some("answer contains unsafe or broken markup".to_string());
            result.artifacts = self.sink.capture_failure(session, id).await;
        }
        Ok(result)
    }

    /// Every link in an answer must point at an approved government domain.
    async fn check_link_allowlist(
        &self,
        session: &mut ChatSession,
        case: &PromptCase,
    ) -> E2eResult<CaseResult> {
        let started = Instant::now();
        let id = "links_government_only";

        let answer = match self.ask_case(session, id, "quality", &case.user, started).await? {
            Asked::Answer(a) => a,
            Asked::TimedOut(result) => return Ok(result),
        };

        let offending: Vec<String> =
            self.allowlist.offending_links(&answer).into_iter().map(String::from).collect();

        let mut result = CaseResult::new(id, "quality", started);
        result.passed = offending.is_empty();
        result.attachments.push(Attachment::new("answer_text", &answer));
        if !result.passed {
            result.error = Some(format!("non-government links in answer: {}", offending.join(", ")));
            result.attachments.push(Attachment::new("offending_links", offending.join("\n")));
            result.artifacts = self.sink.capture_failure(session, id).await;
        }
        Ok(result)
    }

    /// Gibberish input must produce a proper fallback reply.
    async fn check_fallback(
        &self,
        session: &mut ChatSession,
        probe: &PromptCase,
    ) -> E2eResult<CaseResult> {
        let started = Instant::now();

        let answer = match self.ask_case(session, &probe.id, "quality", &probe.user, started).await? {
            Asked::Answer(a) => a,
            Asked::TimedOut(result) => return Ok(result),
        };

        let mut failures = Vec::new();

        if let Some(golden) = &probe.golden {
            let score = self.scorer.cross_language(&answer, golden).await?;
            let threshold = probe.threshold.unwrap_or(0.80);
            if score < threshold {
                failures.push(format!("fallback similarity {score:.2} below {threshold:.2}"));
            }
        }

        let missing = missing_phrases(&answer, &probe.must_contain);
        if !missing.is_empty() {
            failures.push(format!("missing fallback keywords: {}", missing.join(", ")));
        }

        let mut result = CaseResult::new(&probe.id, "quality", started);
        result.passed = failures.is_empty();
        result.attachments.push(Attachment::new("fallback_response", &answer));
        if !result.passed {
            result.error = Some(failures.join("; "));
            result.artifacts = self.sink.capture_failure(session, &probe.id).await;
        }
        Ok(result)
    }

    /// Basic widget behavior: composer loads, input clears on send, the
    /// answer area renders, and layout direction matches the language.
    pub async fn run_ui(&self, session: &mut ChatSession) -> E2eResult<Vec<CaseResult>> {
        let mut results = Vec::new();

        // Composer is visible once logged in.
        let started = Instant::now();
        let mut widget = CaseResult::new("widget_loads", "ui", started);
        match session.wait_visible(selectors::COMPOSER, 15_000).await {
            Ok(()) => widget.passed = true,
            Err(err) => {
                widget.error = Some(err.to_string());
                widget.artifacts = self.sink.capture_failure(session, "widget_loads").await;
            }
        }
        widget.duration_ms = started.elapsed().as_millis() as u64;
        results.push(widget);

        // Sending renders an answer region and clears the composer.
        let started = Instant::now();
        session.send_prompt("Hello from the quality harness!").await?;

        let mut renders = CaseResult::new("send_and_render", "ui", started);
        match session.wait_visible(selectors::LATEST_ANSWER, ANSWER_APPEAR_TIMEOUT_MS).await {
            Ok(()) => renders.passed = true,
            Err(err) => {
                renders.error = Some(err.to_string());
                renders.artifacts = self.sink.capture_failure(session, "send_and_render").await;
            }
        }
        renders.duration_ms = started.elapsed().as_millis() as u64;
        results.push(renders);

        let mut clears = CaseResult::new("input_clears_after_send", "ui", started);
        for _ in 0..20 {
            if session.composer_text().await.unwrap_or_default().trim().is_empty() {
                clears.passed = true;
                break;
            }
            sleep(MARKER_POLL_INTERVAL).await;
        }
        if !clears.passed {
            clears.error = Some("composer still holds text after send".to_string());
            clears.artifacts = self.sink.capture_failure(session, "input_clears_after_send").await;
        }
        clears.duration_ms = started.elapsed().as_millis() as u64;
        results.push(clears);

        // Quiesce the stream started above.
        let mut region = session.answer_region(ANSWER_APPEAR_TIMEOUT_MS).await?;
        let _ = self.waiter.wait_for_final(&mut region).await;

        // Layout direction must match the language mode.
        let started = Instant::now();
        let direction = session.document_direction().await?;
        let mut layout = CaseResult::new("layout_direction", "ui", started);
        layout.passed = match self.config.lang {
            Language::En => matches!(direction.as_str(), "ltr" | "" | "auto"),
            Language::Ar => direction.contains("rtl"),
        };
        layout.attachments.push(Attachment::new("document_direction", &direction));
        if !layout.passed {
            layout.error = Some(format!(
                "expected {} layout, document reports '{}'",
                match self.config.lang {
                    Language::En => "LTR",
                    Language::Ar => "RTL",
                },
                direction
            ));
        }
        results.push(layout);

        Ok(results)
    }

    /// Script input must be neutralized: no execution, and the bot answers
    /// with a refusal instead of echoing markup.
    pub async fn run_security(&self, session: &mut ChatSession) -> E2eResult<Vec<CaseResult>> {
        let started = Instant::now();
        let id = "chat_input_xss_blocked";
        let probe = "<script>window.xssInjected=true;</script>";

        let answer = match self.ask_case(session, id, "security", probe, started).await? {
            Asked::Answer(a) => a,
            Asked::TimedOut(result) => return Ok(vec![result]),
        };

        let not_executed = self
            .evaluate_bool(session, "window.xssInjected === undefined")
            .await?;
        let refused = answer.to_lowercase().contains("sorry");

        let mut result = CaseResult::new(id, "security", started);
        result.passed = not_executed && refused;
        result.attachments.push(Attachment::new("xss_response", &answer));
        if !not_executed {
            result.error = Some("injected script executed in the page".to_string());
        } else if !refused {
            result.error = Some("no refusal message for script input".to_string());
        }
        if !result.passed {
            result.artifacts = self.sink.capture_failure(session, id).await;
        }
        Ok(vec![result])
    }

    async fn evaluate_bool(&self, session: &mut ChatSession, expression: &str) -> E2eResult<bool> {
        Ok(session.evaluate(expression).await?.as_bool().unwrap_or(false))
    }

    /// Full sequential run over one logged-in session.
    pub async fn run_all(
        &self,
        session: &mut ChatSession,
        dataset: &Dataset,
    ) -> E2eResult<SuiteResult> {
        let started = Instant::now();
        let mut results = Vec::new();

        results.extend(self.run_ui(session).await?);
        results.extend(self.run_golden(session, dataset).await?);
        results.extend(self.run_consistency(session, dataset).await?);
        results.extend(self.run_quality(session, dataset).await?);
        // Last: the probe pollutes the conversation history.
        results.extend(self.run_security(session).await?);

        let suite = SuiteResult::from_results(results, started.elapsed().as_millis() as u64);
        info!(
            "suite finished: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(suite)
    }

    /// Write the aggregate as pretty JSON under the reports directory.
    pub fn write_results(&self, suite: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.reports_dir)?;
        let path = self.config.reports_dir.join("suite-results.json");
        std::fs::write(&path, serde_json::to_string_pretty(suite)?)?;
        info!("results written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_result_counts_pass_and_fail() {
        let mut passed = CaseResult::new("a", "golden", Instant::now());
        passed.passed = true;
        let failed = CaseResult::new("b", "golden", Instant::now());

        let suite = SuiteResult::from_results(vec![passed, failed], 1234);
        assert_eq!(suite.total, 2);
        assert_eq!(suite.passed, 1);
        assert_eq!(suite.failed, 1);
    }

    #[test]
    fn case_results_serialize_without_empty_options() {
        let result = CaseResult::new("widget_loads", "ui", Instant::now());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("judgment").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["section"], "ui");
    }

    #[test]
    fn suite_result_round_trips_through_json() {
        let mut case = CaseResult::new("golden_visa_en", "golden", Instant::now());
        case.passed = true;
        case.attachments.push(Attachment::new("similarity", "0.91"));

        let suite = SuiteResult::from_results(vec![case], 10);
        let json = serde_json::to_string_pretty(&suite).unwrap();
        let parsed: SuiteResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results[0].attachments[0].body, "0.91");
        assert_eq!(parsed.passed, 1);
    }
}
