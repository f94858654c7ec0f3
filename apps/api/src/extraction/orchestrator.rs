//! Extraction Orchestrator: prompt → inference → normalize → validate.
//!
//! Flow:
//! 1. truncate the document to `MAX_DOCUMENT_CHARS`
//! 2. call the inference service in structured-output (JSON) mode
//! 3. if the answer is shorter than `MIN_RESPONSE_CHARS`, reissue once without JSON mode
//! 4. if it is still shorter than `ABSOLUTE_FLOOR_CHARS`, fail with `EmptyUpstreamResponse`
//! 5. normalize and validate
//!
//! Nothing is mutated until the full `ExtractionResult` is returned, so a
//! caller may drop the future at any await point.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::extraction::estimator::EstimationPolicy;
use crate::extraction::normalizer::normalize;
use crate::extraction::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};
use crate::extraction::types::ExtractionResult;
use crate::extraction::validator::validate;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{InferenceClient, InferenceError, InferenceRequest, Prompt};

/// Character budget for the syllabus text embedded in the prompt.
pub const MAX_DOCUMENT_CHARS: usize = 12_000;
/// Below this, JSON mode is assumed to have suppressed the answer.
pub const MIN_RESPONSE_CHARS: usize = 50;
/// Below this after the retry, the call is abandoned.
pub const ABSOLUTE_FLOOR_CHARS: usize = 30;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Inference service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Inference service error (status {status}): {body}")]
    UpstreamProtocol { status: u16, body: String },

    #[error("Inference service returned an unusable response ({chars} chars) after retry")]
    EmptyUpstreamResponse { chars: usize },

    #[error("Inference service returned an invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The request could not be built or its body could not be read.
    #[error("Inference request failed: {0}")]
    RequestFailed(String),
}

impl From<InferenceError> for ExtractionError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::Unavailable { .. } => {
                ExtractionError::UpstreamUnavailable(e.to_string())
            }
            InferenceError::Client(msg) => ExtractionError::RequestFailed(msg),
            InferenceError::Status { status, body } => {
                ExtractionError::UpstreamProtocol { status, body }
            }
            InferenceError::Envelope(msg) => ExtractionError::InvalidEnvelope(msg),
        }
    }
}

/// How the prompt is shaped and which endpoint receives it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Role-tagged system + user messages (chat endpoint).
    #[default]
    Chat,
    /// One prompt string carrying the instructions (legacy completion endpoint).
    Generate,
}

impl ExtractionStrategy {
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "chat" => Some(Self::Chat),
            "generate" => Some(Self::Generate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Generate => "generate",
        }
    }

    /// Builds the structured-output request for an already-truncated document.
    pub fn build_request(&self, document_text: &str) -> InferenceRequest {
        let user = EXTRACTION_PROMPT_TEMPLATE
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{syllabus_text}", document_text);

        let prompt = match self {
            Self::Chat => Prompt::Chat {
                system: EXTRACTION_SYSTEM.to_string(),
                user,
            },
            Self::Generate => Prompt::Completion(format!("{EXTRACTION_SYSTEM}\n\n{user}")),
        };

        InferenceRequest {
            prompt,
            json_mode: true,
        }
    }
}

/// Builds prompts, calls the inference service and turns its answer into
/// validated assignments. Holds only immutable state; share it behind an `Arc`.
#[derive(Clone)]
pub struct Extractor {
    client: Arc<dyn InferenceClient>,
    strategy: ExtractionStrategy,
    estimator: Arc<dyn EstimationPolicy>,
}

impl Extractor {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        strategy: ExtractionStrategy,
        estimator: Arc<dyn EstimationPolicy>,
    ) -> Self {
        Self {
            client,
            strategy,
            estimator,
        }
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    pub fn estimator(&self) -> &dyn EstimationPolicy {
        self.estimator.as_ref()
    }

    pub async fn extract(&self, document_text: &str) -> Result<ExtractionResult, ExtractionError> {
        let document = truncate_chars(document_text, MAX_DOCUMENT_CHARS);
        if document.len() < document_text.len() {
            info!(
                "Syllabus text truncated to {} characters for the prompt",
                MAX_DOCUMENT_CHARS
            );
        }

        let raw = self.complete_with_retry(document).await?;
        let normalized = normalize(&raw);
        let result = validate(normalized, self.estimator.as_ref());

        info!(
            "Extraction complete: {} assignments (model: {}, strategy: {}, policy: {})",
            result.assignments.len(),
            self.client.model(),
            self.strategy.name(),
            self.estimator.name()
        );

        Ok(result)
    }

    async fn complete_with_retry(&self, document: &str) -> Result<String, ExtractionError> {
        let request = self.strategy.build_request(document);
        let mut raw = self.client.complete(&request).await?;

        let chars = response_chars(&raw);
        if chars < MIN_RESPONSE_CHARS {
            warn!(
                "Minimal response ({} chars) in JSON mode, retrying without structured output",
                chars
            );
            raw = self.client.complete(&request.without_json_mode()).await?;
        }

        let chars = response_chars(&raw);
        if chars < ABSOLUTE_FLOOR_CHARS {
            return Err(ExtractionError::EmptyUpstreamResponse { chars });
        }

        Ok(raw)
    }
}

fn response_chars(raw: &str) -> usize {
    raw.trim().chars().count()
}

/// Truncates on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::estimator::HeuristicEstimator;
    use crate::extraction::types::AssignmentType;
    use crate::llm_client::MockInferenceClient;

    const GOOD_RESPONSE: &str = r#"{"course_info": {"course_name": "HIST 210", "instructor": "Prof. Ada", "semester": "Fall 2025"},
        "assignments": [
            {"title": "Response Paper 1", "type": "paper", "due_date": "2025-09-20", "description": "4 pages"},
            {"title": "Quiz 1", "type": "quiz", "due_date": "2025-09-25"},
            {"title": "Class Participation", "type": "participation"}
        ]}"#;

    fn extractor(mock: Arc<MockInferenceClient>, strategy: ExtractionStrategy) -> Extractor {
        Extractor::new(mock, strategy, Arc::new(HeuristicEstimator::current()))
    }

    #[tokio::test]
    async fn test_extract_happy_path() {
        let mock = Arc::new(MockInferenceClient::replying(&[GOOD_RESPONSE]));
        let result = extractor(mock.clone(), ExtractionStrategy::Chat)
            .extract("HIST 210 syllabus")
            .await
            .unwrap();

        assert_eq!(result.course_info.course_name.as_deref(), Some("HIST 210"));
        assert_eq!(result.assignments.len(), 2);
        assert_eq!(result.assignments[0].estimated_hours, Some(2.0));
        assert_eq!(result.assignments[1].assignment_type, AssignmentType::Quiz);
        assert_eq!(result.assignments[1].estimated_hours, None);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
    }

    #[tokio::test]
    async fn test_minimal_response_triggers_retry_without_json_mode() {
        let mock = Arc::new(MockInferenceClient::replying(&["ok", GOOD_RESPONSE]));
        let result = extractor(mock.clone(), ExtractionStrategy::Chat)
            .extract("syllabus")
            .await
            .unwrap();
        assert_eq!(result.assignments.len(), 2);

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].json_mode);
        assert!(!requests[1].json_mode);
        assert_eq!(requests[0].prompt, requests[1].prompt);
    }

    #[tokio::test]
    async fn test_response_still_below_floor_after_retry_fails() {
        let mock = Arc::new(MockInferenceClient::replying(&["{}", "{\"assignments\": []}"]));
        let err = extractor(mock.clone(), ExtractionStrategy::Chat)
            .extract("syllabus")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyUpstreamResponse { chars: 19 }));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_result_between_floor_and_threshold_is_accepted() {
        let short_but_usable = r#"{"assignments": ["Lab 1", "Lab 2"]}"#;
        assert!(short_but_usable.len() >= ABSOLUTE_FLOOR_CHARS);
        assert!(short_but_usable.len() < MIN_RESPONSE_CHARS);

        let mock = Arc::new(MockInferenceClient::replying(&["", short_but_usable]));
        let result = extractor(mock, ExtractionStrategy::Chat)
            .extract("syllabus")
            .await
            .unwrap();
        assert_eq!(result.assignments.len(), 2);
        assert_eq!(result.assignments[0].assignment_type, AssignmentType::Lab);
    }

    #[tokio::test]
    async fn test_unparseable_but_long_response_yields_zero_assignments() {
        let prose = "I could not find any assignments in this document, sorry about that.";
        let mock = Arc::new(MockInferenceClient::replying(&[prose]));
        let result = extractor(mock, ExtractionStrategy::Chat)
            .extract("syllabus")
            .await
            .unwrap();
        assert!(result.assignments.is_empty());
    }

    #[tokio::test]
    async fn test_transport_errors_are_mapped_and_not_retried() {
        let mock = Arc::new(MockInferenceClient::new(vec![Err(InferenceError::Unavailable {
            base_url: "http://localhost:11434".to_string(),
            reason: "connection refused".to_string(),
        })]));
        let err = extractor(mock.clone(), ExtractionStrategy::Chat)
            .extract("syllabus")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UpstreamUnavailable(_)));
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_inference_error_conversions() {
        let unavailable: ExtractionError = InferenceError::Unavailable {
            base_url: "http://localhost:11434".to_string(),
            reason: "timed out".to_string(),
        }
        .into();
        assert!(matches!(unavailable, ExtractionError::UpstreamUnavailable(_)));

        let envelope: ExtractionError = InferenceError::Envelope("expected value".to_string()).into();
        assert!(matches!(envelope, ExtractionError::InvalidEnvelope(m) if m == "expected value"));

        let client: ExtractionError = InferenceError::Client("relative URL without a base".to_string()).into();
        assert!(matches!(client, ExtractionError::RequestFailed(m) if m == "relative URL without a base"));
    }

    #[tokio::test]
    async fn test_status_error_carries_status_code() {
        let mock = Arc::new(MockInferenceClient::new(vec![Err(InferenceError::Status {
            status: 404,
            body: "model not found".to_string(),
        })]));
        let err = extractor(mock, ExtractionStrategy::Generate)
            .extract("syllabus")
            .await
            .unwrap_err();
        match err {
            ExtractionError::UpstreamProtocol { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_document_is_truncated_before_prompting() {
        let mock = Arc::new(MockInferenceClient::replying(&[GOOD_RESPONSE]));
        let long_text = format!("{}{}", "a".repeat(MAX_DOCUMENT_CHARS), "TAIL_MARKER");
        extractor(mock.clone(), ExtractionStrategy::Chat)
            .extract(&long_text)
            .await
            .unwrap();

        match &mock.requests()[0].prompt {
            Prompt::Chat { system, user } => {
                assert!(!user.contains("TAIL_MARKER"));
                assert!(user.contains(&"a".repeat(MAX_DOCUMENT_CHARS)));
                assert!(system.contains("participation"));
            }
            other => panic!("expected chat prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_generate_strategy_builds_single_prompt() {
        let request = ExtractionStrategy::Generate.build_request("MATH 101");
        assert!(request.json_mode);
        match request.prompt {
            Prompt::Completion(p) => {
                assert!(p.starts_with(EXTRACTION_SYSTEM));
                assert!(p.contains("MATH 101"));
                assert!(!p.contains("{syllabus_text}"));
                assert!(!p.contains("{json_only}"));
            }
            other => panic!("expected completion prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_strategy_lookup_by_name() {
        assert_eq!(ExtractionStrategy::by_name("CHAT"), Some(ExtractionStrategy::Chat));
        assert_eq!(ExtractionStrategy::by_name("generate"), Some(ExtractionStrategy::Generate));
        assert_eq!(ExtractionStrategy::by_name("stream"), None);
        assert_eq!(ExtractionStrategy::default(), ExtractionStrategy::Chat);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
