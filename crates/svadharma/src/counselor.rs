/// Prompt templates and the adapter over the generative-search gateway.
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{info, warn};

use svadharma_common::gemini::{AiResponse, GeminiClient, GenerateContentRequest};

use crate::model::ExamRecord;

const COUNSELOR_INSTRUCTION: &str = "You are a world-class senior career counselor specializing in the Indian and Global education landscape. Use Google Search to provide accurate, real-time information for the upcoming 2026-2027 session. Format everything in clear, beautiful Markdown.";

/// What the gateway is asked: the user-facing instruction plus optional system framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub contents: String,
    pub system_instruction: Option<String>,
}

impl Prompt {
    /// Full career roadmap for a counselor question.
    pub fn roadmap(question: &str) -> Self {
        let contents = format!(
            "User is a student planning for the future, asking: {question}. \n\
             Provide a highly detailed, step-by-step career roadmap for the 2026-2027 academic cycle. \n\
             Use Google Search to include TENTATIVE or CONFIRMED entrance exam dates, application deadlines, and expected trends for 2026-2027.\n\
             Structure your response using Markdown with clear headers for:\n\
             1. Career Path Overview\n\
             2. Step-by-Step Timeline (Leading up to 2026-27 Admissions)\n\
             3. Critical Entrance Exams & Expected Deadlines (2026-2027)\n\
             4. Recommended Courses & Top Institutions\n\
             5. Pro-Tips for Success."
        );
        Self {
            contents,
            system_instruction: Some(COUNSELOR_INSTRUCTION.to_string()),
        }
    }

    /// Latest dates, syllabus and strategy for one exam.
    pub fn deep_info(exam: &ExamRecord) -> Self {
        Self::latest(&format!(
            "{} {} undergraduate entrance exam 2026-2027 important dates syllabus application form fee structure and preparation strategy",
            exam.name, exam.category
        ))
    }

    /// Latest notifications for a free-text exam search.
    pub fn exam_search(query: &str) -> Self {
        Self::latest(&format!(
            "{query} undergraduate entrance exam 2026-2027 confirmed dates and notification"
        ))
    }

    fn latest(topic: &str) -> Self {
        Self {
            contents: format!(
                "Find the most recent real-time information about: {topic}. Focus on tentative or confirmed exam dates, notification status, and expected deadlines for the 2026-2027 academic session."
            ),
            system_instruction: None,
        }
    }
}

/// Result of one gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AiOutcome {
    Success { response: AiResponse },
    /// The provider answered but produced no text.
    EmptySuccess,
    Failure { reason: String },
}

impl AiOutcome {
    /// Classify a provider answer; blank text is not a result.
    pub fn from_response(response: AiResponse) -> Self {
        if response.text.trim().is_empty() {
            Self::EmptySuccess
        } else {
            Self::Success { response }
        }
    }

    pub fn response(&self) -> Option<&AiResponse> {
        match self {
            Self::Success { response } => Some(response),
            _ => None,
        }
    }
}

/// A natural-language question answered with text and source links.
pub trait AiGateway: Send + Sync {
    fn ask(&self, prompt: Prompt) -> BoxFuture<'_, AiOutcome>;
}

/// [`AiGateway`] over the hosted Gemini API with search grounding.
pub struct GeminiGateway {
    client: Arc<GeminiClient>,
}

impl GeminiGateway {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

impl AiGateway for GeminiGateway {
    fn ask(&self, prompt: Prompt) -> BoxFuture<'_, AiOutcome> {
        Box::pin(async move {
            let request =
                GenerateContentRequest::grounded(&prompt.contents, prompt.system_instruction.as_deref());
            match self.client.generate_content(request).await {
                Ok(resp) => {
                    let outcome = AiOutcome::from_response(resp.into_ai_response());
                    if let AiOutcome::Success { response } = &outcome {
                        info!(
                            chars = response.text.len(),
                            links = response.links.len(),
                            "gateway answered"
                        );
                    } else {
                        warn!("gateway answered with empty text");
                    }
                    outcome
                }
                Err(e) => {
                    warn!(error = %e, "gateway request failed");
                    AiOutcome::Failure {
                        reason: e.to_string(),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use svadharma_common::gemini::SourceLink;

    #[test]
    fn test_deep_info_prompt_embeds_name_and_category() {
        let catalog = Catalog::load().unwrap();
        let neet = catalog.exam("neet").unwrap();
        let prompt = Prompt::deep_info(neet);

        assert!(prompt
            .contents
            .contains("NEET UG Medical undergraduate entrance exam 2026-2027 important dates"));
        assert!(prompt.system_instruction.is_none());
        assert_eq!(prompt, Prompt::deep_info(neet));
    }

    #[test]
    fn test_exam_search_prompt() {
        let prompt = Prompt::exam_search("CUET");
        assert!(prompt.contents.starts_with(
            "Find the most recent real-time information about: CUET undergraduate entrance exam 2026-2027 confirmed dates and notification."
        ));
    }

    #[test]
    fn test_roadmap_prompt_has_sections_and_instruction() {
        let prompt = Prompt::roadmap("how to become a data scientist");
        assert!(prompt
            .contents
            .contains("asking: how to become a data scientist."));
        for header in [
            "1. Career Path Overview",
            "2. Step-by-Step Timeline",
            "3. Critical Entrance Exams",
            "4. Recommended Courses",
            "5. Pro-Tips for Success.",
        ] {
            assert!(prompt.contents.contains(header), "missing {header}");
        }
        assert!(prompt
            .system_instruction
            .as_deref()
            .unwrap()
            .contains("senior career counselor"));
    }

    #[test]
    fn test_outcome_classification() {
        let blank = AiResponse {
            text: "  \n".to_string(),
            links: vec![SourceLink {
                uri: "https://example.org".to_string(),
                title: None,
            }],
        };
        assert_eq!(AiOutcome::from_response(blank), AiOutcome::EmptySuccess);

        let full = AiResponse {
            text: "## Overview".to_string(),
            links: vec![],
        };
        let outcome = AiOutcome::from_response(full.clone());
        assert_eq!(outcome.response(), Some(&full));
        assert!(AiOutcome::Failure {
            reason: "timeout".to_string()
        }
        .response()
        .is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(AiOutcome::Failure {
            reason: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "boom");
        let empty = serde_json::to_value(AiOutcome::EmptySuccess).unwrap();
        assert_eq!(empty["status"], "empty_success");
    }
}
