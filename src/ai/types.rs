use serde::{Deserialize, Serialize};

use crate::util::null_as_default;

// ============================================================================
// Chat Completion Wire Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant"
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the model produced any.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ============================================================================
// Analysis Results
// ============================================================================

/// Short AI-written summary of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiSummary {
    pub summary: String,
    pub success: bool,
    pub error: Option<String>,
}

impl AiSummary {
    pub(crate) fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            summary: String::new(),
            success: false,
            error: Some(format!("Failed to generate summary: {}", reason)),
        }
    }
}

/// Overall tone of an article as judged by the model.
///
/// `sentiment` is typically Positive/Negative/Neutral and `confidence`
/// High/Medium/Low, but whatever the model wrote is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentAnalysis {
    pub sentiment: String,
    pub confidence: String,
    pub explanation: String,
    pub success: bool,
    pub error: Option<String>,
}

impl SentimentAnalysis {
    pub(crate) fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            sentiment: "Unknown".to_string(),
            confidence: "Low".to_string(),
            explanation: String::new(),
            success: false,
            error: Some(format!("Failed to analyze sentiment: {}", reason)),
        }
    }
}

/// Key takeaways extracted from an article, one per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleInsights {
    pub insights: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl ArticleInsights {
    pub(crate) fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            insights: Vec::new(),
            success: false,
            error: Some(format!("Failed to generate insights: {}", reason)),
        }
    }
}
