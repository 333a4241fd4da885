//! Generative-AI add-on: summary, sentiment and key insights for one article.
//!
//! [`ChatClient`] speaks the OpenAI chat completions protocol. [`Analyzer`]
//! builds the three prompts and turns completion text into result records.

mod analysis;
mod client;
mod types;

pub use analysis::{article_text, parse_insights, parse_sentiment, Analyzer};
pub use client::{AiError, ChatClient};
pub use types::{
    AiSummary, ArticleInsights, ChatCompletionRequest, ChatCompletionResponse, Choice, Message,
    SentimentAnalysis, Usage,
};
