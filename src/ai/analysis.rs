use super::client::{AiError, ChatClient};
use super::types::{AiSummary, ArticleInsights, Message, SentimentAnalysis};
use crate::api::Article;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes news articles concisely.";
const SENTIMENT_SYSTEM_PROMPT: &str = "You are an expert at analyzing sentiment in news articles.";
const INSIGHTS_SYSTEM_PROMPT: &str =
    "You are an expert at extracting key insights from news articles.";

const SUMMARY_MAX_TOKENS: u32 = 150;
const SUMMARY_TEMPERATURE: f32 = 0.5;
const SENTIMENT_MAX_TOKENS: u32 = 100;
const SENTIMENT_TEMPERATURE: f32 = 0.3;
const INSIGHTS_MAX_TOKENS: u32 = 200;
const INSIGHTS_TEMPERATURE: f32 = 0.6;

const DEFAULT_SENTIMENT: &str = "Neutral";
const DEFAULT_CONFIDENCE: &str = "Medium";

/// Runs the three article analyses over a [`ChatClient`].
///
/// None of the methods return an error. A failed call comes back as a
/// result value with `success == false` and a readable `error`.
pub struct Analyzer {
    client: ChatClient,
}

impl Analyzer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    pub async fn summarize(&self, article: &Article) -> AiSummary {
        let prompt = format!(
            "Summarize the following news article in 2-3 concise sentences. \
             Focus on the key facts and main points:\n\n{}",
            article_text(article)
        );

        match self
            .ask(SUMMARY_SYSTEM_PROMPT, prompt, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE)
            .await
        {
            Ok(text) => AiSummary {
                summary: text.trim().to_string(),
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(url = %article.url, error = %e, "Summary request failed");
                AiSummary::failed(e)
            }
        }
    }

    pub async fn analyze_sentiment(&self, article: &Article) -> SentimentAnalysis {
        let prompt = format!(
            "Analyze the sentiment and tone of this news article. Provide: \
             1) Overall sentiment (Positive/Negative/Neutral), \
             2) Confidence level (High/Medium/Low), \
             3) Brief explanation in one sentence.\n\n\
             Article: {}\n\n\
             Format your response as:\n\
             Sentiment: [sentiment]\n\
             Confidence: [confidence]\n\
             Explanation: [explanation]",
            article_text(article)
        );

        match self
            .ask(
                SENTIMENT_SYSTEM_PROMPT,
                prompt,
                SENTIMENT_MAX_TOKENS,
                SENTIMENT_TEMPERATURE,
            )
            .await
        {
            Ok(text) => parse_sentiment(&text),
            Err(e) => {
                tracing::warn!(url = %article.url, error = %e, "Sentiment request failed");
                SentimentAnalysis::failed(e)
            }
        }
    }

    pub async fn generate_insights(&self, article: &Article) -> ArticleInsights {
        let prompt = format!(
            "Extract 3-5 key insights or takeaways from this news article. \
             List them as bullet points, each being one clear, actionable insight.\n\n\
             Article: {}",
            article_text(article)
        );

        match self
            .ask(
                INSIGHTS_SYSTEM_PROMPT,
                prompt,
                INSIGHTS_MAX_TOKENS,
                INSIGHTS_TEMPERATURE,
            )
            .await
        {
            Ok(text) => ArticleInsights {
                insights: parse_insights(&text),
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(url = %article.url, error = %e, "Insights request failed");
                ArticleInsights::failed(e)
            }
        }
    }

    async fn ask(
        &self,
        system: &str,
        prompt: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError> {
        let request = self.client.request(
            vec![Message::system(system), Message::user(prompt)],
            max_tokens,
            temperature,
        );
        let response = self.client.complete(&request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or(AiError::EmptyCompletion)
    }
}

/// The text sent to the model: `"{title}. {description} {content}"`, with
/// missing parts left empty.
pub fn article_text(article: &Article) -> String {
    format!(
        "{}. {} {}",
        article.title,
        article.description.as_deref().unwrap_or(""),
        article.content.as_deref().unwrap_or("")
    )
}

/// Pull `Sentiment:`, `Confidence:` and `Explanation:` lines out of a completion.
///
/// Labels match case-insensitively after leading whitespace. When a label
/// repeats, its last occurrence wins.
pub fn parse_sentiment(text: &str) -> SentimentAnalysis {
    let mut sentiment = None;
    let mut confidence = None;
    let mut explanation = None;

    for line in text.lines() {
        let line = line.trim_start();
        if let Some(value) = labelled_value(line, "sentiment:") {
            sentiment = Some(value);
        }
        if let Some(value) = labelled_value(line, "confidence:") {
            confidence = Some(value);
        }
        if let Some(value) = labelled_value(line, "explanation:") {
            explanation = Some(value);
        }
    }

    SentimentAnalysis {
        sentiment: sentiment.unwrap_or_else(|| DEFAULT_SENTIMENT.to_string()),
        confidence: confidence.unwrap_or_else(|| DEFAULT_CONFIDENCE.to_string()),
        explanation: explanation.unwrap_or_default(),
        success: true,
        error: None,
    }
}

fn labelled_value(line: &str, label: &str) -> Option<String> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim().to_string())
    } else {
        None
    }
}

/// One insight per non-blank line, with a single leading bullet removed.
pub fn parse_insights(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(['-', '•', '*'])
                .unwrap_or(line)
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
