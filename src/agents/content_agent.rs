//! Link summarization: extraction through [`ContentService`], summary
//! through the LLM with an extractive fallback.

use std::sync::Arc;

use serde::Serialize;

use super::base_agent::{AgentProfile, BaseAgent};
use crate::llms::base_llm::{BaseLLM, CallOptions, LLMMessage};
use crate::memory::records::{NewSummary, SummaryFormat};
use crate::services::content::{extractive_summary, ContentService, SourceType};
use crate::utilities::errors::ServiceResult;
use crate::utilities::text_processing::{extract_urls, truncate_words, word_count};

/// Characters of page text sent to the model.
pub const MAX_CONTENT_CHARS: usize = 15_000;

/// A finished summary, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub format: SummaryFormat,
    pub source_type: SourceType,
    /// Words in the source text.
    pub word_count: usize,
    pub reading_time_minutes: usize,
    pub tags: Vec<String>,
}

impl ContentSummary {
    pub fn into_new_summary(self, user_id: &str) -> NewSummary {
        NewSummary {
            user_id: user_id.to_string(),
            url: self.url,
            title: self.title,
            summary: self.summary,
            format: self.format,
            source_type: self.source_type.to_string(),
            word_count: self.word_count,
        }
    }

    /// Slack rendering of the summary.
    pub fn to_slack_text(&self) -> String {
        format!(
            "*{}*\n{}\n<{}|Source> ({}, ~{} min read)",
            self.title,
            self.summary,
            self.url,
            self.source_type,
            self.reading_time_minutes.max(1)
        )
    }
}

pub struct ContentAgent {
    profile: AgentProfile,
    content: ContentService,
    llm: Option<Arc<dyn BaseLLM>>,
}

impl std::fmt::Debug for ContentAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAgent")
            .field("summarizer", &self.llm.as_ref().map(|l| l.model().to_string()))
            .finish_non_exhaustive()
    }
}

impl ContentAgent {
    pub fn new(content: ContentService, llm: Option<Arc<dyn BaseLLM>>, verbose: bool) -> Self {
        Self {
            profile: AgentProfile::new(
                "Content Processor",
                "Content extraction and summarization specialist",
            )
            .with_verbose(verbose),
            content,
            llm,
        }
    }

    pub fn extract_urls_from_text(&self, text: &str) -> Vec<String> {
        extract_urls(text)
    }

    /// Summarize the page at `url` in at most `max_words` words.
    ///
    /// The model is asked for about `max_words` words; the result is then
    /// cut to `max_words`. When the model fails or returns nothing the
    /// extractive summary is used under the same cap.
    pub async fn summarize(&self, url: &str, max_words: usize, format: SummaryFormat) -> ServiceResult<ContentSummary> {
        let extracted = self.content.extract(url).await?;

        let generated = match self.llm {
            Some(ref llm) if llm.is_available() => {
                match self
                    .generate_summary(llm.as_ref(), &extracted.title, &extracted.content, max_words, format)
                    .await
                {
                    Ok(text) if !text.trim().is_empty() => Some(text),
                    Ok(_) => {
                        log::warn!("Model returned an empty summary for {}", extracted.url);
                        None
                    }
                    Err(e) => {
                        log::error!("Error generating summary with the model: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };
        let summary = generated.unwrap_or_else(|| extractive_summary(&extracted.content));

        Ok(ContentSummary {
            summary: truncate_words(&summary, max_words),
            word_count: extracted.word_count(),
            reading_time_minutes: extracted.reading_time_minutes(),
            url: extracted.url,
            title: extracted.title,
            format,
            source_type: extracted.source_type,
            tags: extracted.tags,
        })
    }

    async fn generate_summary(
        &self,
        llm: &dyn BaseLLM,
        title: &str,
        content: &str,
        max_words: usize,
        format: SummaryFormat,
    ) -> ServiceResult<String> {
        let excerpt: String = content.chars().take(MAX_CONTENT_CHARS).collect();
        let prompt = format!(
            "Please summarize the following {} in approximately {} words.\n\
             Focus on the key points, main arguments, and important conclusions.\n\n\
             Output the summary in {} format.\n\n\
             Content to summarize:\n{}",
            title, max_words, format, excerpt
        );
        let options = CallOptions {
            // generous ceiling; the word cap is enforced afterwards
            max_tokens: Some((max_words as u32).saturating_mul(2).max(64)),
            temperature: None,
        };
        let summary = llm.acall(vec![LLMMessage::user(prompt)], &options).await?;
        log::debug!("Model summary has {} words (cap {})", word_count(&summary), max_words);
        Ok(summary)
    }
}

impl BaseAgent for ContentAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}
