//! Web content extraction for link summaries.
//!
//! Fetching goes through [`PageFetcher`] so summaries can be tested without
//! the network; parsing is plain `scraper` over the fetched HTML.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; ChatDSJBot/1.0; +https://chatdsj.com)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Paragraphs shorter than this are navigation or captions.
const MIN_PARAGRAPH_CHARS: usize = 50;
const WORDS_PER_MINUTE: usize = 200;

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Youtube,
    Github,
    Medium,
    Pdf,
    Image,
    Video,
    Webpage,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Youtube => "youtube",
            SourceType::Github => "github",
            SourceType::Medium => "medium",
            SourceType::Pdf => "pdf",
            SourceType::Image => "image",
            SourceType::Video => "video",
            SourceType::Webpage => "webpage",
        }
    }

    fn default_tags(&self) -> Vec<String> {
        let tags: &[&str] = match self {
            SourceType::Youtube => &["video"],
            SourceType::Github => &["code", "repository"],
            SourceType::Medium => &["article"],
            _ => &[],
        };
        tags.iter().map(|t| t.to_string()).collect()
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text pulled out of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub source_type: SourceType,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl ExtractedContent {
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// Approximate reading time in whole minutes.
    pub fn reading_time_minutes(&self) -> usize {
        self.word_count() / WORDS_PER_MINUTE
    }
}

/// Retrieves raw page bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ServiceResult<String>;
}

/// [`PageFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    metrics: Option<Arc<Metrics>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ServiceResult<String> {
        if let Some(ref m) = self.metrics {
            m.track_api_call("content");
        }
        let result = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ServiceError::content(format!("failed to fetch {}: {}", url, e)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ServiceError::content(format!("{} returned {}", url, status)));
            }
            response
                .text()
                .await
                .map_err(|e| ServiceError::content(format!("failed to read {}: {}", url, e)))
        }
        .await;
        if result.is_err() {
            if let Some(ref m) = self.metrics {
                m.track_error("content");
            }
        }
        result
    }
}

/// Add `https://` when no scheme is given and require a host.
pub fn normalize_url(raw: &str) -> ServiceResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::validation("url must not be empty"));
    }
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&candidate).map_err(|e| ServiceError::validation(format!("invalid url {}: {}", raw, e)))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ServiceError::validation(format!("invalid url {}: missing host", raw))),
    }
}

pub fn source_type(url: &Url) -> SourceType {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host);
    match domain {
        "youtube.com" | "youtu.be" | "m.youtube.com" => return SourceType::Youtube,
        "github.com" => return SourceType::Github,
        "medium.com" => return SourceType::Medium,
        d if d.ends_with(".medium.com") => return SourceType::Medium,
        _ => {}
    }

    let path = url.path().to_lowercase();
    if path.ends_with(".pdf") {
        SourceType::Pdf
    } else if [".jpg", ".jpeg", ".png", ".gif"].iter().any(|ext| path.ends_with(ext)) {
        SourceType::Image
    } else if [".mp4", ".avi", ".mov", ".wmv"].iter().any(|ext| path.ends_with(ext)) {
        SourceType::Video
    } else {
        SourceType::Webpage
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let text = document
        .select(&sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());
    text
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let sel = selector(&format!("meta[name='{}']", name))?;
    let content = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    content
}

/// Paragraph texts under `root` that pass the length filter.
fn paragraphs_in(root: ElementRef<'_>, min_chars: usize) -> Vec<String> {
    let Some(p) = selector("p") else {
        return Vec::new();
    };
    root.select(&p)
        .map(element_text)
        .filter(|t| t.chars().count() > min_chars)
        .collect()
}

fn body_paragraphs(document: &Html, min_chars: usize) -> Vec<String> {
    let containers = ["main", "article", "div[class*='content']", "div[class*='main']", "div[class*='article']"];
    for css in containers {
        let Some(sel) = selector(css) else {
            continue;
        };
        let root = document.select(&sel).next();
        if let Some(root) = root {
            return paragraphs_in(root, min_chars);
        }
    }
    paragraphs_in(document.root_element(), min_chars)
}

/// Parse `html` fetched from `url` into title, body text and metadata.
pub fn extract_from_html(url: &Url, html: &str) -> ExtractedContent {
    let source = source_type(url);
    let document = Html::parse_document(html);

    let page_title = first_text(&document, "title");
    let description = meta_content(&document, "description");
    let mut tags = source.default_tags();

    let (title, content) = match source {
        SourceType::Youtube => {
            let title = page_title
                .map(|t| t.trim_end_matches(" - YouTube").to_string())
                .unwrap_or_else(|| "Untitled YouTube Video".to_string());
            let content = format!(
                "YouTube Video: {}\n\nDescription: {}\n\nNote: For a complete summary, a transcript would be needed.",
                title,
                description.as_deref().unwrap_or_default()
            );
            (title, content)
        }
        SourceType::Github => {
            let title = page_title
                .map(|t| t.split(" · GitHub").next().unwrap_or_default().trim().to_string())
                .unwrap_or_else(|| "Untitled GitHub Repository".to_string());
            let mut parts = Vec::new();
            if let Some(desc) = first_text(&document, "p.f4") {
                parts.push(format!("Description: {}", desc));
            }
            if let Some(readme) = first_text(&document, "article.markdown-body") {
                parts.push(format!("README:\n{}", readme));
            }
            let content = if parts.is_empty() {
                body_paragraphs(&document, MIN_PARAGRAPH_CHARS).join("\n\n")
            } else {
                parts.join("\n\n")
            };
            (title, content)
        }
        SourceType::Medium => {
            let title = first_text(&document, "h1")
                .or(page_title)
                .unwrap_or_else(|| "Untitled Medium Article".to_string());
            if let Some(sel) = selector("a[rel='tag']") {
                let found: Vec<String> = document
                    .select(&sel)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect();
                if !found.is_empty() {
                    tags = found;
                }
            }
            let article_sel = selector("article");
            let article = article_sel.as_ref().and_then(|sel| document.select(sel).next());
            let content = match article {
                Some(article) => paragraphs_in(article, 0).join("\n\n"),
                None => body_paragraphs(&document, MIN_PARAGRAPH_CHARS).join("\n\n"),
            };
            (title, content)
        }
        _ => {
            if let Some(keywords) = meta_content(&document, "keywords") {
                tags = keywords
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            let title = page_title.unwrap_or_else(|| "Untitled".to_string());
            (title, body_paragraphs(&document, MIN_PARAGRAPH_CHARS).join("\n\n"))
        }
    };

    ExtractedContent {
        url: url.to_string(),
        title,
        content,
        source_type: source,
        description,
        tags,
    }
}

/// Extractive summary: the first sentence, up to five sentences spread over
/// the body and the last sentence.
pub fn extractive_summary(content: &str) -> String {
    let mut sentences: Vec<&str> = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(content) {
        // keep the punctuation, drop the whitespace
        let end = m.start() + 1;
        sentences.push(content[start..end].trim());
        start = m.end();
    }
    if start < content.len() {
        sentences.push(content[start..].trim());
    }
    sentences.retain(|s| !s.is_empty());

    let Some(first) = sentences.first() else {
        return "No content available to summarize.".to_string();
    };

    let body: Vec<&str> = if sentences.len() > 5 {
        let step = (sentences.len() / 10).max(1);
        (1..sentences.len() - 1).step_by(step).take(5).map(|i| sentences[i]).collect()
    } else if sentences.len() > 2 {
        sentences[1..sentences.len() - 1].to_vec()
    } else {
        Vec::new()
    };

    let mut picked = vec![*first];
    picked.extend(body);
    if sentences.len() > 1 {
        let last = sentences[sentences.len() - 1];
        if !picked.contains(&last) {
            picked.push(last);
        }
    }
    picked.join(" ")
}

/// Fetch and parse pages.
#[derive(Clone)]
pub struct ContentService {
    fetcher: Arc<dyn PageFetcher>,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService").finish_non_exhaustive()
    }
}

impl ContentService {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn extract(&self, raw_url: &str) -> ServiceResult<ExtractedContent> {
        let url = normalize_url(raw_url)?;
        log::info!("Extracting content from {}", url);
        let html = self.fetcher.fetch(url.as_str()).await?;
        let extracted = extract_from_html(&url, &html);
        if extracted.content.trim().is_empty() {
            return Err(ServiceError::content(format!("no readable content at {}", url)));
        }
        log::debug!(
            "Extracted {} words ({}) from {}",
            extracted.word_count(),
            extracted.source_type,
            url
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> ServiceResult<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| ServiceError::content(format!("{} returned 404 Not Found", url)))
        }
    }

    const ARTICLE: &str = r#"<html><head><title>Rust Ownership</title>
        <meta name="description" content="A guide">
        <meta name="keywords" content="rust, memory , ">
        </head><body><nav><p>Home | About | Contact | Blog | Archive | Search | Login</p></nav>
        <main>
          <p>Ownership is the set of rules that govern how a Rust program manages memory.</p>
          <p>Short caption.</p>
          <p>Every value has a single owner, and the value is dropped when the owner goes out of scope.</p>
        </main></body></html>"#;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com/a").unwrap().as_str(), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com").unwrap().as_str(), "http://example.com/");
        assert!(normalize_url("").is_err());
        assert!(matches!(normalize_url("https://").unwrap_err(), ServiceError::Validation { .. }));
    }

    #[test]
    fn test_source_types() {
        let kind = |u: &str| source_type(&normalize_url(u).unwrap());
        assert_eq!(kind("https://www.youtube.com/watch?v=1"), SourceType::Youtube);
        assert_eq!(kind("youtu.be/abc"), SourceType::Youtube);
        assert_eq!(kind("https://github.com/rust-lang/rust"), SourceType::Github);
        assert_eq!(kind("https://blog.medium.com/post"), SourceType::Medium);
        assert_eq!(kind("https://example.com/paper.PDF"), SourceType::Pdf);
        assert_eq!(kind("https://example.com/cat.png"), SourceType::Image);
        assert_eq!(kind("https://example.com/clip.mp4"), SourceType::Video);
        assert_eq!(kind("https://example.com/"), SourceType::Webpage);
    }

    #[test]
    fn test_generic_page_extraction() {
        let url = normalize_url("https://example.com/post").unwrap();
        let extracted = extract_from_html(&url, ARTICLE);
        assert_eq!(extracted.title, "Rust Ownership");
        assert_eq!(extracted.description.as_deref(), Some("A guide"));
        assert_eq!(extracted.tags, vec!["rust".to_string(), "memory".to_string()]);
        assert!(extracted.content.starts_with("Ownership is the set of rules"));
        assert!(!extracted.content.contains("Short caption"));
        assert!(!extracted.content.contains("Home | About"));
        assert_eq!(extracted.source_type, SourceType::Webpage);
    }

    #[test]
    fn test_youtube_title_suffix_removed() {
        let url = normalize_url("https://www.youtube.com/watch?v=1").unwrap();
        let html = r#"<html><head><title>Intro to Rust - YouTube</title>
            <meta name="description" content="Learn Rust"></head></html>"#;
        let extracted = extract_from_html(&url, html);
        assert_eq!(extracted.title, "Intro to Rust");
        assert!(extracted.content.contains("Description: Learn Rust"));
        assert_eq!(extracted.tags, vec!["video".to_string()]);
    }

    #[test]
    fn test_extractive_summary() {
        assert_eq!(extractive_summary(""), "No content available to summarize.");
        assert_eq!(extractive_summary("Only one."), "Only one.");
        assert_eq!(extractive_summary("First. Middle! Last?"), "First. Middle! Last?");

        let long: String = (1..=12).map(|i| format!("Sentence {}. ", i)).collect();
        let summary = extractive_summary(&long);
        assert!(summary.starts_with("Sentence 1."));
        assert!(summary.ends_with("Sentence 12."));
    }

    #[tokio::test]
    async fn test_extract_through_fetcher() {
        let mut pages = HashMap::new();
        pages.insert("https://example.com/post".to_string(), ARTICLE.to_string());
        pages.insert("https://example.com/empty".to_string(), "<html></html>".to_string());
        let service = ContentService::new(Arc::new(StaticFetcher(pages)));

        let extracted = service.extract("example.com/post").await.unwrap();
        assert_eq!(extracted.url, "https://example.com/post");
        assert_eq!(extracted.reading_time_minutes(), 0);

        assert!(matches!(
            service.extract("https://example.com/empty").await.unwrap_err(),
            ServiceError::Content { .. }
        ));
        assert!(service.extract("https://example.com/missing").await.is_err());
    }
}
