//! The request sequence behind every submission: fetch, extract, truncate,
//! validate, summarize, and time the whole thing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::scraper::{ArticleSource, ExtractedArticle};
use crate::summarizer::{SummaryParams, Summarizer};

pub const MISSING_URL_MESSAGE: &str = "Please enter a URL first.";
pub const TOO_SHORT_MESSAGE: &str = "Text is too short to summarize. Try another link.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Could not process this link. Some websites block AI access.";

/// Only this many characters of the article reach the model.
pub const MAX_INPUT_CHARS: usize = 2000;
/// Truncated text shorter than this is mostly boilerplate.
pub const MIN_INPUT_CHARS: usize = 100;

pub const SUMMARY_PARAMS: SummaryParams = SummaryParams {
    max_length: 120,
    min_length: 40,
    deterministic: true,
};

/// A finished summary of one article.
#[derive(Debug, Clone, PartialEq)]
pub struct Brief {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub word_count: usize,
    pub elapsed: Duration,
}

impl Brief {
    pub fn elapsed_secs(&self) -> f64 {
        round_up_hundredths(self.elapsed)
    }

    pub fn elapsed_label(&self) -> String {
        elapsed_label(self.elapsed)
    }
}

#[derive(Debug)]
pub enum Outcome {
    MissingUrl,
    TooShort,
    Failed(AppError),
    Summarized(Brief),
}

impl Outcome {
    /// Text shown for anything but a successful summary.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Outcome::MissingUrl => Some(MISSING_URL_MESSAGE),
            Outcome::TooShort => Some(TOO_SHORT_MESSAGE),
            Outcome::Failed(err) => Some(err.user_message()),
            Outcome::Summarized(_) => None,
        }
    }
}

/// Outcome of the steps after the input gate.
enum Processed {
    TooShort,
    Summarized { article: ExtractedArticle, summary: String },
}

#[instrument(skip_all, fields(url = %url))]
pub async fn summarize_url(
    url: &str,
    source: &dyn ArticleSource,
    summarizer: Arc<dyn Summarizer>,
) -> Outcome {
    let url = url.trim();
    if url.is_empty() {
        warn!("no URL submitted");
        return Outcome::MissingUrl;
    }

    let start_time = Instant::now();
    match process(url, source, summarizer).await {
        Ok(Processed::TooShort) => {
            warn!("extracted text too short to summarize");
            Outcome::TooShort
        }
        Ok(Processed::Summarized { article, summary }) => {
            let elapsed = start_time.elapsed();
            info!(?elapsed, "summary generated");
            Outcome::Summarized(Brief {
                url: url.to_string(),
                word_count: article.text.split_whitespace().count(),
                title: article.title,
                summary,
                elapsed,
            })
        }
        Err(err) => {
            warn!(error = %err, "could not process link");
            Outcome::Failed(err)
        }
    }
}

async fn process(
    url: &str,
    source: &dyn ArticleSource,
    summarizer: Arc<dyn Summarizer>,
) -> Result<Processed> {
    let html = source.download(url).await?;
    let article = source.parse(&html)?;

    let input_text = truncate_chars(&article.text, MAX_INPUT_CHARS);
    if input_text.chars().count() < MIN_INPUT_CHARS {
        return Ok(Processed::TooShort);
    }

    info!(chars = input_text.chars().count(), "summarizing article");
    let output = tokio::task::spawn_blocking(move || {
        summarizer.summarize(&input_text, &SUMMARY_PARAMS)
    })
    .await
        .map_err(|e| AppError::SummarizationError(format!("Summarizer task failed: {}", e)))??;

    let summary = output
        .into_iter()
        .next()
        .map(|out| out.summary_text)
        .ok_or_else(|| AppError::SummarizationError("The model returned no summary".to_string()))?;

    Ok(Processed::Summarized { article, summary })
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub fn elapsed_label(elapsed: Duration) -> String {
    format!("Summary generated in {:.2} seconds.", round_up_hundredths(elapsed))
}

/// Rounds up so the reported time never undercuts the measured one.
fn round_up_hundredths(elapsed: Duration) -> f64 {
    // integer nanoseconds, so exact hundredths are not nudged up by float error
    elapsed.as_nanos().div_ceil(10_000_000) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::SummaryOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        text: String,
        fail_download: bool,
        fail_parse: bool,
        downloads: AtomicUsize,
    }

    impl FakeSource {
        fn with_text(text: impl Into<String>) -> Self {
            Self { text: text.into(), ..Self::default() }
        }
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        async fn download(&self, url: &str) -> Result<String> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.fail_download {
                return Err(AppError::FetchError(format!("unreachable: {}", url)));
            }
            Ok("<html></html>".to_string())
        }

        fn parse(&self, _html: &str) -> Result<ExtractedArticle> {
            if self.fail_parse {
                return Err(AppError::ParseError("broken markup".to_string()));
            }
            Ok(ExtractedArticle { title: "Storm hits coast".to_string(), text: self.text.clone() })
        }
    }

    #[derive(Default)]
    struct RecordingSummarizer {
        calls: Mutex<Vec<(String, SummaryParams)>>,
        fail: bool,
        empty: bool,
    }

    impl Summarizer for RecordingSummarizer {
        fn summarize(&self, text: &str, params: &SummaryParams) -> Result<Vec<SummaryOutput>> {
            self.calls.lock().unwrap().push((text.to_string(), *params));
            if self.fail {
                return Err(AppError::SummarizationError("model crashed".to_string()));
            }
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(vec![SummaryOutput { summary_text: format!("summary of {} chars", text.chars().count()) }])
        }
    }

    fn article_text(len: usize) -> String {
        "abcdefghij".chars().cycle().take(len).collect()
    }

    #[tokio::test]
    async fn blank_url_never_fetches() {
        for url in ["", "   ", "\t\n"] {
            let source = FakeSource::with_text(article_text(500));
            let summarizer = Arc::new(RecordingSummarizer::default());
            let outcome = summarize_url(url, &source, summarizer.clone()).await;

            assert!(matches!(outcome, Outcome::MissingUrl));
            assert_eq!(outcome.message(), Some(MISSING_URL_MESSAGE));
            assert_eq!(source.downloads.load(Ordering::SeqCst), 0);
            assert!(summarizer.calls.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn short_text_is_not_summarized() {
        let source = FakeSource::with_text(article_text(40));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let outcome = summarize_url("https://example.com/a", &source, summarizer.clone()).await;

        assert!(matches!(outcome, Outcome::TooShort));
        assert_eq!(outcome.message(), Some(TOO_SHORT_MESSAGE));
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn boundary_length_is_summarized() {
        let source = FakeSource::with_text(article_text(MIN_INPUT_CHARS));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let outcome = summarize_url("https://example.com/a", &source, summarizer.clone()).await;

        assert!(matches!(outcome, Outcome::Summarized(_)));
        assert_eq!(summarizer.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn long_article_is_truncated_before_summarizing() {
        let text = article_text(3000);
        let source = FakeSource::with_text(text.clone());
        let summarizer = Arc::new(RecordingSummarizer::default());
        let outcome = summarize_url(" https://example.com/a ", &source, summarizer.clone()).await;

        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (input, params) = &calls[0];
        assert_eq!(input.as_str(), &text[..2000]);
        assert_eq!(*params, SummaryParams { max_length: 120, min_length: 40, deterministic: true });

        let Outcome::Summarized(brief) = outcome else {
            panic!("expected a summary");
        };
        assert_eq!(brief.url, "https://example.com/a");
        assert_eq!(brief.title, "Storm hits coast");
        assert_eq!(brief.summary, "summary of 2000 chars");
        assert_eq!(brief.word_count, 1);
        assert!(brief.elapsed_label().starts_with("Summary generated in "));
    }

    #[tokio::test]
    async fn every_failure_collapses_to_the_generic_message() {
        let download_fails = FakeSource { fail_download: true, ..FakeSource::with_text(article_text(500)) };
        let parse_fails = FakeSource { fail_parse: true, ..FakeSource::with_text(article_text(500)) };
        let ok_source = FakeSource::with_text(article_text(500));

        let cases: Vec<(&FakeSource, RecordingSummarizer)> = vec![
            (&download_fails, RecordingSummarizer::default()),
            (&parse_fails, RecordingSummarizer::default()),
            (&ok_source, RecordingSummarizer { fail: true, ..Default::default() }),
            (&ok_source, RecordingSummarizer { empty: true, ..Default::default() }),
        ];

        for (source, summarizer) in cases {
            let outcome = summarize_url("https://example.com/a", source, Arc::new(summarizer)).await;
            assert!(matches!(outcome, Outcome::Failed(_)));
            assert_eq!(outcome.message(), Some(GENERIC_FAILURE_MESSAGE));
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 2000), "short");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn elapsed_label_has_two_decimals_and_never_undercounts() {
        assert_eq!(elapsed_label(Duration::from_millis(1500)), "Summary generated in 1.50 seconds.");
        assert_eq!(elapsed_label(Duration::from_millis(1234)), "Summary generated in 1.24 seconds.");
        assert_eq!(elapsed_label(Duration::ZERO), "Summary generated in 0.00 seconds.");

        let elapsed = Duration::from_micros(2_345_001);
        assert!(round_up_hundredths(elapsed) >= elapsed.as_secs_f64());
    }

    #[test]
    fn exact_hundredths_are_not_rounded_past() {
        for (millis, label) in [(1100, "1.10"), (70, "0.07"), (2290, "2.29"), (10, "0.01")] {
            assert_eq!(
                elapsed_label(Duration::from_millis(millis)),
                format!("Summary generated in {} seconds.", label)
            );
        }
        assert_eq!(
            elapsed_label(Duration::from_nanos(1_100_000_001)),
            "Summary generated in 1.11 seconds."
        );
    }
}
