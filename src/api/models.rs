use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::pipeline::Brief;

/// Body of both the page form and the JSON API. A missing `url` is treated
/// like an empty one.
#[derive(Debug, Default, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub word_count: usize,
    pub elapsed_secs: f64,
    pub elapsed_message: String,
    pub summarized_at: DateTime<Utc>,
}

impl From<Brief> for SummaryResponse {
    fn from(brief: Brief) -> Self {
        Self {
            elapsed_secs: brief.elapsed_secs(),
            elapsed_message: brief.elapsed_label(),
            url: brief.url,
            title: brief.title,
            summary: brief.summary,
            word_count: brief.word_count,
            summarized_at: Utc::now(),
        }
    }
}
