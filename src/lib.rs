pub mod api;
pub mod config;
pub mod decoding;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod resources;
pub mod scraper;
pub mod summarizer;

use std::sync::Arc;
use crate::scraper::ArticleSource;
use crate::summarizer::Summarizer;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub articles: Arc<dyn ArticleSource>,
    pub summarizer: Arc<dyn Summarizer>,
}
