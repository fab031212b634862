use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{AppError, Result};

/// Title and body text pulled out of an article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub text: String,
}

/// Where articles come from. Downloading and parsing are separate steps and
/// both have to succeed before the text is usable.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<String>;

    fn parse(&self, html: &str) -> Result<ExtractedArticle>;
}

/// Fetches pages over HTTP and extracts them with [`extract_article`].
#[derive(Clone)]
pub struct ArticleFetcher {
    client: Client,
}

impl ArticleFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleSource for ArticleFetcher {
    async fn download(&self, url: &str) -> Result<String> {
        fetch_html(&self.client, url).await
    }

    fn parse(&self, html: &str) -> Result<ExtractedArticle> {
        extract_article(html)
    }
}

// Create static selectors to avoid recompiling them each time
static OG_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("Failed to parse og:title selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});

static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1").expect("Failed to parse h1 selector")
});

static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p").expect("Failed to parse paragraph selector")
});

/// Containers that usually hold the article body, most specific first.
static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        r#"[itemprop="articleBody"]"#,
        "main",
        r#"[role="main"]"#,
        ".post-content",
        ".entry-content",
        "#content",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Failed to parse content selector"))
    .collect()
});

pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;

    if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
        if !content_type.contains("html") {
            return Err(AppError::FetchError(format!(
                "Unsupported content type: {}",
                content_type
            )));
        }
    }

    let html = response.text().await?;
    debug!(url, bytes = html.len(), "downloaded page");
    Ok(html)
}

pub fn extract_article(html: &str) -> Result<ExtractedArticle> {
    if html.trim().is_empty() {
        return Err(AppError::ParseError("The page is empty".to_string()));
    }

    let document = Html::parse_document(html);
    let title = extract_title(&document).unwrap_or_default();
    let text = extract_text(&document);

    debug!(title = %title, chars = text.chars().count(), "extracted article");
    Ok(ExtractedArticle { title, text })
}

fn extract_title(document: &Html) -> Option<String> {
    let og_title = document
        .select(&OG_TITLE_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .find(|title| !title.is_empty());
    if og_title.is_some() {
        return og_title;
    }

    [&*TITLE_SELECTOR, &*H1_SELECTOR].into_iter().find_map(|selector| {
        document
            .select(selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|title| !title.is_empty())
    })
}

fn extract_text(document: &Html) -> String {
    for selector in CONTENT_SELECTORS.iter() {
        for container in document.select(selector) {
            let text = paragraphs_text(container);
            if !text.is_empty() {
                return text;
            }
        }
    }

    paragraphs_text(document.root_element())
}

fn paragraphs_text(container: ElementRef<'_>) -> String {
    container
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
