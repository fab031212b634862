use std::sync::{Arc, Mutex};

use news_brief::api::routes::create_router;
use news_brief::config::FetchConfig;
use news_brief::error::Result;
use news_brief::pipeline::{GENERIC_FAILURE_MESSAGE, MISSING_URL_MESSAGE, TOO_SHORT_MESSAGE};
use news_brief::scraper::ArticleFetcher;
use news_brief::summarizer::{Summarizer, SummaryOutput, SummaryParams};
use news_brief::AppState;
use serde_json::Value;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns the first sentence of its input and records every call.
#[derive(Default)]
struct FirstSentence {
    inputs: Mutex<Vec<String>>,
}

impl Summarizer for FirstSentence {
    fn summarize(&self, text: &str, _params: &SummaryParams) -> Result<Vec<SummaryOutput>> {
        self.inputs.lock().unwrap().push(text.to_string());
        let sentence = text.split_inclusive('.').next().unwrap_or(text).trim().to_string();
        Ok(vec![SummaryOutput { summary_text: sentence }])
    }
}

struct TestApp {
    base_url: String,
    summarizer: Arc<FirstSentence>,
    articles: MockServer,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Self {
        news_brief::logging::init_logging(news_brief::logging::LogFormat::Text, "debug");

        let summarizer = Arc::new(FirstSentence::default());
        let state = AppState {
            articles: Arc::new(ArticleFetcher::new(&FetchConfig::default()).unwrap()),
            summarizer: summarizer.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            summarizer,
            articles: MockServer::start().await,
            client: reqwest::Client::new(),
        }
    }

    async fn serve_article(&self, route: &str, body: String) -> String {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&self.articles)
            .await;
        format!("{}{}", self.articles.uri(), route)
    }

    async fn submit_form(&self, url: &str) -> String {
        self.client
            .post(format!("{}/", self.base_url))
            .form(&[("url", url)])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    async fn call_api(&self, url: &str) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}/api/summarize", self.base_url))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

fn article_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><article><p>{}</p></article></body></html>",
        title, body
    )
}

fn long_body(chars: usize) -> String {
    let sentence = "The river rose above its banks after a week of heavy rain. ";
    sentence.chars().cycle().take(chars).collect::<String>().trim_end().to_string()
}

#[tokio::test]
async fn index_page_renders_the_form() {
    let app = TestApp::spawn().await;
    let html = app
        .client
        .get(format!("{}/", app.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(html.contains("📰 AI News Summarizer"));
    assert!(html.contains("Summarize Now"));
}

#[tokio::test]
async fn empty_url_shows_warning() {
    let app = TestApp::spawn().await;
    let html = app.submit_form("").await;

    assert!(html.contains("alert warning"));
    assert!(html.contains(MISSING_URL_MESSAGE));
    assert!(app.summarizer.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn short_article_shows_too_short_error() {
    let app = TestApp::spawn().await;
    let url = app.serve_article("/short", article_page("Short", "Only forty characters of text live here.")).await;
    let html = app.submit_form(&url).await;

    assert!(html.contains(TOO_SHORT_MESSAGE));
    assert!(app.summarizer.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn long_article_is_summarized_from_its_first_2000_characters() {
    let app = TestApp::spawn().await;
    let body = long_body(3000);
    let url = app.serve_article("/flood", article_page("Flood warning", &body)).await;
    let html = app.submit_form(&url).await;

    let inputs = app.summarizer.inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].chars().count(), 2000);
    assert!(body.starts_with(&inputs[0]));

    assert!(html.contains("<h3>📄 Flood warning</h3>"));
    assert!(html.contains("alert success"));
    assert!(html.contains("The river rose above its banks after a week of heavy rain."));
    assert!(html.contains("Summary generated in "));
    assert!(html.contains(" seconds."));
}

#[tokio::test]
async fn unreachable_host_shows_generic_error() {
    let app = TestApp::spawn().await;
    let html = app.submit_form("http://127.0.0.1:9/news").await;

    assert!(html.contains(GENERIC_FAILURE_MESSAGE));
}

#[tokio::test]
async fn json_api_reports_summary_and_timing() {
    let app = TestApp::spawn().await;
    let url = app.serve_article("/api-flood", article_page("Flood warning", &long_body(600))).await;
    let (status, body) = app.call_api(&url).await;

    assert_eq!(status, 200);
    assert_eq!(body["meta"]["status"], "success");
    assert_eq!(body["data"]["title"], "Flood warning");
    assert_eq!(
        body["data"]["summary"],
        "The river rose above its banks after a week of heavy rain."
    );
    let message = body["data"]["elapsed_message"].as_str().unwrap();
    assert!(message.starts_with("Summary generated in "));
    assert!(body["data"]["elapsed_secs"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn json_api_maps_messages_to_statuses() {
    let app = TestApp::spawn().await;

    let (status, body) = app.call_api("  ").await;
    assert_eq!(status, 400);
    assert_eq!(body["meta"]["status"], "warning");
    assert_eq!(body["meta"]["message"], MISSING_URL_MESSAGE);

    let blocked = format!("{}/blocked", app.articles.uri());
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&app.articles)
        .await;
    let (status, body) = app.call_api(&blocked).await;
    assert_eq!(status, 502);
    assert_eq!(body["meta"]["message"], GENERIC_FAILURE_MESSAGE);
    assert!(body["data"].is_null());
}
