use axum::{
    routing::{get, post},
    Router,
    extract::{Form, Json, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::models::{SummarizeRequest, SummaryResponse};
use crate::api::{page, response};
use crate::pipeline::{summarize_url, Outcome};
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    let api: Router<AppState> = Router::new()
        .route("/api/summarize", post(summarize_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Router::new()
        .route("/", get(index_page).post(submit_form))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn run(state: &AppState, url: &str) -> Outcome {
    let start_time = std::time::Instant::now();
    let outcome = summarize_url(url, state.articles.as_ref(), state.summarizer.clone()).await;
    info!(elapsed = ?start_time.elapsed(), "request processed");
    outcome
}

async fn index_page() -> Html<String> {
    Html(page::render("", None))
}

async fn submit_form(
    State(state): State<AppState>,
    Form(req): Form<SummarizeRequest>,
) -> Html<String> {
    let outcome = run(&state, &req.url).await;
    Html(page::render(&req.url, Some(&outcome)))
}

async fn summarize_handler(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Response {
    match run(&state, &req.url).await {
        Outcome::Summarized(brief) => response::success(SummaryResponse::from(brief)).into_response(),
        outcome @ Outcome::MissingUrl => response::warning::<()>(
            StatusCode::BAD_REQUEST,
            outcome.message().unwrap_or_default().to_string(),
        )
        .into_response(),
        outcome @ Outcome::TooShort => response::error::<()>(
            StatusCode::UNPROCESSABLE_ENTITY,
            outcome.message().unwrap_or_default().to_string(),
        )
        .into_response(),
        Outcome::Failed(err) => err.into_response(),
    }
}
