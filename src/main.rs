use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use news_brief::{
    config::Config,
    api::routes::create_router,
    logging::init_logging,
    resources,
    scraper::ArticleFetcher,
    summarizer::load_summarizer,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    init_logging(config.log_format, "info");

    // One-time setup; the model is required, the prefetch is not
    let model_config = config.model.clone();
    let summarizer = tokio::task::spawn_blocking(move || {
        resources::prepare(&model_config);
        load_summarizer(&model_config)
    })
    .await??;

    let server_addr = config.server_addr;
    let app_state = AppState {
        articles: Arc::new(ArticleFetcher::new(&config.fetch)?),
        summarizer,
    };

    let app = create_router(app_state);
    let listener = TcpListener::bind(server_addr).await?;

    info!(%server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
