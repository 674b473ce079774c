mod ats;
mod chat;
mod config;
mod documents;
mod errors;
mod llm_client;
mod retrieval;
mod routes;
mod server;
mod state;

use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ats::scoring::{AtsBackend, AtsScorer, KeywordAtsScorer, LlmAtsScorer};
use crate::config::Config;
use crate::documents::uploads::UploadDir;
use crate::llm_client::{ChatModel, LlmClient};
use crate::retrieval::embedder::{Embedder, HttpEmbedder};
use crate::retrieval::local_embedder::LocalBertEmbedder;
use crate::routes::build_router;
use crate::server::bind_with_fallback;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume chat API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm: Arc<dyn ChatModel> = Arc::new(LlmClient::new(
        config.llm_api_key.clone(),
        &config.llm_api_url,
        config.llm_model.clone(),
        config.max_new_tokens,
    ));
    info!("LLM client initialized (model: {})", llm.model_name());

    // Initialize embedder (remote when configured, local sentence-transformer otherwise)
    let embedder: Arc<dyn Embedder> = match &config.embedding_api_url {
        Some(url) => Arc::new(HttpEmbedder::new(
            url,
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
        )),
        None => {
            let model_id = config.embedding_model.clone();
            let local = tokio::task::spawn_blocking(move || LocalBertEmbedder::new(&model_id))
                .await?
                .context("Failed to load the local embedding model (set EMBEDDING_API_URL to use a remote one)")?;
            Arc::new(local)
        }
    };
    info!("Embedder initialized ({})", embedder.model_name());

    // Initialize ATS scorer (keyword by default, swap via ATS_SCORER)
    let ats_scorer: Arc<dyn AtsScorer> = match config.ats_backend {
        AtsBackend::Keyword => Arc::new(KeywordAtsScorer),
        AtsBackend::Llm => Arc::new(LlmAtsScorer::new(
            Arc::clone(&llm),
            config.context_window,
            config.max_new_tokens,
        )),
    };
    info!("ATS scorer: {:?}", config.ats_backend);

    let uploads = UploadDir::open(&config.upload_dir).await?;
    info!("Upload directory ready at {}", uploads.path().display());

    if config.tunnel_auth_token.is_some() {
        info!("NGROK_AUTHTOKEN is set; start the tunnel externally to expose this server");
    }

    // Build app state
    let port = config.port;
    let port_fallback = config.port_fallback;
    let state = AppState::new(config, llm, embedder, ats_scorer, uploads);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = bind_with_fallback(port, port_fallback).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
