mod cache;
mod config;
mod db;
mod errors;
mod explain;
mod genai;
mod interview;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{NoopCache, RedisCache, ResponseCache};
use crate::config::Config;
use crate::db::create_pool;
use crate::explain::pipeline::ExplanationPipeline;
use crate::genai::{GeminiClient, TextGenerator};
use crate::interview::store::{PgSessionStore, SessionStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prepmate API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL-backed session store
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool));

    // Initialize the response cache; absence of Redis degrades to misses
    let cache: Arc<dyn ResponseCache> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            info!("Redis client initialized");
            Arc::new(RedisCache::new(client))
        }
        None => {
            warn!("REDIS_URL not set; response caching disabled");
            Arc::new(NoopCache)
        }
    };

    // Initialize the text-generation provider
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set; AI operations will fail with CONFIGURATION_ERROR");
    }
    let provider: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    info!("Provider client initialized (model: {})", config.gemini_model);

    // Initialize the explanation pipeline
    let pipeline = Arc::new(ExplanationPipeline::new(provider.clone(), cache.clone()));

    // Build app state
    let state = AppState {
        store,
        cache,
        provider,
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
