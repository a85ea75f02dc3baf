use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::explain::pipeline::ExplanationPipeline;
use crate::genai::TextGenerator;
use crate::interview::store::SessionStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. Every external capability sits behind a trait object, so
/// nothing here is ambient or global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub provider: Arc<dyn TextGenerator>,
    pub pipeline: Arc<ExplanationPipeline>,
    /// Kept for handlers that need deployment settings (none currently read it).
    #[allow(dead_code)]
    pub config: Config,
}
