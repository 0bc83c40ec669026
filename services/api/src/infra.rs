use devscreen::config::ScreeningConfig;
use devscreen::error::AppError;
use devscreen::workflows::screening::{
    InMemoryQuestionCatalog, InMemorySessionStore, KeywordSymptomAnalyzer, ScreeningService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type AppScreeningService =
    ScreeningService<InMemorySessionStore, InMemoryQuestionCatalog>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load the question bank from `path`, or fall back to the bank bundled with the library.
pub(crate) fn load_catalog(path: Option<&Path>) -> Result<InMemoryQuestionCatalog, AppError> {
    let catalog = match path {
        Some(path) => {
            let catalog = InMemoryQuestionCatalog::from_path(path)?;
            info!(path = %path.display(), questions = catalog.len(), "question bank loaded");
            catalog
        }
        None => {
            let catalog = InMemoryQuestionCatalog::bundled()?;
            info!(questions = catalog.len(), "using bundled question bank");
            catalog
        }
    };
    Ok(catalog)
}

/// Wire the screening service with the in-memory store and keyword analyzer.
pub(crate) fn build_screening_service(
    config: &ScreeningConfig,
) -> Result<(Arc<AppScreeningService>, Arc<InMemorySessionStore>), AppError> {
    let catalog = Arc::new(load_catalog(config.question_bank.as_deref())?);
    let store = Arc::new(InMemorySessionStore::new(config.session_ttl()));
    let service = ScreeningService::new(store.clone(), catalog)
        .with_analyzer(Arc::new(KeywordSymptomAnalyzer));
    Ok((Arc::new(service), store))
}
