use crate::cli::ServeArgs;
use crate::infra::{build_screening_service, AppState};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use devscreen::config::AppConfig;
use devscreen::error::AppError;
use devscreen::telemetry;
use devscreen::workflows::screening::InMemorySessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (screening_service, store) = build_screening_service(&config.screening)?;
    tokio::spawn(evict_idle_sessions(store));

    let app = with_screening_routes(screening_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        session_ttl_minutes = config.screening.session_ttl_minutes,
        "developmental screening service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn evict_idle_sessions(store: Arc<InMemorySessionStore>) {
    let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(err) = store.evict_expired(Utc::now()) {
            warn!(error = %err, "session eviction failed");
        }
    }
}
