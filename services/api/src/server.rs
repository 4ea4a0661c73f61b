use crate::cli::ServeArgs;
use crate::infra::{AppState, LiveSessions};
use crate::routes::with_verification_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_verification::config::AppConfig;
use tenant_verification::error::AppError;
use tenant_verification::telemetry;
use tenant_verification::workflows::verification::{DraftStore, HttpSubmissionGateway};
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(idle_timeout) = args.session_idle_timeout() {
        config.sessions.idle_timeout = idle_timeout;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let store = DraftStore::from_config(&config.drafts)?;
    let gateway = HttpSubmissionGateway::new(&config.gateway)?;
    if config.gateway.auth_token.is_none() {
        warn!("VERIFY_GATEWAY_TOKEN is not set; every submission will be refused");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        draft_store: store.label(),
        gateway_configured: config.gateway.auth_token.is_some(),
    };

    info!(
        draft_store = store.label(),
        endpoint = gateway.endpoint(),
        "verification collaborators ready"
    );
    let sessions: Arc<LiveSessions> = Arc::new(
        LiveSessions::new(Arc::new(store), Arc::new(gateway))
            .with_idle_timeout(config.sessions.idle_timeout),
    );

    let app = with_verification_routes(sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tenant verification service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
