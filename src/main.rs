mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::middleware::{auth_middleware, staff_only};
use crate::delivery::http::v1::notices::{
    create_notice, delete_notice, get_notice, list_notices, notice_stats, update_notice,
};
use crate::repository::postgres::{
    create_pool, PostgresNoticeRepository, PostgresNotificationRepository, PostgresUserRepository,
};
use crate::usecase::jwt::JwtService;
use crate::usecase::notices::NoticesUseCase;
use crate::usecase::notifications::NotificationFanOut;
use crate::usecase::stats::StatsUseCase;

pub struct AppState {
    pub notices_usecase: NoticesUseCase<
        PostgresNoticeRepository,
        PostgresUserRepository,
        PostgresNotificationRepository,
    >,
    pub stats_usecase: StatsUseCase<PostgresNoticeRepository>,
    pub jwt_service: JwtService,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let tracer_provider = if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig::from(&config);
        let provider = telemetry::init_with_otlp(&telemetry_config, env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {}", e))?;
        Some(provider)
    } else {
        telemetry::init_json_logs(env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;
        None
    };

    tracing::info!("starting the notice board service");
    tracing::info!(telemetry_enabled = config.telemetry_enabled, "config loaded");

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let fan_out = NotificationFanOut::new(
        PostgresUserRepository::new(pool.clone()),
        PostgresNotificationRepository::new(pool.clone()),
    );
    let notices_usecase = NoticesUseCase::new(PostgresNoticeRepository::new(pool.clone()), fan_out);
    let stats_usecase = StatsUseCase::new(PostgresNoticeRepository::new(pool));

    let shared_state = Arc::new(AppState {
        notices_usecase,
        stats_usecase,
        jwt_service: JwtService::new(config.jwt_secret.clone()),
        metrics_handle,
    });

    // Reads are public; writes and stats need a teacher or admin token.
    let public_api = Router::new()
        .route("/api/v1/notices", get(list_notices))
        .route("/api/v1/notices/{id}", get(get_notice));

    let staff_api = Router::new()
        .route("/api/v1/notices", post(create_notice))
        .route("/api/v1/notices/stats", get(notice_stats))
        .route(
            "/api/v1/notices/{id}",
            put(update_notice).delete(delete_notice),
        )
        .layer(middleware::from_fn(staff_only))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(public_api)
        .merge(staff_api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(listen_addr = %config.listen_addr, "notice board service running");
    axum::serve(listener, router).await?;

    if let Some(provider) = tracer_provider {
        telemetry::shutdown(provider);
    }

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
