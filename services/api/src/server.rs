use crate::cli::ServeArgs;
use crate::infra::{in_memory_app, seed_demo_data, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hostess_roster::config::AppConfig;
use hostess_roster::error::AppError;
use hostess_roster::telemetry;
use hostess_roster::workflows::shifts::domain::YearMonth;
use hostess_roster::workflows::shifts::{Clock, SystemClock};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (roster, store) = in_memory_app(clock.clone(), config.roster);
    if args.seed {
        let period = YearMonth::of(clock.now());
        let cast = seed_demo_data(&roster, &store, period).await?;
        info!(admin = %cast.admin.user_id, staff = cast.staff.len(), "demo data seeded");
        for member in &cast.staff {
            info!(user_id = %member.user_id, name = %member.full_name, "demo hostess");
        }
    }

    let app = with_service_routes(Arc::new(roster))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, hourly_rate = config.roster.default_hourly_rate, "hostess roster service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
