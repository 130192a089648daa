use assessment_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::rate_limit::RateLimiter,
    routes, utils, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config()?;
    init_tracing(config.log_format.as_deref() == Some("json"));

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::from_pool(pool, config.jwt_secret.as_str());

    if let Some(period) = config.abandon_sweep_secs {
        let service = app_state.attempt_service.clone();
        let grace = config.abandon_grace_minutes;
        info!(period_secs = period, grace_minutes = grace, "expired attempt sweep enabled");
        tokio::spawn(async move {
            loop {
                if let Err(e) = service.abandon_expired(utils::time::now(), grace).await {
                    tracing::error!(error = ?e, "expired attempt sweep failed");
                }
                tokio::time::sleep(Duration::from_secs(period)).await;
            }
        });
    }

    let limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window());
    let app = routes::build_router(app_state, limiter)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
