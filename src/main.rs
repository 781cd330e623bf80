use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing::{error, info};

use equipment_inspection as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Collaborators run in process until real return and catalog systems are wired in
    let return_source = Arc::new(api::integrations::InMemoryReturnSource::new());
    let price_catalog = Arc::new(api::integrations::InMemoryPriceCatalog::new());
    let charge_sink = Arc::new(api::integrations::RecordingChargeSink::new());

    let (app_state, event_rx) = api::AppState::new(cfg.clone(), return_source, price_catalog)
        .await
        .context("failed to initialise application state")?;
    tokio::spawn(api::events::process_events(event_rx, charge_sink));

    let mut app = api::app_router(app_state).layer(TimeoutLayer::new(Duration::from_secs(30)));
    if cfg.is_development() {
        info!("Using permissive CORS in development");
        app = app.layer(CorsLayer::permissive());
    }

    let addr = cfg.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        environment = %cfg.environment,
        write_off_policy = %cfg.write_off_policy,
        "equipment-inspection listening on http://{}",
        addr
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
