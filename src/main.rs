mod api;
mod config;
mod engine;
mod error;
mod geo;
mod geocode;
mod models;
mod observability;
mod pricing;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::geocode::{NominatimClient, ReverseGeocoder};
use crate::pricing::ml::{MlDelegate, MlServiceClient};
use crate::pricing::PriceEstimator;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let delegate: Option<Arc<dyn MlDelegate>> = match &config.ml_service_url {
        Some(url) => {
            tracing::info!(url = %url, "ml prediction service configured");
            Some(Arc::new(MlServiceClient::new(
                url.clone(),
                config.ml_predict_timeout,
                config.ml_health_timeout,
                config.retry.clone(),
            )?))
        }
        None => {
            tracing::info!("no ml service configured; historical and fallback estimators only");
            None
        }
    };

    let geocoder: Option<Arc<dyn ReverseGeocoder>> = match &config.geocoder_url {
        Some(url) => Some(Arc::new(NominatimClient::new(
            url.clone(),
            config.geocoder_timeout,
        )?)),
        None => None,
    };

    let estimator = PriceEstimator::new(delegate, config.fallback_tables.clone());
    let shared_state = Arc::new(state::AppState::new(config.clone(), estimator, geocoder));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
