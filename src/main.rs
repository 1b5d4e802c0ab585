use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use spoilage_predictor::{
    api::{self, AppState},
    config::AppConfig,
    profiles::FoodProfiles,
    services::{GeminiClient, NominatimClient, SmtpNotifier},
    SpoilagePredictor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;

    let predictor = match SpoilagePredictor::load(&cfg.artifacts, cfg.policy.clone()) {
        Ok(p) => p,
        Err(e) if cfg.require_models => {
            tracing::error!(error = %e, "refusing to start without model artifacts");
            return Err(e).context("model artifacts failed to load");
        }
        Err(e) => {
            tracing::warn!(error = %e, "serving without models; predictions will be refused");
            SpoilagePredictor::unavailable(e.to_string(), cfg.policy.clone())
        }
    };

    let profiles = match &cfg.food_profiles {
        Some(path) => FoodProfiles::load(path)?,
        None => FoodProfiles::builtin(),
    };
    tracing::info!(foods = profiles.all().len(), "food profiles ready");

    let mut state = AppState::new(predictor);
    state.profiles = Arc::new(profiles);
    state.log_predictions = cfg.log_predictions;

    if let Some(gemini) = cfg.gemini.clone() {
        tracing::info!(model = %gemini.model, "text generation enabled");
        state.chat = Some(Arc::new(GeminiClient::new(gemini)?));
    } else {
        tracing::warn!("GEMINI_API_KEY not set; /api/chat will report an error");
    }
    if let Some(places) = cfg.places.clone() {
        state.places = Some(Arc::new(NominatimClient::new(places)?));
    }
    if let Some(smtp) = &cfg.smtp {
        tracing::info!(host = %smtp.host, port = smtp.port, "email notifications enabled");
        state.notifier = Some(Arc::new(SmtpNotifier::new(smtp)?));
        state.notify_fallback = smtp.fallback_to.clone();
    }

    let app = api::router(state);

    tracing::info!("listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
