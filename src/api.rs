use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::{PredictError, ServiceError},
    predictor::SpoilagePredictor,
    profiles::{FoodProfile, FoodProfiles},
    services::{
        resolve_recipient, ChatCommand, DonationDetails, DonationNotice, Ngo, Notifier,
        PlacesLookup, TextGenerator,
    },
    types::{FeatureVector, PredictionResponse, RawFeatures},
};

pub const CHAT_NOT_CONFIGURED: &str = "Error: Gemini API is not configured on the server.";
pub const CHAT_FAILED: &str = "I'm experiencing technical difficulties.";
pub const CHAT_NO_TEXT: &str =
    "I apologize, but I couldn't generate a response for that topic. Could you ask something else?";

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<SpoilagePredictor>,
    pub profiles: Arc<FoodProfiles>,
    pub chat: Option<Arc<dyn TextGenerator>>,
    pub places: Option<Arc<dyn PlacesLookup>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub notify_fallback: Option<String>,
    pub log_predictions: bool,
}

impl AppState {
    /// State with only the predictor wired; collaborators are attached by
    /// the caller.
    pub fn new(predictor: SpoilagePredictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
            profiles: Arc::new(FoodProfiles::builtin()),
            chat: None,
            places: None,
            notifier: None,
            notify_fallback: None,
            log_predictions: false,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict", post(predict))
        .route("/api/chat", post(chat))
        .route("/api/get-ngos", get(get_ngos))
        .route("/api/notify-ngo", post(notify_ngo))
        .route("/api/foods", get(foods))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------- Errors ----------

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": msg.into() })))
}

fn predict_error(e: PredictError) -> ApiError {
    match &e {
        PredictError::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        PredictError::ModelUnavailable(_) => {
            tracing::error!(error = %e, "prediction refused");
            api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

// ---------- Prediction ----------

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<RawFeatures>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(raw) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let fv = state.predictor.validate(&raw).map_err(predict_error)?;
    if state.log_predictions {
        tracing::info!(
            food_type = %fv.food_type,
            temperature = fv.temperature,
            moisture = fv.moisture,
            gas = fv.gas,
            "recv prediction request"
        );
    }
    note_out_of_range(&state.profiles, &fv);

    let out = state.predictor.predict_features(&fv).map_err(predict_error)?;
    Ok(Json(out))
}

fn note_out_of_range(profiles: &FoodProfiles, fv: &FeatureVector) {
    if let Some(profile) = profiles.get(&fv.food_type) {
        let outside = profile.out_of_range(fv);
        if !outside.is_empty() {
            tracing::debug!(food_type = %fv.food_type, ?outside, "readings outside the trained range");
        }
    }
}

async fn foods(State(state): State<AppState>) -> Json<Vec<FoodProfile>> {
    Json(state.profiles.all().to_vec())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.predictor.unavailable_reason() {
        None => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".into(),
                model_loaded: true,
                detail: None,
            }),
        ),
        Some(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".into(),
                model_loaded: false,
                detail: Some(reason.to_string()),
            }),
        ),
    }
}

// ---------- Chat ----------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

fn reply(status: StatusCode, text: impl Into<String>) -> (StatusCode, Json<ChatReply>) {
    (status, Json(ChatReply { reply: text.into() }))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ChatReply>) {
    let Some(generator) = state.chat.as_ref() else {
        return reply(StatusCode::INTERNAL_SERVER_ERROR, CHAT_NOT_CONFIGURED);
    };
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => return reply(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let command = ChatCommand::parse(&req.message, &req.context);
    if matches!(command, ChatCommand::Question(q) if q.is_empty()) {
        return reply(StatusCode::BAD_REQUEST, "message is required");
    }

    match generator.generate(&command.prompt()).await {
        Ok(Some(text)) => reply(StatusCode::OK, text),
        Ok(None) => reply(StatusCode::OK, CHAT_NO_TEXT),
        Err(e) => {
            tracing::warn!(error = %e, "chat generation failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILED)
        }
    }
}

// ---------- NGO lookup & notification ----------

#[derive(Debug, Deserialize)]
pub struct NgoQuery {
    pub lat: f64,
    pub lng: f64,
}

async fn get_ngos(
    State(state): State<AppState>,
    query: Result<Query<NgoQuery>, QueryRejection>,
) -> Result<Json<Vec<Ngo>>, ApiError> {
    let Query(q) = query.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    if !(q.lat.is_finite() && (-90.0..=90.0).contains(&q.lat)) {
        return Err(api_error(StatusCode::BAD_REQUEST, "lat must be within [-90, 90]"));
    }
    if !(q.lng.is_finite() && (-180.0..=180.0).contains(&q.lng)) {
        return Err(api_error(StatusCode::BAD_REQUEST, "lng must be within [-180, 180]"));
    }
    let places = state
        .places
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "places lookup is not configured"))?;

    places.nearby_ngos(q.lat, q.lng).await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, lat = q.lat, lng = q.lng, "ngo lookup failed");
        api_error(StatusCode::BAD_GATEWAY, "Failed to fetch nearby NGOs.")
    })
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub ngo: Ngo,
    #[serde(rename = "formDetails")]
    pub form_details: DonationDetails,
}

async fn notify_ngo(
    State(state): State<AppState>,
    payload: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let notifier = state.notifier.as_ref().ok_or_else(|| {
        api_error(StatusCode::SERVICE_UNAVAILABLE, "email notifications are not configured")
    })?;
    let Json(req) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    if let Some(field) = req.form_details.missing_field() {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("{field} is required")));
    }
    let to = resolve_recipient(&req.ngo, state.notify_fallback.as_deref()).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("no email address is known for {}", req.ngo.name),
        )
    })?;

    let notice = DonationNotice {
        to,
        ngo: req.ngo,
        details: req.form_details,
    };
    match notifier.notify(&notice).await {
        Ok(()) => Ok(Json(json!({ "message": format!("{} has been notified", notice.ngo.name) }))),
        Err(ServiceError::InvalidAddress(addr)) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("invalid email address {addr:?}"),
        )),
        Err(e) => {
            tracing::warn!(error = %e, ngo = %notice.ngo.name, "donation notice failed");
            Err(api_error(StatusCode::BAD_GATEWAY, "Failed to notify the NGO."))
        }
    }
}
