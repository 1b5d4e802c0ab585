use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};

use crate::{error::ConfigError, model::ArtifactPaths, predictor::PredictionPolicy};

pub const MAX_DAYS_PRECISION: u32 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacesConfig {
    pub base_url: String,
    pub radius_km: f64,
    pub limit: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub fallback_to: Option<String>,
}

/// Process configuration, read from the environment once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub artifacts: ArtifactPaths,
    pub require_models: bool,
    pub policy: PredictionPolicy,
    pub food_profiles: Option<PathBuf>,
    pub gemini: Option<GeminiConfig>,
    pub places: Option<PlacesConfig>,
    pub smtp: Option<SmtpConfig>,
    pub log_predictions: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse(&get, "PORT", "a port number")?.unwrap_or(5000);
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::Malformed {
            var: "HOST",
            expected: "an IP address",
            value: host.clone(),
        })?;
        let bind_addr = SocketAddr::new(ip, port);

        let model_dir = PathBuf::from(get("MODEL_DIR").unwrap_or_else(|| "models".to_string()));
        let discovered = ArtifactPaths::discover(&model_dir);
        let artifacts = ArtifactPaths {
            classifier: get("CLASSIFIER_PATH").map(PathBuf::from).unwrap_or(discovered.classifier),
            regressor: get("REGRESSOR_PATH").map(PathBuf::from).unwrap_or(discovered.regressor),
            transform: get("TRANSFORM_PATH").map(PathBuf::from).unwrap_or(discovered.transform),
        };

        let require_models = parse_bool(&get, "REQUIRE_MODELS")?.unwrap_or(true);

        let days_precision: u32 = parse(&get, "DAYS_PRECISION", "a digit count")?.unwrap_or(2);
        if days_precision > MAX_DAYS_PRECISION {
            return Err(ConfigError::OutOfRange {
                var: "DAYS_PRECISION",
                detail: format!("{days_precision} > {MAX_DAYS_PRECISION}"),
            });
        }
        let policy = PredictionPolicy {
            days_precision,
            default_food_type: get("DEFAULT_FOOD_TYPE"),
        };

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
        });

        let places = if parse_bool(&get, "PLACES_ENABLED")?.unwrap_or(true) {
            let radius_km: f64 = parse(&get, "PLACES_RADIUS_KM", "a distance in km")?.unwrap_or(5.0);
            if !(radius_km > 0.0 && radius_km <= 100.0) {
                return Err(ConfigError::OutOfRange {
                    var: "PLACES_RADIUS_KM",
                    detail: format!("{radius_km} not in (0, 100]"),
                });
            }
            let limit: u32 = parse(&get, "PLACES_LIMIT", "a result count")?.unwrap_or(10);
            if limit == 0 || limit > 50 {
                return Err(ConfigError::OutOfRange {
                    var: "PLACES_LIMIT",
                    detail: format!("{limit} not in 1..=50"),
                });
            }
            Some(PlacesConfig {
                base_url: get("NOMINATIM_URL")
                    .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
                radius_km,
                limit,
                user_agent: get("PLACES_USER_AGENT")
                    .unwrap_or_else(|| concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()),
            })
        } else {
            None
        };

        let smtp = match (get("SMTP_HOST"), get("NOTIFY_FROM")) {
            (Some(host), Some(from)) => Some(SmtpConfig {
                host,
                port: parse(&get, "SMTP_PORT", "a port number")?.unwrap_or(587),
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                from,
                fallback_to: get("NOTIFY_FALLBACK_TO"),
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            artifacts,
            require_models,
            policy,
            food_profiles: get("FOOD_PROFILES_PATH").map(PathBuf::from),
            gemini,
            places,
            smtp,
            log_predictions: get("LOG_PRED").as_deref() == Some("1"),
        })
    }
}

fn parse<T, G>(get: &G, var: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|v| {
            v.parse().map_err(|_| ConfigError::Malformed {
                var,
                expected,
                value: v,
            })
        })
        .transpose()
}

fn parse_bool<G>(get: &G, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Malformed {
                var,
                expected: "a boolean",
                value: v,
            }),
        })
        .transpose()
}
