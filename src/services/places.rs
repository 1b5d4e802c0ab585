use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

use super::PlacesLookup;
use crate::{config::PlacesConfig, error::ServiceError};

const KM_PER_DEGREE: f64 = 111.32;
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A donation recipient as the map page consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ngo {
    pub id: String,
    pub name: String,
    pub address: String,
    /// `[lat, lng]`
    pub location: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    extratags: Option<HashMap<String, String>>,
}

pub fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lat1, lat2) = (a[0].to_radians(), b[0].to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b[1] - a[1]).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// `left,top,right,bottom` box of roughly `radius_km` around the point.
pub fn viewbox(lat: f64, lng: f64, radius_km: f64) -> String {
    let dlat = radius_km / KM_PER_DEGREE;
    let dlng = radius_km / (KM_PER_DEGREE * lat.to_radians().cos().max(0.01));
    format!(
        "{:.6},{:.6},{:.6},{:.6}",
        lng - dlng,
        (lat + dlat).min(90.0),
        lng + dlng,
        (lat - dlat).max(-90.0)
    )
}

/// NGO search against an OpenStreetMap Nominatim instance.
pub struct NominatimClient {
    client: Client,
    config: PlacesConfig,
}

impl NominatimClient {
    pub fn new(config: PlacesConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }

    fn to_ngos(places: Vec<NominatimPlace>, origin: [f64; 2]) -> Vec<Ngo> {
        let mut ngos: Vec<Ngo> = places
            .into_iter()
            .filter_map(|p| {
                let lat = p.lat.parse::<f64>().ok()?;
                let lng = p.lon.parse::<f64>().ok()?;
                let name = p
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| p.display_name.split(',').next().map(|s| s.trim().to_string()))
                    .unwrap_or_default();
                let email = p.extratags.and_then(|mut t| {
                    t.remove("email").or_else(|| t.remove("contact:email"))
                });
                let distance = (haversine_km(origin, [lat, lng]) * 100.0).round() / 100.0;
                Some(Ngo {
                    id: p.place_id.to_string(),
                    name,
                    address: p.display_name,
                    location: [lat, lng],
                    email,
                    distance_km: Some(distance),
                })
            })
            .collect();
        ngos.sort_by(|a, b| a.distance_km.partial_cmp(&b.distance_km).unwrap_or(std::cmp::Ordering::Equal));
        ngos
    }
}

#[async_trait]
impl PlacesLookup for NominatimClient {
    async fn nearby_ngos(&self, lat: f64, lng: f64) -> Result<Vec<Ngo>, ServiceError> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.limit.to_string();
        let viewbox = viewbox(lat, lng, self.config.radius_km);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", "ngo"),
                ("format", "json"),
                ("bounded", "1"),
                ("extratags", "1"),
                ("limit", limit.as_str()),
                ("viewbox", viewbox.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("nominatim response: {e}")))?;
        tracing::debug!(lat, lng, found = places.len(), "nominatim search");
        Ok(Self::to_ngos(places, [lat, lng]))
    }
}
