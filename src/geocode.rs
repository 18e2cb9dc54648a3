use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::GeoPoint;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Turns coordinates into a display string. Failures are logged and reported
/// as `None`; callers substitute a degraded label, never an error.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn locate(&self, point: &GeoPoint) -> Option<String>;
}

pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    road: Option<String>,
    village: Option<String>,
    town: Option<String>,
    city: Option<String>,
    district: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("farm2mandi-backend")
            .build()
            .map_err(|err| AppError::Internal(format!("geocoder http client: {err}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn summarize(response: ReverseResponse) -> Option<String> {
        let address = match response.address {
            Some(address) => address,
            None => return response.display_name,
        };

        let mut parts: Vec<String> = Vec::new();
        if let Some(road) = address.road {
            parts.push(road);
        }
        if let Some(place) = address.village.or(address.town).or(address.city) {
            parts.push(place);
        }
        if let Some(district) = address.district {
            parts.push(district);
        }
        if let Some(state) = address.state {
            parts.push(state);
        }
        if let Some(country) = address.country {
            parts.push(country);
        }

        if parts.is_empty() {
            response.display_name
        } else {
            Some(parts.join(", "))
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn locate(&self, point: &GeoPoint) -> Option<String> {
        let result = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", point.lat.to_string()),
                ("lon", point.lng.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "reverse geocoding returned error status");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "reverse geocoding request failed");
                return None;
            }
        };

        match response.json::<ReverseResponse>().await {
            Ok(body) => Self::summarize(body),
            Err(err) => {
                warn!(error = %err, "reverse geocoding body invalid");
                None
            }
        }
    }
}

/// Degraded display string when no provider is configured or it failed.
pub fn coordinate_label(point: &GeoPoint) -> String {
    format!("{:.4}, {:.4}", point.lat, point.lng)
}

#[cfg(test)]
mod tests {
    use super::{coordinate_label, NominatimClient, ReverseResponse};
    use crate::models::GeoPoint;

    #[test]
    fn summary_joins_address_parts_in_order() {
        let response: ReverseResponse = serde_json::from_str(
            r#"{
                "display_name": "full display name",
                "address": {
                    "road": "NH 44",
                    "village": "Pullur",
                    "district": "Kurnool",
                    "state": "Andhra Pradesh",
                    "country": "India"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            NominatimClient::summarize(response).unwrap(),
            "NH 44, Pullur, Kurnool, Andhra Pradesh, India"
        );
    }

    #[test]
    fn summary_falls_back_to_display_name() {
        let response: ReverseResponse =
            serde_json::from_str(r#"{"display_name": "somewhere", "address": {}}"#).unwrap();
        assert_eq!(NominatimClient::summarize(response).unwrap(), "somewhere");
    }

    #[test]
    fn coordinate_label_formats_four_decimals() {
        let point = GeoPoint {
            lat: 15.8,
            lng: 78.0,
        };
        assert_eq!(coordinate_label(&point), "15.8000, 78.0000");
    }
}
