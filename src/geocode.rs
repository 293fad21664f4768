//! Free-text location lookup through a Nominatim-compatible geocoder.

use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use crate::constants::JSON_ACCEPT;
use crate::error::PipelineError;
use crate::http::HttpClient;
use crate::models::GeocodePlace;
use crate::points::Coordinate;
use crate::retry::Fetcher;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl GeocodeResult {
    pub fn coordinate(&self) -> Result<Coordinate, PipelineError> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// `"Houston, Harris County, Texas"` gives `"Houston, Harris County"`.
pub fn short_label(text: &str) -> String {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn search_url(base: &str, query: &str) -> Result<Url, String> {
    Url::parse_with_params(
        &format!("{base}/search"),
        &[("format", "json"), ("limit", "1"), ("q", query)],
    )
    .map_err(|e| format!("invalid geocoder URL: {e}"))
}

pub struct Geocoder<'a, C> {
    fetcher: &'a Fetcher<C>,
    base: &'a str,
    user_agent: String,
}

impl<'a, C: HttpClient> Geocoder<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, base: &'a str, user_agent: String) -> Self {
        Self {
            fetcher,
            base,
            user_agent,
        }
    }

    /// One lookup, first result wins. Responses are cached like any other
    /// GET but failures are not retried.
    pub async fn resolve(&self, query: &str) -> Result<GeocodeResult, PipelineError> {
        let fail = |message: String| PipelineError::Geocode {
            query: query.to_string(),
            message,
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(fail("empty location".to_string()));
        }

        let url = search_url(self.base, query).map_err(fail)?;
        let headers = [("User-Agent", self.user_agent.as_str()), ("Accept", JSON_ACCEPT)];
        let payload = self
            .fetcher
            .get_json_once(url.as_str(), &headers)
            .await
            .map_err(|e| {
                warn!("geocoder request failed: {}", e);
                fail(e.to_string())
            })?;

        let place = payload
            .value
            .as_array()
            .and_then(|results| results.first())
            .and_then(|first| serde_json::from_value::<GeocodePlace>(first.clone()).ok())
            .ok_or_else(|| fail("no results".to_string()))?;

        let (Some(latitude), Some(longitude)) = (place.lat, place.lon) else {
            return Err(fail("result has no coordinates".to_string()));
        };

        info!("geocoded {:?} to {},{}", query, latitude, longitude);
        Ok(GeocodeResult {
            latitude,
            longitude,
            display_name: place.display_name.unwrap_or_else(|| query.to_string()),
        })
    }
}
