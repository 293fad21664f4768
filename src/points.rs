//! Coordinates and `/points` grid-point resolution.

use serde::Serialize;
use tracing::{info, warn};

use crate::constants::NWS_ACCEPT;
use crate::error::{PipelineError, PointFailure};
use crate::http::HttpClient;
use crate::models::{parse_document, PointProperties};
use crate::retry::Fetcher;

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, PipelineError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(PipelineError::Config(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(PipelineError::Config(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Rounded to 4 decimal places, the precision `/points` accepts.
    pub fn rounded(&self) -> Self {
        let round4 = |v: f64| (v * 10_000.0).round() / 10_000.0;
        Self {
            latitude: round4(self.latitude),
            longitude: round4(self.longitude),
        }
    }
}

/// Nearby place named by the grid point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Place {
    pub city: Option<String>,
    pub state: Option<String>,
}

/// The parts of a `/points` response the rest of the pipeline uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPoint {
    pub forecast_url: String,
    pub forecast_hourly_url: Option<String>,
    pub observation_stations_url: Option<String>,
    pub grid_id: Option<String>,
    pub grid_x: Option<i64>,
    pub grid_y: Option<i64>,
    pub relative_location: Place,
    pub county_id: Option<String>,
    pub forecast_zone_id: Option<String>,
    pub time_zone: Option<String>,
}

/// Last path segment of a zone URL: `.../zones/county/KSC091` gives `KSC091`.
fn zone_id(url: &Option<String>) -> Option<String> {
    url.as_deref()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Two-letter state prefix of a zone or county id such as `KSZ091`.
fn state_prefix(id: &str) -> Option<String> {
    let prefix = id.get(..2)?;
    prefix
        .chars()
        .all(|c| c.is_ascii_uppercase())
        .then(|| prefix.to_string())
}

impl GridPoint {
    fn from_properties(props: PointProperties) -> Option<Self> {
        let relative_location = props
            .relative_location
            .as_ref()
            .map(|rl| Place {
                city: rl.city().map(str::to_string),
                state: rl.state().map(str::to_string),
            })
            .unwrap_or_default();

        Some(Self {
            county_id: zone_id(&props.county),
            forecast_zone_id: zone_id(&props.forecast_zone),
            forecast_url: props.forecast.filter(|f| !f.is_empty())?,
            forecast_hourly_url: props.forecast_hourly,
            observation_stations_url: props.observation_stations,
            grid_id: props.grid_id,
            grid_x: props.grid_x,
            grid_y: props.grid_y,
            relative_location,
            time_zone: props.time_zone,
        })
    }

    /// State code for area-based alert queries: the county id prefix, then
    /// the forecast zone prefix, then the relative location's state.
    pub fn infer_state(&self) -> Option<String> {
        self.county_id
            .as_deref()
            .and_then(state_prefix)
            .or_else(|| self.forecast_zone_id.as_deref().and_then(state_prefix))
            .or_else(|| {
                self.relative_location
                    .state
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| s.len() == 2)
                    .map(str::to_ascii_uppercase)
            })
    }
}

pub fn points_url(api_base: &str, coordinate: &Coordinate) -> String {
    format!(
        "{api_base}/points/{},{}",
        coordinate.latitude, coordinate.longitude
    )
}

async fn try_point<C: HttpClient>(
    fetcher: &Fetcher<C>,
    url: &str,
) -> Result<GridPoint, PointFailure> {
    let payload = fetcher.get_json(url, NWS_ACCEPT).await?;
    let props: PointProperties = parse_document(url, &payload.value)?;
    GridPoint::from_properties(props).ok_or_else(|| PointFailure {
        url: url.to_string(),
        status: None,
        message: "grid point has no forecast URL".to_string(),
        problem: None,
    })
}

/// Resolves a coordinate to its grid point, retrying once at 4-decimal
/// precision when the exact coordinate is rejected.
pub async fn resolve_point<C: HttpClient>(
    fetcher: &Fetcher<C>,
    api_base: &str,
    coordinate: Coordinate,
) -> Result<GridPoint, PointFailure> {
    let url = points_url(api_base, &coordinate);
    let first = match try_point(fetcher, &url).await {
        Ok(point) => return Ok(point),
        Err(failure) => failure,
    };

    let rounded = coordinate.rounded();
    if rounded == coordinate {
        return Err(first);
    }

    warn!("points lookup failed for {} ({}), retrying rounded", url, first.message);
    let url = points_url(api_base, &rounded);
    let point = try_point(fetcher, &url).await?;
    info!("resolved grid point with rounded coordinates {}", url);
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::http::mock::StubClient;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;

    const BASE: &str = "https://api.weather.gov";

    fn fetcher(client: StubClient) -> Fetcher<StubClient> {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        Fetcher::new(client, ResponseCache::in_memory(), policy, 10)
    }

    fn point_body() -> serde_json::Value {
        json!({"properties": {
            "forecast": "https://api.weather.gov/gridpoints/HGX/65,97/forecast",
            "forecastHourly": "https://api.weather.gov/gridpoints/HGX/65,97/forecast/hourly",
            "observationStations": "https://api.weather.gov/gridpoints/HGX/65,97/stations",
            "gridId": "HGX", "gridX": 65, "gridY": 97,
            "county": "https://api.weather.gov/zones/county/TXC201",
            "forecastZone": "https://api.weather.gov/zones/forecast/TXZ213",
            "relativeLocation": {"properties": {"city": "Houston", "state": "TX"}},
            "timeZone": "America/Chicago"
        }})
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(29.76, -95.37).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.1).is_err());
        let err = Coordinate::new(f64::NAN, 0.0).unwrap_err();
        assert_eq!(err.stage(), "validation");
    }

    #[tokio::test]
    async fn test_exact_coordinates_resolve() {
        let url = format!("{BASE}/points/29.7604,-95.3698");
        let f = fetcher(StubClient::new().json(&url, point_body()));
        let point = resolve_point(&f, BASE, Coordinate::new(29.7604, -95.3698).unwrap())
            .await
            .unwrap();
        assert!(point.forecast_url.ends_with("/forecast"));
        assert_eq!(point.grid_id.as_deref(), Some("HGX"));
        assert_eq!(point.county_id.as_deref(), Some("TXC201"));
        assert_eq!(point.forecast_zone_id.as_deref(), Some("TXZ213"));
        assert_eq!(point.relative_location.city.as_deref(), Some("Houston"));
        assert_eq!(f.client().total_calls(), 1);
    }

    #[tokio::test]
    async fn test_rounded_retry_after_rejection() {
        let exact = format!("{BASE}/points/29.760427,-95.369803");
        let rounded = format!("{BASE}/points/29.7604,-95.3698");
        let client = StubClient::new()
            .respond(&exact, 301, r#"{"title": "Adjusting Precision"}"#)
            .json(&rounded, point_body());
        let f = fetcher(client);
        let point = resolve_point(&f, BASE, Coordinate::new(29.760427, -95.369803).unwrap())
            .await
            .unwrap();
        assert_eq!(point.grid_x, Some(65));
        assert_eq!(f.client().calls_to(&exact), 1);
        assert_eq!(f.client().calls_to(&rounded), 1);
    }

    #[tokio::test]
    async fn test_both_attempts_fail_reports_last_url() {
        let rounded = format!("{BASE}/points/29.7604,-95.3698");
        let client = StubClient::new().respond(
            &rounded,
            404,
            r#"{"title": "Data Unavailable For Requested Point", "detail": "Unable to provide data"}"#,
        );
        let f = fetcher(client);
        let failure = resolve_point(&f, BASE, Coordinate::new(29.760427, -95.369803).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.url, rounded);
        assert_eq!(failure.status, Some(404));
        assert!(!failure.message.is_empty());
        assert_eq!(
            failure.problem.as_deref(),
            Some("Data Unavailable For Requested Point: Unable to provide data")
        );
    }

    #[tokio::test]
    async fn test_no_second_attempt_when_rounding_is_a_no_op() {
        let url = format!("{BASE}/points/51.5,-0.12");
        let f = fetcher(StubClient::new().respond(&url, 404, "{}"));
        let failure = resolve_point(&f, BASE, Coordinate::new(51.5, -0.12).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.url, url);
        assert_eq!(f.client().total_calls(), 1);
    }

    #[tokio::test]
    async fn test_point_without_forecast_is_failure() {
        let url = format!("{BASE}/points/40,-100");
        let f = fetcher(StubClient::new().json(&url, json!({"properties": {"gridId": "GLD"}})));
        let failure = resolve_point(&f, BASE, Coordinate::new(40.0, -100.0).unwrap())
            .await
            .unwrap_err();
        assert!(failure.message.contains("point"));
    }

    #[test]
    fn test_state_inference_order() {
        let mut point = GridPoint {
            forecast_url: "f".into(),
            forecast_hourly_url: None,
            observation_stations_url: None,
            grid_id: None,
            grid_x: None,
            grid_y: None,
            relative_location: Place {
                city: Some("Linn".into()),
                state: Some("ks".into()),
            },
            county_id: Some("KSZ091".into()),
            forecast_zone_id: Some("MOZ001".into()),
            time_zone: None,
        };
        assert_eq!(point.infer_state().as_deref(), Some("KS"));

        point.county_id = Some("123".into());
        assert_eq!(point.infer_state().as_deref(), Some("MO"));

        point.forecast_zone_id = None;
        assert_eq!(point.infer_state().as_deref(), Some("KS"));

        point.relative_location.state = None;
        assert_eq!(point.infer_state(), None);
    }
}
