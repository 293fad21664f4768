use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::Units;
use crate::error::FetchError;

// ============================================================================
// Lenient field parsing
// ============================================================================

/// Deserializes a field as `Some(T)` when it has the expected shape and
/// `None` otherwise, so one malformed block never fails the whole document.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// A number that may arrive as a JSON number or a numeric string.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Document shapes
// ============================================================================

/// An NWS resource that can be validated after parsing.
pub trait NwsDocument: DeserializeOwned {
    /// Name used in validation messages.
    const KIND: &'static str;

    fn is_valid(&self) -> bool {
        true
    }
}

/// Parses a single-resource document. GeoJSON wraps fields in
/// `properties`; JSON-LD puts them at the top level.
pub fn parse_document<T: NwsDocument>(url: &str, value: &Value) -> Result<T, FetchError> {
    let body = value.get("properties").filter(|p| p.is_object()).unwrap_or(value);
    let parsed: T = serde_json::from_value(body.clone())
        .map_err(|e| FetchError::validation(url, format!("invalid {}: {e}", T::KIND)))?;
    if !parsed.is_valid() {
        return Err(FetchError::validation(url, format!("invalid {} response structure", T::KIND)));
    }
    Ok(parsed)
}

/// Parses a collection document: GeoJSON `features[].properties` or
/// JSON-LD `@graph[]`. Members that fail to parse are skipped.
pub fn parse_collection<T: DeserializeOwned>(
    url: &str,
    kind: &str,
    value: &Value,
) -> Result<Vec<T>, FetchError> {
    let members: Vec<&Value> = if let Some(features) = value.get("features").and_then(Value::as_array) {
        features
            .iter()
            .map(|f| f.get("properties").unwrap_or(f))
            .collect()
    } else if let Some(graph) = value.get("@graph").and_then(Value::as_array) {
        graph.iter().collect()
    } else {
        return Err(FetchError::validation(
            url,
            format!("invalid {kind}: neither features nor @graph present"),
        ));
    };

    Ok(members
        .into_iter()
        .filter_map(|m| serde_json::from_value(m.clone()).ok())
        .collect())
}

// ============================================================================
// National Weather Service API Models
// ============================================================================

/// `{value, unitCode}` measurement wrapper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuantitativeValue {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(rename = "unitCode", default, deserialize_with = "lenient")]
    pub unit_code: Option<String>,
}

impl QuantitativeValue {
    /// The unit code without its `wmoUnit:` style namespace.
    pub fn unit(&self) -> &str {
        let code = self.unit_code.as_deref().unwrap_or("");
        code.rsplit(':').next().unwrap_or(code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CityState {
    #[serde(default, deserialize_with = "lenient")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
}

/// `relativeLocation` is a GeoJSON feature in one shape and a flat object
/// in the other.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelativeLocation {
    #[serde(default, deserialize_with = "lenient")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub properties: Option<CityState>,
}

impl RelativeLocation {
    pub fn city(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.city.as_deref())
            .or(self.city.as_deref())
    }

    pub fn state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.state.as_deref())
            .or(self.state.as_deref())
    }
}

/// `/points/{lat},{lon}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PointProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub forecast: Option<String>,
    #[serde(rename = "forecastHourly", default, deserialize_with = "lenient")]
    pub forecast_hourly: Option<String>,
    #[serde(rename = "observationStations", default, deserialize_with = "lenient")]
    pub observation_stations: Option<String>,
    #[serde(rename = "gridId", default, deserialize_with = "lenient")]
    pub grid_id: Option<String>,
    #[serde(rename = "gridX", default, deserialize_with = "lenient")]
    pub grid_x: Option<i64>,
    #[serde(rename = "gridY", default, deserialize_with = "lenient")]
    pub grid_y: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub county: Option<String>,
    #[serde(rename = "forecastZone", default, deserialize_with = "lenient")]
    pub forecast_zone: Option<String>,
    #[serde(rename = "relativeLocation", default, deserialize_with = "lenient")]
    pub relative_location: Option<RelativeLocation>,
    #[serde(rename = "timeZone", default, deserialize_with = "lenient")]
    pub time_zone: Option<String>,
}

impl NwsDocument for PointProperties {
    const KIND: &'static str = "point";

    fn is_valid(&self) -> bool {
        self.forecast.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// Forecast temperature: a bare number or a quantity object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TemperatureValue {
    Number(f64),
    Quantity(QuantitativeValue),
}

/// Wind speed in forecasts: usually text ("5 to 10 mph"), sometimes a quantity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextOrQuantity {
    Text(String),
    Quantity(QuantitativeValue),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForecastPeriodRaw {
    #[serde(default, deserialize_with = "lenient")]
    pub number: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(rename = "startTime", default, deserialize_with = "lenient")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", default, deserialize_with = "lenient")]
    pub end_time: Option<String>,
    #[serde(rename = "isDaytime", default, deserialize_with = "lenient")]
    pub is_daytime: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<TemperatureValue>,
    #[serde(rename = "temperatureUnit", default, deserialize_with = "lenient")]
    pub temperature_unit: Option<String>,
    #[serde(rename = "temperatureTrend", default, deserialize_with = "lenient")]
    pub temperature_trend: Option<String>,
    #[serde(rename = "probabilityOfPrecipitation", default, deserialize_with = "lenient")]
    pub probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(rename = "windSpeed", default, deserialize_with = "lenient")]
    pub wind_speed: Option<TextOrQuantity>,
    #[serde(rename = "windDirection", default, deserialize_with = "lenient")]
    pub wind_direction: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub icon: Option<String>,
    #[serde(rename = "shortForecast", default, deserialize_with = "lenient")]
    pub short_forecast: Option<String>,
    #[serde(rename = "detailedForecast", default, deserialize_with = "lenient")]
    pub detailed_forecast: Option<String>,
}

/// `{forecastUrl}` and `{forecastHourlyUrl}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForecastProperties {
    #[serde(default, deserialize_with = "lenient_periods")]
    pub periods: Option<Vec<ForecastPeriodRaw>>,
}

/// `None` when `periods` is missing or not an array; bad elements are dropped.
fn lenient_periods<'de, D>(deserializer: D) -> Result<Option<Vec<ForecastPeriodRaw>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

impl NwsDocument for ForecastProperties {
    const KIND: &'static str = "forecast";

    fn is_valid(&self) -> bool {
        self.periods.is_some()
    }
}

/// A member of `{stationsUrl}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StationProperties {
    #[serde(rename = "stationIdentifier", default, deserialize_with = "lenient")]
    pub station_identifier: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// `/stations/{id}/observations/latest`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ObservationProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(rename = "textDescription", default, deserialize_with = "lenient")]
    pub text_description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<QuantitativeValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub dewpoint: Option<QuantitativeValue>,
    #[serde(rename = "relativeHumidity", default, deserialize_with = "lenient")]
    pub relative_humidity: Option<QuantitativeValue>,
    #[serde(rename = "windDirection", default, deserialize_with = "lenient")]
    pub wind_direction: Option<QuantitativeValue>,
    #[serde(rename = "windSpeed", default, deserialize_with = "lenient")]
    pub wind_speed: Option<QuantitativeValue>,
    #[serde(rename = "windGust", default, deserialize_with = "lenient")]
    pub wind_gust: Option<QuantitativeValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub visibility: Option<QuantitativeValue>,
    #[serde(rename = "barometricPressure", default, deserialize_with = "lenient")]
    pub barometric_pressure: Option<QuantitativeValue>,
}

impl NwsDocument for ObservationProperties {
    const KIND: &'static str = "observation";

    fn is_valid(&self) -> bool {
        self.timestamp.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A member of `/alerts/active`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub headline: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub urgency: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub certainty: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub onset: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub effective: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub expires: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ends: Option<String>,
    #[serde(rename = "areaDesc", default, deserialize_with = "lenient")]
    pub area_desc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub instruction: Option<String>,
}

// ============================================================================
// Geocoder Models
// ============================================================================

/// One Nominatim search result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeocodePlace {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_name: Option<String>,
}

// ============================================================================
// MCP Tool Request Models
// ============================================================================

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GetAlertsRequest {
    /// Two-letter state or territory code, e.g. "KS".
    pub state: String,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct GetWeatherRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Free-text place such as "Houston, TX", used when no coordinates are given.
    pub location: Option<String>,
    pub units: Option<Units>,
    /// Observation station to prefer, e.g. "KHOU".
    pub station: Option<String>,
}
