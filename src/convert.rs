//! Raw NWS documents to the dashboard view model.
//!
//! Everything here is pure and total: each field group is extracted on its
//! own and missing or malformed input becomes `None`, never an error.

use chrono::{DateTime, Utc};

use crate::aggregate::RawBundle;
use crate::alerts::{select_primary, summarize, Alert};
use crate::astro::{astronomy, parse_offset_minutes};
use crate::config::{Config, Units};
use crate::constants::{MAX_FORECAST_PERIODS, MAX_HOURLY_PERIODS};
use crate::icons::{classify, classify_icon_url};
use crate::models::{
    ForecastPeriodRaw, ObservationProperties, QuantitativeValue, TemperatureValue, TextOrQuantity,
};
use crate::view::{ForecastPeriod, Observation, Temperature, UnitLabels, WeatherViewModel};

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
];

const MPS_TO_MPH: f64 = 2.23694;
const MPS_TO_KPH: f64 = 3.6;
const PA_PER_INHG: f64 = 3386.389;
const METERS_TO_MILES: f64 = 0.000621371;

/// Per-request inputs that are not part of the fetched data.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub units: Units,
    pub alerts_max: usize,
    /// Shown instead of the grid point's relative location when set.
    pub location_label: Option<String>,
    pub now: DateTime<Utc>,
}

impl ConvertOptions {
    pub fn from_config(config: &Config, location_label: Option<String>) -> Self {
        Self {
            units: config.units,
            alerts_max: config.alerts_max,
            location_label,
            now: Utc::now(),
        }
    }
}

// ── Numeric conversions ─────────────────────────────────────────────────

/// Rounds halves towards positive infinity, so `-2.5` becomes `-2`.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    round_half_up(x * factor) / factor
}

fn whole(x: f64) -> Option<i64> {
    x.is_finite().then(|| round_half_up(x) as i64)
}

pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

fn f_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// 16-point compass name for a bearing in degrees.
pub fn compass(degrees: f64) -> Option<&'static str> {
    if !degrees.is_finite() {
        return None;
    }
    let index = (round_half_up(degrees / 22.5) as i64).rem_euclid(16);
    COMPASS.get(index as usize).copied()
}

pub fn speed_in(mps: f64, units: Units) -> Option<i64> {
    match units {
        Units::Imperial => whole(mps * MPS_TO_MPH),
        Units::Metric => whole(mps * MPS_TO_KPH),
    }
}

pub fn pressure_in(pa: f64, units: Units) -> f64 {
    match units {
        Units::Imperial => round_to(pa / PA_PER_INHG, 2),
        Units::Metric => round_to(pa / 100.0, 2),
    }
}

pub fn visibility_in(meters: f64, units: Units) -> f64 {
    match units {
        Units::Imperial => round_to(meters * METERS_TO_MILES, 1),
        Units::Metric => round_to(meters / 1000.0, 1),
    }
}

// ── Unit-aware quantity readers ─────────────────────────────────────────

fn finite(q: &QuantitativeValue) -> Option<f64> {
    q.value.filter(|v| v.is_finite())
}

fn celsius(q: &QuantitativeValue) -> Option<f64> {
    let v = finite(q)?;
    Some(match q.unit() {
        "degF" => f_to_c(v),
        "K" => v - 273.15,
        _ => v,
    })
}

fn meters_per_second(q: &QuantitativeValue) -> Option<f64> {
    let v = finite(q)?;
    Some(match q.unit() {
        "km_h-1" => v / 3.6,
        "mi_h-1" | "[mi_i]/h" => v / MPS_TO_MPH,
        "kt" | "[kn_i]" => v * 0.514444,
        _ => v,
    })
}

fn pascals(q: &QuantitativeValue) -> Option<f64> {
    let v = finite(q)?;
    Some(match q.unit() {
        "hPa" => v * 100.0,
        _ => v,
    })
}

fn meters(q: &QuantitativeValue) -> Option<f64> {
    let v = finite(q)?;
    Some(match q.unit() {
        "km" => v * 1000.0,
        _ => v,
    })
}

fn temperature(q: &QuantitativeValue) -> Option<Temperature> {
    let c = celsius(q)?;
    Some(Temperature {
        value_c: whole(c)?,
        value_f: whole(c_to_f(c))?,
    })
}

/// `"Calm"` for no wind, else `"SSW @ 12 mph"`.
pub fn wind_text(compass: Option<&str>, speed: Option<i64>, unit: &str) -> String {
    match (speed, compass) {
        (None | Some(0), _) => "Calm".to_string(),
        (Some(speed), Some(dir)) => format!("{dir} @ {speed} {unit}"),
        (Some(speed), None) => format!("{speed} {unit}"),
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ── Field groups ────────────────────────────────────────────────────────

fn observation(props: &ObservationProperties, units: Units) -> Observation {
    let labels = UnitLabels::from(units);
    let direction = props.wind_direction.as_ref().and_then(finite);
    let wind_compass = direction.and_then(compass);
    let wind_speed = props
        .wind_speed
        .as_ref()
        .and_then(meters_per_second)
        .and_then(|mps| speed_in(mps, units));

    Observation {
        timestamp: non_empty(&props.timestamp),
        text_description: non_empty(&props.text_description),
        icon_url: non_empty(&props.icon),
        temperature: props.temperature.as_ref().and_then(temperature),
        dewpoint: props.dewpoint.as_ref().and_then(temperature),
        relative_humidity: props.relative_humidity.as_ref().and_then(finite).and_then(whole),
        wind_direction_deg: direction,
        wind_compass: wind_compass.map(str::to_string),
        wind_speed,
        wind_gust: props
            .wind_gust
            .as_ref()
            .and_then(meters_per_second)
            .and_then(|mps| speed_in(mps, units)),
        wind_text: wind_text(wind_compass, wind_speed, labels.speed),
        visibility: props
            .visibility
            .as_ref()
            .and_then(meters)
            .map(|m| visibility_in(m, units)),
        pressure: props
            .barometric_pressure
            .as_ref()
            .and_then(pascals)
            .map(|pa| pressure_in(pa, units)),
    }
}

/// Period temperature in the preferred units. Bare numbers are in
/// `temperatureUnit` (Fahrenheit when absent).
fn period_temperature(raw: &ForecastPeriodRaw, units: Units) -> Option<i64> {
    let celsius_source = match raw.temperature.as_ref()? {
        TemperatureValue::Number(v) => {
            let is_c = raw
                .temperature_unit
                .as_deref()
                .is_some_and(|u| u.trim().eq_ignore_ascii_case("C"));
            (*v, is_c)
        }
        TemperatureValue::Quantity(q) => (finite(q)?, q.unit() != "degF"),
    };

    let value = match (celsius_source, units) {
        ((v, true), Units::Imperial) => c_to_f(v),
        ((v, false), Units::Metric) => f_to_c(v),
        ((v, _), _) => v,
    };
    whole(value)
}

fn period_wind_speed(raw: &ForecastPeriodRaw, units: Units) -> Option<String> {
    match raw.wind_speed.as_ref()? {
        TextOrQuantity::Text(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        TextOrQuantity::Quantity(q) => {
            let speed = speed_in(meters_per_second(q)?, units)?;
            Some(format!("{speed} {}", UnitLabels::from(units).speed))
        }
    }
}

/// Forecast text first, then the period's icon URL.
fn period_icon(raw: &ForecastPeriodRaw, is_daytime: bool) -> String {
    match non_empty(&raw.short_forecast) {
        Some(text) => classify(&text, is_daytime),
        None => raw
            .icon
            .as_deref()
            .and_then(classify_icon_url)
            .unwrap_or_else(|| classify("", is_daytime)),
    }
}

fn period(raw: &ForecastPeriodRaw, default_daytime: bool, units: Units) -> ForecastPeriod {
    let is_daytime = raw.is_daytime.unwrap_or(default_daytime);
    ForecastPeriod {
        number: raw.number,
        name: non_empty(&raw.name).unwrap_or_default(),
        is_daytime,
        start_time: non_empty(&raw.start_time),
        end_time: non_empty(&raw.end_time),
        temperature: period_temperature(raw, units),
        temperature_unit: match units {
            Units::Imperial => "F",
            Units::Metric => "C",
        },
        temperature_trend: non_empty(&raw.temperature_trend),
        wind_speed_text: period_wind_speed(raw, units),
        wind_direction_text: non_empty(&raw.wind_direction),
        short_forecast: non_empty(&raw.short_forecast),
        detailed_forecast: non_empty(&raw.detailed_forecast),
        icon_key: period_icon(raw, is_daytime),
        precipitation_probability: raw
            .probability_of_precipitation
            .as_ref()
            .and_then(finite)
            .and_then(whole),
    }
}

fn periods(raw: Option<&[ForecastPeriodRaw]>, max: usize, default_daytime: bool, units: Units) -> Vec<ForecastPeriod> {
    raw.unwrap_or_default()
        .iter()
        .take(max)
        .map(|p| period(p, default_daytime, units))
        .collect()
}

fn day_variant(key: String) -> String {
    match key.strip_prefix("nt_") {
        Some(day) => day.to_string(),
        None => key,
    }
}

/// `(day, day/night)` icon keys: from the first forecast period, else the
/// observation's icon URL, else its text.
fn dashboard_icons(
    first: Option<&ForecastPeriodRaw>,
    obs: Option<&ObservationProperties>,
) -> (Option<String>, Option<String>) {
    if let Some(p0) = first {
        let daynight = period_icon(p0, p0.is_daytime.unwrap_or(false));
        let day = match non_empty(&p0.short_forecast) {
            Some(text) => classify(&text, true),
            None => day_variant(daynight.clone()),
        };
        return (Some(day), Some(daynight));
    }

    let Some(obs) = obs else {
        return (None, None);
    };
    if let Some(key) = obs.icon.as_deref().and_then(classify_icon_url) {
        return (Some(day_variant(key.clone())), Some(key));
    }
    match non_empty(&obs.text_description) {
        Some(text) => {
            let key = classify(&text, true);
            (Some(key.clone()), Some(key))
        }
        None => (None, None),
    }
}

fn location_label(bundle: &RawBundle, options: &ConvertOptions) -> String {
    if let Some(label) = options.location_label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        return label.to_string();
    }
    let place = &bundle.grid.relative_location;
    let parts: Vec<&str> = [place.city.as_deref(), place.state.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        format!(
            "{:.4}, {:.4}",
            bundle.coordinate.latitude, bundle.coordinate.longitude
        )
    } else {
        parts.join(", ")
    }
}

/// Builds the view model from whatever the aggregator managed to fetch.
pub fn convert(bundle: &RawBundle, options: &ConvertOptions) -> WeatherViewModel {
    let units = options.units;
    let forecast_raw = bundle.forecast.as_ref().and_then(|f| f.periods.as_deref());
    let hourly_raw = bundle.hourly.as_ref().and_then(|f| f.periods.as_deref());

    let alerts: Vec<Alert> = bundle.alerts.iter().map(Alert::from).collect();
    let primary_alert = select_primary(&alerts).cloned();
    let alert_summaries = alerts.iter().take(options.alerts_max).map(summarize).collect();

    let (icon_key_day, icon_key_daynight) = dashboard_icons(
        forecast_raw.and_then(|p| p.first()),
        bundle.observation.as_ref(),
    );

    let offset_minutes = forecast_raw
        .into_iter()
        .chain(hourly_raw)
        .flatten()
        .find_map(|p| p.start_time.as_deref().and_then(parse_offset_minutes))
        .unwrap_or(0);

    WeatherViewModel {
        location_label: location_label(bundle, options),
        observation: bundle.observation.as_ref().map(|o| observation(o, units)),
        forecast_periods: periods(forecast_raw, MAX_FORECAST_PERIODS, false, units),
        hourly_periods: periods(hourly_raw, MAX_HOURLY_PERIODS, true, units),
        station_id: bundle.station.as_ref().map(|s| s.identifier.clone()),
        alerts,
        primary_alert,
        alert_summaries,
        icon_key_day,
        icon_key_daynight,
        astronomy: astronomy(
            bundle.coordinate.latitude,
            bundle.coordinate.longitude,
            options.now,
            offset_minutes,
        ),
        units: UnitLabels::from(units),
        warnings: bundle.warnings.clone(),
    }
}
