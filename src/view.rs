//! The dashboard view model: everything the renderer needs, already
//! converted and classified. Absent upstream data is `None` or empty.

use serde::Serialize;

use crate::alerts::Alert;
use crate::astro::Astronomy;
use crate::config::Units;

/// A temperature in both scales, rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Temperature {
    pub value_c: i64,
    pub value_f: i64,
}

impl Temperature {
    pub fn in_units(&self, units: Units) -> i64 {
        match units {
            Units::Imperial => self.value_f,
            Units::Metric => self.value_c,
        }
    }
}

/// Display unit labels for the chosen unit system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitLabels {
    pub system: Units,
    pub temperature: &'static str,
    pub speed: &'static str,
    pub pressure: &'static str,
    pub distance: &'static str,
}

impl From<Units> for UnitLabels {
    fn from(system: Units) -> Self {
        match system {
            Units::Imperial => Self {
                system,
                temperature: "°F",
                speed: "mph",
                pressure: "inHg",
                distance: "mi",
            },
            Units::Metric => Self {
                system,
                temperature: "°C",
                speed: "kph",
                pressure: "hPa",
                distance: "km",
            },
        }
    }
}

/// Current conditions. Speeds, pressure and visibility are in the units
/// named by [`UnitLabels`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observation {
    pub timestamp: Option<String>,
    pub text_description: Option<String>,
    pub icon_url: Option<String>,
    pub temperature: Option<Temperature>,
    pub dewpoint: Option<Temperature>,
    pub relative_humidity: Option<i64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_compass: Option<String>,
    pub wind_speed: Option<i64>,
    pub wind_gust: Option<i64>,
    /// `"Calm"` or `"SSW @ 12 mph"`.
    pub wind_text: String,
    pub visibility: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPeriod {
    pub number: Option<u32>,
    pub name: String,
    pub is_daytime: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// In the preferred unit system.
    pub temperature: Option<i64>,
    pub temperature_unit: &'static str,
    pub temperature_trend: Option<String>,
    pub wind_speed_text: Option<String>,
    pub wind_direction_text: Option<String>,
    pub short_forecast: Option<String>,
    pub detailed_forecast: Option<String>,
    pub icon_key: String,
    pub precipitation_probability: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherViewModel {
    pub location_label: String,
    pub observation: Option<Observation>,
    pub forecast_periods: Vec<ForecastPeriod>,
    pub hourly_periods: Vec<ForecastPeriod>,
    pub station_id: Option<String>,
    pub alerts: Vec<Alert>,
    pub primary_alert: Option<Alert>,
    /// At most `alerts_max` one-line summaries, in received order.
    pub alert_summaries: Vec<String>,
    pub icon_key_day: Option<String>,
    pub icon_key_daynight: Option<String>,
    pub astronomy: Astronomy,
    pub units: UnitLabels,
    /// One entry per sub-fetch that failed or fell back to stale data.
    pub warnings: Vec<String>,
}
