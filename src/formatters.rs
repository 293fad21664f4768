use crate::alerts::Alert;
use crate::error::PipelineError;
use crate::view::{ForecastPeriod, Observation, WeatherViewModel};

const NOT_AVAILABLE: &str = "N/A";
const NO_TIME: &str = "--:--";
const HOURLY_SHOWN: usize = 12;

fn or_na<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn format_observation(obs: Option<&Observation>, vm: &WeatherViewModel) -> String {
    let units = &vm.units;
    let Some(obs) = obs else {
        return "Current Conditions: N/A\n".to_string();
    };

    let mut output = String::from("Current Conditions");
    if let Some(station) = &vm.station_id {
        output.push_str(&format!(" ({station})"));
    }
    output.push_str(":\n");
    output.push_str(&format!(
        "  Conditions: {}\n  Temperature: {}\n  Dewpoint: {}\n  Humidity: {}\n  Wind: {}\n",
        or_na(obs.text_description.as_deref()),
        or_na(
            obs.temperature
                .map(|t| format!("{}{}", t.in_units(units.system), units.temperature))
        ),
        or_na(
            obs.dewpoint
                .map(|t| format!("{}{}", t.in_units(units.system), units.temperature))
        ),
        or_na(obs.relative_humidity.map(|h| format!("{h}%"))),
        obs.wind_text,
    ));
    if let Some(gust) = obs.wind_gust {
        output.push_str(&format!("  Gusts: {gust} {}\n", units.speed));
    }
    output.push_str(&format!(
        "  Pressure: {}\n  Visibility: {}\n",
        or_na(obs.pressure.map(|p| format!("{p:.2} {}", units.pressure))),
        or_na(obs.visibility.map(|v| format!("{v:.1} {}", units.distance))),
    ));
    output
}

fn format_period(period: &ForecastPeriod) -> String {
    let mut output = format!(
        "{}:\n  Temperature: {}\n  Wind: {} {}\n  Conditions: {}\n",
        if period.name.is_empty() { NOT_AVAILABLE } else { period.name.as_str() },
        or_na(
            period
                .temperature
                .map(|t| format!("{t}\u{00b0}{}", period.temperature_unit))
        ),
        period.wind_speed_text.as_deref().unwrap_or(NOT_AVAILABLE),
        period.wind_direction_text.as_deref().unwrap_or(""),
        or_na(period.short_forecast.as_deref()),
    );
    if let Some(pop) = period.precipitation_probability {
        output.push_str(&format!("  Precipitation: {pop}%\n"));
    }
    if let Some(details) = &period.detailed_forecast {
        output.push_str(&format!("  Details: {details}\n"));
    }
    output
}

fn hour_of(start_time: Option<&str>) -> &str {
    start_time
        .and_then(|t| t.get(11..16))
        .unwrap_or(NO_TIME)
}

/// Renders the view model as a plain-text dashboard.
pub fn format_dashboard(vm: &WeatherViewModel) -> String {
    let mut output = format!("Weather for {}\n\n", vm.location_label);

    output.push_str(&format_observation(vm.observation.as_ref(), vm));
    output.push_str(&format!(
        "  Sunrise: {}  Sunset: {}  Moon: {}\n\n",
        vm.astronomy.sunrise.as_deref().unwrap_or(NO_TIME),
        vm.astronomy.sunset.as_deref().unwrap_or(NO_TIME),
        vm.astronomy.moon_phase,
    ));

    output.push_str("Alerts: ");
    if vm.alert_summaries.is_empty() {
        output.push_str("None active\n");
    } else {
        output.push_str(&vm.alert_summaries.join("  |  "));
        output.push('\n');
    }
    if let Some(primary) = &vm.primary_alert {
        output.push_str(&format!("  {} [{}]\n", primary.headline, primary.severity.as_str()));
        if let Some(instruction) = &primary.instruction {
            output.push_str(&format!("  {instruction}\n"));
        }
    }
    output.push('\n');

    output.push_str("Forecast:\n\n");
    if vm.forecast_periods.is_empty() {
        output.push_str("  N/A\n");
    }
    for period in &vm.forecast_periods {
        output.push_str(&format_period(period));
        output.push('\n');
    }

    if !vm.hourly_periods.is_empty() {
        output.push_str("Next Hours:\n");
        for hour in vm.hourly_periods.iter().take(HOURLY_SHOWN) {
            output.push_str(&format!(
                "  {}  {:>4}  {}\n",
                hour_of(hour.start_time.as_deref()),
                or_na(hour.temperature.map(|t| format!("{t}\u{00b0}"))),
                hour.short_forecast.as_deref().unwrap_or(NOT_AVAILABLE),
            ));
        }
        output.push('\n');
    }

    if !vm.warnings.is_empty() {
        output.push_str("Partial data:\n");
        for warning in &vm.warnings {
            output.push_str(&format!("  - {warning}\n"));
        }
    }
    output
}

/// Formats weather alerts into a human-readable string
pub fn format_alerts(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "No active weather alerts.".to_string();
    }

    let mut output = String::from("Active Weather Alerts:\n\n");
    for (i, alert) in alerts.iter().enumerate() {
        output.push_str(&format!(
            "Alert {}:\n  Event: {}\n  Severity: {}\n  Urgency: {}\n  Area: {}\n",
            i + 1,
            alert.event,
            alert.severity.as_str(),
            alert.urgency,
            or_na(alert.area_description.as_deref()),
        ));
        output.push_str(&format!("  Headline: {}\n", alert.headline));
        if let Some(expires) = &alert.expires {
            output.push_str(&format!("  Expires: {expires}\n"));
        }
        if let Some(description) = &alert.description {
            output.push_str(&format!("  Description: {description}\n"));
        }
        output.push('\n');
    }
    output
}

/// Short diagnostic for a request that could not produce a dashboard.
pub fn format_failure(err: &PipelineError) -> String {
    let mut output = format!("Weather unavailable ({} stage): {err}\n", err.stage());
    match err {
        PipelineError::Points(failure) => {
            if let Some(problem) = &failure.problem {
                output.push_str(&format!("  Upstream: {problem}\n"));
            }
            output.push_str(&format!("  URL: {}\n", failure.url));
        }
        PipelineError::Transport(fetch) => {
            output.push_str(&format!("  Upstream: {}\n", fetch.detail()));
            output.push_str(&format!("  URL: {}\n", fetch.url));
        }
        PipelineError::Config(_) | PipelineError::Geocode { .. } => {}
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::Astronomy;
    use crate::config::Units;
    use crate::error::{ErrorKind, FetchError, PointFailure};
    use crate::view::{Temperature, UnitLabels};

    fn empty_view() -> WeatherViewModel {
        WeatherViewModel {
            location_label: "Linn, KS".into(),
            observation: None,
            forecast_periods: Vec::new(),
            hourly_periods: Vec::new(),
            station_id: None,
            alerts: Vec::new(),
            primary_alert: None,
            alert_summaries: Vec::new(),
            icon_key_day: None,
            icon_key_daynight: None,
            astronomy: Astronomy {
                sunrise: None,
                sunset: None,
                moon_phase: "Full Moon".into(),
            },
            units: UnitLabels::from(Units::Imperial),
            warnings: vec!["forecast: http error 500: http 500 (https://x)".into()],
        }
    }

    #[test]
    fn test_placeholders_for_missing_data() {
        let text = format_dashboard(&empty_view());
        assert!(text.starts_with("Weather for Linn, KS"));
        assert!(text.contains("Current Conditions: N/A"));
        assert!(text.contains("Alerts: None active"));
        assert!(text.contains("Sunrise: --:--"));
        assert!(text.contains("  - forecast: http error 500"));
    }

    #[test]
    fn test_observation_lines() {
        let mut vm = empty_view();
        vm.station_id = Some("KMYZ".into());
        vm.observation = Some(Observation {
            temperature: Some(Temperature { value_c: 30, value_f: 86 }),
            wind_text: "SSW @ 11 mph".into(),
            pressure: Some(29.99),
            ..Default::default()
        });
        let text = format_dashboard(&vm);
        assert!(text.contains("Current Conditions (KMYZ):"));
        assert!(text.contains("Temperature: 86°F"));
        assert!(text.contains("Wind: SSW @ 11 mph"));
        assert!(text.contains("Pressure: 29.99 inHg"));
        assert!(text.contains("Humidity: N/A"));
    }

    #[test]
    fn test_hour_of() {
        assert_eq!(hour_of(Some("2025-08-15T14:00:00-05:00")), "14:00");
        assert_eq!(hour_of(Some("soon")), "--:--");
        assert_eq!(hour_of(None), "--:--");
    }

    #[test]
    fn test_failure_diagnostic_names_stage_and_url() {
        let err = PipelineError::Points(PointFailure {
            url: "https://api.weather.gov/points/0,0".into(),
            status: Some(404),
            message: "http error 404".into(),
            problem: Some("Not Found: outside coverage".into()),
        });
        let text = format_failure(&err);
        assert!(text.contains("points stage"));
        assert!(text.contains("Upstream: Not Found: outside coverage"));
        assert!(text.contains("URL: https://api.weather.gov/points/0,0"));
    }

    #[test]
    fn test_transport_failure_prefers_problem_text() {
        let mut fetch = FetchError::new(ErrorKind::HttpStatus, "https://api.weather.gov/alerts/active?area=KS", "http 503")
            .with_status(503);
        fetch.problem = Some("Service Unavailable".into());
        let text = format_failure(&PipelineError::Transport(fetch));
        assert!(text.contains("transport stage"));
        assert!(text.contains("Upstream: Service Unavailable"));
        assert!(text.contains("URL: https://api.weather.gov/alerts/active?area=KS"));
    }

    #[test]
    fn test_no_alerts() {
        assert_eq!(format_alerts(&[]), "No active weather alerts.");
    }
}
