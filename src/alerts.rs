//! Alert normalisation, severity ranking and summaries.

use chrono::DateTime;
use serde::{Serialize, Serializer};

use crate::models::AlertProperties;

/// CAP severity. Unrecognised values are kept verbatim and rank last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    Unknown,
    Other(String),
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Extreme" => Severity::Extreme,
            "Severe" => Severity::Severe,
            "Moderate" => Severity::Moderate,
            "Minor" => Severity::Minor,
            "Unknown" | "" => Severity::Unknown,
            other => Severity::Other(other.to_string()),
        }
    }

    /// Lower is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Extreme => 0,
            Severity::Severe => 1,
            Severity::Moderate => 2,
            Severity::Minor => 3,
            Severity::Unknown => 4,
            Severity::Other(_) => 5,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Extreme => "Extreme",
            Severity::Severe => "Severe",
            Severity::Moderate => "Moderate",
            Severity::Minor => "Minor",
            Severity::Unknown => "Unknown",
            Severity::Other(s) => s,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Display class of an alert, for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Warning,
    Watch,
    Advisory,
    Statement,
}

/// A normalised active alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Option<String>,
    pub event: String,
    pub headline: String,
    pub severity: Severity,
    pub urgency: String,
    pub certainty: String,
    pub onset: Option<String>,
    pub expires: Option<String>,
    pub ends: Option<String>,
    pub area_description: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub category: AlertCategory,
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl From<&AlertProperties> for Alert {
    fn from(props: &AlertProperties) -> Self {
        let event = non_empty(&props.event).unwrap_or_else(|| "Alert".to_string());
        let headline = non_empty(&props.headline)
            .or_else(|| non_empty(&props.event))
            .unwrap_or_else(|| "Weather Alert".to_string());
        let severity = Severity::parse(props.severity.as_deref().unwrap_or("Unknown"));
        let category = categorize(&event, &severity);

        Self {
            id: non_empty(&props.id),
            event,
            headline,
            severity,
            urgency: non_empty(&props.urgency).unwrap_or_else(|| "Unknown".to_string()),
            certainty: non_empty(&props.certainty).unwrap_or_else(|| "Unknown".to_string()),
            onset: non_empty(&props.onset).or_else(|| non_empty(&props.effective)),
            expires: non_empty(&props.expires).or_else(|| non_empty(&props.ends)),
            ends: non_empty(&props.ends),
            area_description: non_empty(&props.area_desc),
            description: non_empty(&props.description),
            instruction: non_empty(&props.instruction),
            category,
        }
    }
}

fn categorize(event: &str, severity: &Severity) -> AlertCategory {
    let event = event.to_lowercase();
    if event.contains("warning") || matches!(severity, Severity::Extreme | Severity::Severe) {
        AlertCategory::Warning
    } else if event.contains("watch") {
        AlertCategory::Watch
    } else if event.contains("advisory") {
        AlertCategory::Advisory
    } else {
        AlertCategory::Statement
    }
}

/// The most severe alert; on ties the earliest in input order.
pub fn select_primary(alerts: &[Alert]) -> Option<&Alert> {
    let mut primary: Option<&Alert> = None;
    for alert in alerts {
        match primary {
            Some(held) if alert.severity.rank() >= held.severity.rank() => {}
            _ => primary = Some(alert),
        }
    }
    primary
}

/// `"<event> (until MM/DD HH:MM)"`, using the end time in its own UTC offset.
pub fn summarize(alert: &Alert) -> String {
    let until = alert
        .ends
        .as_deref()
        .or(alert.expires.as_deref())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.format("%m/%d %H:%M").to_string());

    match until {
        Some(when) => format!("{} (until {when})", alert.event),
        None => alert.event.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(event: &str, severity: &str) -> Alert {
        Alert::from(&AlertProperties {
            event: Some(event.to_string()),
            severity: Some(severity.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_rank_order() {
        let ranks: Vec<u8> = ["Extreme", "Severe", "Moderate", "Minor", "Unknown", "Bogus"]
            .iter()
            .map(|s| Severity::parse(s).rank())
            .collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_primary_is_most_severe_regardless_of_order() {
        let alerts = vec![
            alert("Flood Watch", "Moderate"),
            alert("Tornado Warning", "Extreme"),
            alert("Severe Thunderstorm Warning", "Severe"),
        ];
        assert_eq!(select_primary(&alerts).unwrap().event, "Tornado Warning");

        let mut reversed = alerts.clone();
        reversed.reverse();
        assert_eq!(select_primary(&reversed).unwrap().event, "Tornado Warning");
    }

    #[test]
    fn test_ties_keep_first() {
        let alerts = vec![alert("First", "Severe"), alert("Second", "Severe")];
        assert_eq!(select_primary(&alerts).unwrap().event, "First");
        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let a = Alert::from(&AlertProperties::default());
        assert_eq!(a.event, "Alert");
        assert_eq!(a.headline, "Weather Alert");
        assert_eq!(a.severity, Severity::Unknown);
        assert_eq!(a.urgency, "Unknown");
        assert_eq!(a.certainty, "Unknown");
        assert!(a.onset.is_none());
        assert_eq!(a.category, AlertCategory::Statement);
    }

    #[test]
    fn test_onset_and_expiry_fallbacks() {
        let a = Alert::from(&AlertProperties {
            event: Some("Heat Advisory".into()),
            effective: Some("2025-08-15T10:00:00-05:00".into()),
            ends: Some("2025-08-15T20:00:00-05:00".into()),
            ..Default::default()
        });
        assert_eq!(a.onset.as_deref(), Some("2025-08-15T10:00:00-05:00"));
        assert_eq!(a.expires.as_deref(), Some("2025-08-15T20:00:00-05:00"));
        assert_eq!(a.headline, "Heat Advisory");
        assert_eq!(a.category, AlertCategory::Advisory);
    }

    #[test]
    fn test_categories() {
        assert_eq!(alert("Flood Warning", "Moderate").category, AlertCategory::Warning);
        assert_eq!(alert("Special Weather Statement", "Severe").category, AlertCategory::Warning);
        assert_eq!(alert("Fire Weather Watch", "Moderate").category, AlertCategory::Watch);
        assert_eq!(alert("Wind Advisory", "Minor").category, AlertCategory::Advisory);
        assert_eq!(alert("Air Quality Alert", "Unknown").category, AlertCategory::Statement);
    }

    #[test]
    fn test_summary_uses_local_end_time() {
        let mut a = alert("Heat Advisory", "Moderate");
        a.expires = Some("2025-08-15T21:00:00-05:00".into());
        assert_eq!(summarize(&a), "Heat Advisory (until 08/15 21:00)");
        a.ends = Some("2025-08-15T19:30:00-05:00".into());
        assert_eq!(summarize(&a), "Heat Advisory (until 08/15 19:30)");
        a.ends = None;
        a.expires = Some("not a date".into());
        assert_eq!(summarize(&a), "Heat Advisory");
    }

    #[test]
    fn test_severity_serializes_as_text() {
        assert_eq!(serde_json::to_string(&Severity::Severe).unwrap(), "\"Severe\"");
        assert_eq!(
            serde_json::to_string(&Severity::Other("Custom".into())).unwrap(),
            "\"Custom\""
        );
    }
}
