//! Observation station selection.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::NWS_ACCEPT;
use crate::http::HttpClient;
use crate::models::{parse_collection, parse_document, ObservationProperties, StationProperties};
use crate::retry::Fetcher;

/// A candidate station and what probing found out about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub identifier: String,
    pub has_recent_observation: bool,
    pub last_observation_timestamp: Option<DateTime<Utc>>,
}

impl Station {
    fn unprobed(identifier: String) -> Self {
        Self {
            identifier,
            has_recent_observation: false,
            last_observation_timestamp: None,
        }
    }
}

/// Latest-observation URL for a station. Probes and the final observation
/// fetch share it, so a successful probe is served from cache afterwards.
pub fn observation_url(api_base: &str, station_id: &str) -> String {
    format!("{api_base}/stations/{station_id}/observations/latest?require_qc=false")
}

fn with_limit(url: &str, limit: usize) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}limit={limit}")
}

pub struct StationSelector<'a, C> {
    fetcher: &'a Fetcher<C>,
    api_base: &'a str,
    probe_limit: usize,
    recent: Duration,
}

impl<'a, C: HttpClient> StationSelector<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, api_base: &'a str, probe_limit: usize, recent_hours: i64) -> Self {
        Self {
            fetcher,
            api_base,
            probe_limit: probe_limit.max(1),
            recent: Duration::hours(recent_hours.clamp(0, 24 * 365)),
        }
    }

    async fn list(&self, url: &str) -> Option<Vec<String>> {
        let payload = match self.fetcher.get_json(url, NWS_ACCEPT).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("station list unavailable: {}", e);
                return None;
            }
        };
        let stations: Vec<StationProperties> = match parse_collection(url, "stations", &payload.value) {
            Ok(stations) => stations,
            Err(e) => {
                warn!("station list unusable: {}", e);
                return None;
            }
        };
        Some(
            stations
                .into_iter()
                .filter_map(|s| s.station_identifier)
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }

    /// Probes one station's latest observation with a single attempt.
    async fn probe(&self, identifier: String, now: DateTime<Utc>) -> Station {
        let url = observation_url(self.api_base, &identifier);
        let timestamp = match self.fetcher.get_json_once(&url, &[("Accept", NWS_ACCEPT)]).await {
            Ok(payload) => parse_document::<ObservationProperties>(&url, &payload.value)
                .ok()
                .and_then(|obs| obs.timestamp)
                .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            Err(e) => {
                debug!("probe of {} failed: {}", identifier, e);
                None
            }
        };

        Station {
            has_recent_observation: timestamp.is_some_and(|ts| now - ts <= self.recent),
            last_observation_timestamp: timestamp,
            identifier,
        }
    }

    /// Picks the station to read current conditions from.
    ///
    /// A preferred station is used as-is when the full list contains it.
    /// Otherwise the first `probe_limit` candidates are probed in order and
    /// the first with a recent observation wins, falling back to the first
    /// candidate. `None` when no station list is available.
    pub async fn pick(&self, stations_url: &str, preferred: Option<&str>) -> Option<Station> {
        self.pick_at(stations_url, preferred, Utc::now()).await
    }

    pub(crate) async fn pick_at(
        &self,
        stations_url: &str,
        preferred: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Station> {
        if let Some(wanted) = preferred.map(str::trim).filter(|p| !p.is_empty()) {
            let all = self.list(stations_url).await.unwrap_or_default();
            match all.into_iter().find(|id| id.eq_ignore_ascii_case(wanted)) {
                Some(id) => {
                    info!("using preferred station {}", id);
                    return Some(Station::unprobed(id));
                }
                None => warn!("preferred station {} not served by this grid point", wanted),
            }
        }

        let candidates = self.list(&with_limit(stations_url, self.probe_limit)).await?;
        let first = candidates.first().cloned()?;

        for id in candidates.into_iter().take(self.probe_limit) {
            let station = self.probe(id, now).await;
            if station.has_recent_observation {
                debug!("station {} has a recent observation", station.identifier);
                return Some(station);
            }
        }

        info!("no candidate station reported recently, using {}", first);
        Some(Station::unprobed(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::http::mock::StubClient;
    use crate::retry::RetryPolicy;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    const BASE: &str = "https://api.weather.gov";
    const STATIONS: &str = "https://api.weather.gov/gridpoints/TOP/31,80/stations";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 15, 18, 0, 0).unwrap()
    }

    fn fetcher(client: StubClient) -> Fetcher<StubClient> {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: std::time::Duration::ZERO,
            max_delay: std::time::Duration::ZERO,
        };
        Fetcher::new(client, ResponseCache::in_memory(), policy, 10)
    }

    fn station_list(ids: &[&str]) -> Value {
        let features: Vec<Value> = ids
            .iter()
            .map(|id| json!({"properties": {"stationIdentifier": id}}))
            .collect();
        json!({ "features": features })
    }

    fn observation(timestamp: &str) -> Value {
        json!({"properties": {"timestamp": timestamp}})
    }

    #[test]
    fn test_limit_parameter() {
        assert_eq!(with_limit(STATIONS, 5), format!("{STATIONS}?limit=5"));
        assert_eq!(with_limit("https://x/stations?a=1", 3), "https://x/stations?a=1&limit=3");
    }

    #[tokio::test]
    async fn test_preferred_station_skips_probing() {
        let client = StubClient::new().json(STATIONS, station_list(&["KTOP", "KFOE"]));
        let f = fetcher(client);
        let selector = StationSelector::new(&f, BASE, 5, 3);
        let station = selector.pick_at(STATIONS, Some("kfoe"), now()).await.unwrap();
        assert_eq!(station.identifier, "KFOE");
        assert_eq!(f.client().total_calls(), 1);
    }

    #[tokio::test]
    async fn test_first_recent_candidate_wins() {
        let client = StubClient::new()
            .json(&with_limit(STATIONS, 5), station_list(&["KOLD", "KNEW", "KALSO"]))
            .json(&observation_url(BASE, "KOLD"), observation("2025-08-14T06:00:00+00:00"))
            .json(&observation_url(BASE, "KNEW"), observation("2025-08-15T17:53:00+00:00"))
            .json(&observation_url(BASE, "KALSO"), observation("2025-08-15T17:55:00+00:00"));
        let f = fetcher(client);
        let selector = StationSelector::new(&f, BASE, 5, 3);
        let station = selector.pick_at(STATIONS, None, now()).await.unwrap();
        assert_eq!(station.identifier, "KNEW");
        assert!(station.has_recent_observation);
        assert_eq!(f.client().calls_to(&observation_url(BASE, "KALSO")), 0);
    }

    #[tokio::test]
    async fn test_unknown_preferred_falls_through_to_probing() {
        let client = StubClient::new()
            .json(STATIONS, station_list(&["KTOP"]))
            .json(&with_limit(STATIONS, 5), station_list(&["KTOP"]))
            .json(&observation_url(BASE, "KTOP"), observation("2025-08-15T17:00:00Z"));
        let f = fetcher(client);
        let selector = StationSelector::new(&f, BASE, 5, 3);
        let station = selector.pick_at(STATIONS, Some("KXYZ"), now()).await.unwrap();
        assert_eq!(station.identifier, "KTOP");
        assert!(station.has_recent_observation);
    }

    #[tokio::test]
    async fn test_falls_back_to_first_station() {
        let client = StubClient::new()
            .json(&with_limit(STATIONS, 2), station_list(&["KAAA", "KBBB", "KCCC"]))
            .respond(&observation_url(BASE, "KAAA"), 500, "")
            .json(&observation_url(BASE, "KBBB"), json!({"properties": {}}));
        let f = fetcher(client);
        let selector = StationSelector::new(&f, BASE, 2, 3);
        let station = selector.pick_at(STATIONS, None, now()).await.unwrap();
        assert_eq!(station.identifier, "KAAA");
        assert!(!station.has_recent_observation);
        assert_eq!(f.client().calls_to(&observation_url(BASE, "KCCC")), 0);
    }

    #[tokio::test]
    async fn test_empty_or_unreachable_list() {
        let empty = fetcher(StubClient::new().json(&with_limit(STATIONS, 5), station_list(&[])));
        assert!(StationSelector::new(&empty, BASE, 5, 3)
            .pick_at(STATIONS, None, now())
            .await
            .is_none());

        let down = fetcher(StubClient::new().fail(&with_limit(STATIONS, 5), "connection refused"));
        assert!(StationSelector::new(&down, BASE, 5, 3)
            .pick_at(STATIONS, None, now())
            .await
            .is_none());
    }
}
