//! Fan-out over the per-grid-point resources.
//!
//! Forecast, hourly forecast, current observation and alerts are fetched
//! concurrently. Each branch recovers from its own failures and reports them
//! as warnings; nothing here is fatal.

use tracing::{info, warn};

use crate::config::Config;
use crate::constants::NWS_ACCEPT;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::models::{
    parse_collection, parse_document, AlertProperties, ForecastProperties, NwsDocument,
    ObservationProperties,
};
use crate::points::{Coordinate, GridPoint};
use crate::retry::Fetcher;
use crate::stations::{observation_url, Station, StationSelector};

/// Typed upstream documents for one dashboard request.
#[derive(Debug, Clone)]
pub struct RawBundle {
    pub grid: GridPoint,
    pub coordinate: Coordinate,
    pub forecast: Option<ForecastProperties>,
    pub hourly: Option<ForecastProperties>,
    pub station: Option<Station>,
    pub observation: Option<ObservationProperties>,
    pub alerts: Vec<AlertProperties>,
    pub warnings: Vec<String>,
}

impl RawBundle {
    /// A bundle with only the grid point, as if every sub-fetch failed.
    pub fn empty(grid: GridPoint, coordinate: Coordinate) -> Self {
        Self {
            grid,
            coordinate,
            forecast: None,
            hourly: None,
            station: None,
            observation: None,
            alerts: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Result of one branch plus the warnings it produced.
type Branch<T> = (T, Vec<String>);

pub fn alerts_point_url(api_base: &str, coordinate: &Coordinate) -> String {
    let c = coordinate.rounded();
    format!("{api_base}/alerts/active?point={},{}", c.latitude, c.longitude)
}

pub fn alerts_area_url(api_base: &str, state: &str) -> String {
    format!("{api_base}/alerts/active?area={state}")
}

pub struct Aggregator<'a, C> {
    fetcher: &'a Fetcher<C>,
    config: &'a Config,
}

impl<'a, C: HttpClient> Aggregator<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, config: &'a Config) -> Self {
        Self { fetcher, config }
    }

    async fn fetch<T, F>(&self, url: &str, parse: F) -> Result<(T, bool), FetchError>
    where
        F: FnOnce(&str, &serde_json::Value) -> Result<T, FetchError>,
    {
        let payload = self.fetcher.get_json(url, NWS_ACCEPT).await?;
        let parsed = parse(url, &payload.value)?;
        Ok((parsed, payload.stale))
    }

    /// Fetches and parses one document, turning any failure into a warning.
    async fn document<T: NwsDocument>(&self, label: &str, url: Option<&str>) -> Branch<Option<T>> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return (None, vec![format!("{label}: no URL in grid point")]);
        };

        match self.fetch(url, parse_document::<T>).await {
            Ok((doc, stale)) => (Some(doc), stale_warning(label, stale)),
            Err(e) => {
                warn!("{} unavailable: {}", label, e);
                (None, vec![format!("{label}: {e}")])
            }
        }
    }

    async fn observation(
        &self,
        grid: &GridPoint,
        preferred: Option<&str>,
    ) -> Branch<(Option<Station>, Option<ObservationProperties>)> {
        let selector = StationSelector::new(
            self.fetcher,
            &self.config.api_base,
            self.config.station_probe_limit,
            self.config.station_recent_hours,
        );
        let station = match grid.observation_stations_url.as_deref() {
            Some(url) => selector.pick(url, preferred).await,
            None => None,
        };
        let Some(station) = station else {
            return ((None, None), vec!["observation: no observation station available".to_string()]);
        };

        let url = observation_url(&self.config.api_base, &station.identifier);
        let (observation, warnings) = self
            .document::<ObservationProperties>("observation", Some(&url))
            .await;
        ((Some(station), observation), warnings)
    }

    async fn alert_list(&self, url: &str) -> Result<(Vec<AlertProperties>, bool), FetchError> {
        self.fetch(url, |url, value| parse_collection(url, "alerts", value))
            .await
    }

    /// Point query first, then the inferred state's area query.
    async fn alerts(&self, grid: &GridPoint, coordinate: &Coordinate) -> Branch<Vec<AlertProperties>> {
        if self.config.alerts_max == 0 {
            return (Vec::new(), Vec::new());
        }

        let point_url = alerts_point_url(&self.config.api_base, coordinate);
        let point_error = match self.alert_list(&point_url).await {
            Ok((alerts, stale)) => return (alerts, stale_warning("alerts", stale)),
            Err(e) => e,
        };

        let Some(state) = grid.infer_state() else {
            warn!("point alerts failed and no state code is known: {}", point_error);
            return (Vec::new(), vec![format!("alerts: {point_error}")]);
        };

        info!("point alerts failed ({}), falling back to area {}", point_error, state);
        match self.alert_list(&alerts_area_url(&self.config.api_base, &state)).await {
            Ok((alerts, stale)) => (alerts, stale_warning("alerts", stale)),
            Err(e) => {
                warn!("area alerts for {} failed: {}", state, e);
                (Vec::new(), vec![format!("alerts: {e}")])
            }
        }
    }

    /// Gathers everything the converter needs for one grid point.
    pub async fn aggregate(
        &self,
        grid: GridPoint,
        coordinate: Coordinate,
        preferred_station: Option<&str>,
    ) -> RawBundle {
        let (forecast, hourly, observation, alerts) = tokio::join!(
            self.document::<ForecastProperties>("forecast", Some(&grid.forecast_url)),
            self.document::<ForecastProperties>("hourly forecast", grid.forecast_hourly_url.as_deref()),
            self.observation(&grid, preferred_station),
            self.alerts(&grid, &coordinate),
        );

        let mut bundle = RawBundle::empty(grid, coordinate);
        let ((station, obs), obs_warnings) = observation;
        bundle.forecast = forecast.0;
        bundle.hourly = hourly.0;
        bundle.station = station;
        bundle.observation = obs;
        bundle.alerts = alerts.0;
        bundle.warnings = [forecast.1, hourly.1, obs_warnings, alerts.1].concat();

        for warning in &bundle.warnings {
            info!("partial data: {}", warning);
        }
        bundle
    }
}

fn stale_warning(label: &str, stale: bool) -> Vec<String> {
    if stale {
        vec![format!("{label}: live fetch failed, showing cached data")]
    } else {
        Vec::new()
    }
}
