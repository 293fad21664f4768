//! End-to-end request flow: coordinates, grid point, fan-out, conversion.

use tracing::{info, warn};

use crate::aggregate::{alerts_area_url, Aggregator};
use crate::alerts::Alert;
use crate::config::{Config, Units};
use crate::constants::NWS_ACCEPT;
use crate::convert::{convert, ConvertOptions};
use crate::error::PipelineError;
use crate::geocode::{short_label, Geocoder};
use crate::http::HttpClient;
use crate::models::{parse_collection, AlertProperties};
use crate::points::{resolve_point, Coordinate};
use crate::retry::Fetcher;
use crate::view::WeatherViewModel;

/// Where a request's location comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateSource {
    Coordinates {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },
    /// Free text for the geocoder, e.g. "Houston, TX".
    Location(String),
}

impl CoordinateSource {
    /// Configured coordinates win over a configured location string.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        match (config.latitude, config.longitude, config.location.as_deref()) {
            (Some(latitude), Some(longitude), _) => Ok(Self::Coordinates {
                latitude,
                longitude,
                label: config.location_name.clone(),
            }),
            (_, _, Some(location)) if !location.trim().is_empty() => {
                Ok(Self::Location(location.to_string()))
            }
            _ => Err(PipelineError::Config(
                "no coordinates or location configured".to_string(),
            )),
        }
    }
}

/// One dashboard request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub source: CoordinateSource,
    pub units: Units,
    pub preferred_station: Option<String>,
}

/// The data pipeline, built once and shared across requests.
pub struct Dashboard<C> {
    config: Config,
    fetcher: Fetcher<C>,
}

impl<C: HttpClient> Dashboard<C> {
    pub fn new(client: C, config: Config) -> Self {
        let config = config.normalized();
        let fetcher = Fetcher::from_config(client, &config);
        Self { config, fetcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }

    /// Validated coordinate plus the label to show for it, if any.
    async fn locate(
        &self,
        source: &CoordinateSource,
    ) -> Result<(Coordinate, Option<String>), PipelineError> {
        match source {
            CoordinateSource::Coordinates {
                latitude,
                longitude,
                label,
            } => Ok((Coordinate::new(*latitude, *longitude)?, label.clone())),
            CoordinateSource::Location(text) => {
                let geocoder = Geocoder::new(
                    &self.fetcher,
                    &self.config.geocoder_base,
                    self.config.geocoder_user_agent(),
                );
                let place = geocoder.resolve(text).await?;
                Ok((place.coordinate()?, Some(short_label(text))))
            }
        }
    }

    /// Runs one request. Only location and grid-point failures are errors;
    /// everything after that degrades into the view model's warnings.
    pub async fn load(&self, request: &Request) -> Result<WeatherViewModel, PipelineError> {
        let (coordinate, label) = self.locate(&request.source).await?;

        let grid = resolve_point(&self.fetcher, &self.config.api_base, coordinate)
            .await
            .map_err(|failure| {
                warn!("grid point lookup failed at {}: {}", failure.url, failure.message);
                PipelineError::Points(failure)
            })?;
        info!(
            "grid point {} {},{} for {},{}",
            grid.grid_id.as_deref().unwrap_or("?"),
            grid.grid_x.unwrap_or_default(),
            grid.grid_y.unwrap_or_default(),
            coordinate.latitude,
            coordinate.longitude
        );

        let bundle = Aggregator::new(&self.fetcher, &self.config)
            .aggregate(grid, coordinate, request.preferred_station.as_deref())
            .await;

        let options = ConvertOptions {
            units: request.units,
            ..ConvertOptions::from_config(&self.config, label)
        };
        Ok(convert(&bundle, &options))
    }

    /// Active alerts for a state or territory code, most severe first.
    pub async fn state_alerts(&self, state: &str) -> Result<Vec<Alert>, PipelineError> {
        let state = state.trim().to_ascii_uppercase();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(PipelineError::Config(format!(
                "{state:?} is not a two-letter state code"
            )));
        }

        let url = alerts_area_url(&self.config.api_base, &state);
        let payload = self.fetcher.get_json(&url, NWS_ACCEPT).await?;
        let raw: Vec<AlertProperties> = parse_collection(&url, "alerts", &payload.value)?;

        let mut alerts: Vec<Alert> = raw.iter().map(Alert::from).collect();
        alerts.sort_by_key(|a| a.severity.rank());
        Ok(alerts)
    }
}
