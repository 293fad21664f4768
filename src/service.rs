use anyhow::Result;
use rmcp::{
    handler::server::{wrapper::Parameters, ServerHandler, tool::ToolRouter},
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    ErrorData as McpError,
};
use std::sync::Arc;

use crate::config::Config;
use crate::error::PipelineError;
use crate::formatters::{format_alerts, format_dashboard, format_failure};
use crate::http::ReqwestClient;
use crate::models::{GetAlertsRequest, GetWeatherRequest};
use crate::pipeline::{CoordinateSource, Dashboard, Request};
use crate::view::WeatherViewModel;

/// MCP service exposing the dashboard pipeline as tools
#[derive(Clone)]
pub struct Weather {
    dashboard: Arc<Dashboard<ReqwestClient>>,
    tool_router: ToolRouter<Self>,
}

/// Tool arguments first, configured defaults second.
fn request_for(config: &Config, args: GetWeatherRequest) -> Result<Request, PipelineError> {
    let source = match (args.latitude, args.longitude, args.location) {
        (Some(latitude), Some(longitude), _) => CoordinateSource::Coordinates {
            latitude,
            longitude,
            label: None,
        },
        (_, _, Some(location)) if !location.trim().is_empty() => CoordinateSource::Location(location),
        _ => CoordinateSource::from_config(config)?,
    };

    Ok(Request {
        source,
        units: args.units.unwrap_or(config.units),
        preferred_station: args
            .station
            .filter(|s| !s.trim().is_empty())
            .or_else(|| config.preferred_station.clone()),
    })
}

impl Weather {
    pub fn new(config: Config) -> Result<Self> {
        let client = ReqwestClient::new(&config)?;

        Ok(Self {
            dashboard: Arc::new(Dashboard::new(client, config)),
            tool_router: Self::tool_router(),
        })
    }

    /// Loads the view model, or the tool result to return instead.
    async fn load(&self, args: GetWeatherRequest) -> Result<WeatherViewModel, Result<CallToolResult, McpError>> {
        let request = request_for(self.dashboard.config(), args)
            .map_err(|e| Err(McpError::invalid_params(e.to_string(), None)))?;

        match self.dashboard.load(&request).await {
            Ok(vm) => Ok(vm),
            Err(PipelineError::Config(message)) => Err(Err(McpError::invalid_params(message, None))),
            Err(err) => {
                tracing::warn!("dashboard request failed at {}: {}", err.stage(), err);
                Err(Ok(CallToolResult::error(vec![Content::text(format_failure(&err))])))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for Weather {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nws-dashboard".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some(
                "A weather dashboard powered by the National Weather Service API. \
                Provides current conditions, forecasts, astronomy and active alerts for US locations."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl Weather {
    #[tool(description = "Get a weather dashboard for a US location: current conditions, 12-hour and hourly forecasts, sunrise/sunset, moon phase and active alerts. Provide latitude and longitude (e.g., latitude: 39.7456, longitude: -97.0892) or a location such as 'Houston, TX'. Optional: units ('imperial' or 'metric') and a preferred observation station (e.g., 'KHOU').")]
    async fn get_weather(
        &self,
        Parameters(request): Parameters<GetWeatherRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Getting weather dashboard");

        match self.load(request).await {
            Ok(vm) => Ok(CallToolResult::success(vec![Content::text(format_dashboard(&vm))])),
            Err(result) => result,
        }
    }

    #[tool(description = "Same inputs as get_weather, but returns the normalized dashboard data as JSON (observation, forecast periods, hourly periods, alerts, icon keys, astronomy and warnings).")]
    async fn get_weather_data(
        &self,
        Parameters(request): Parameters<GetWeatherRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Getting weather dashboard data");

        let vm = match self.load(request).await {
            Ok(vm) => vm,
            Err(result) => return result,
        };
        let json = serde_json::to_string_pretty(&vm)
            .map_err(|e| McpError::internal_error(format!("Failed to encode weather data: {}", e), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get active weather alerts for a US state, most severe first. Provide a two-letter state code (e.g., 'KS' for Kansas, 'TX' for Texas).")]
    async fn get_alerts(
        &self,
        Parameters(request): Parameters<GetAlertsRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Getting alerts for state: {}", request.state);

        let alerts = self.dashboard.state_alerts(&request.state).await.map_err(|e| match e {
            PipelineError::Config(message) => McpError::invalid_params(message, None),
            other => McpError::internal_error(format!("Failed to fetch alerts: {}", other), None),
        })?;

        Ok(CallToolResult::success(vec![Content::text(format_alerts(&alerts))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Units;

    #[test]
    fn test_arguments_override_config() {
        let config = Config {
            latitude: Some(29.76),
            longitude: Some(-95.37),
            preferred_station: Some("KHOU".into()),
            ..Config::default()
        };

        let request = request_for(
            &config,
            GetWeatherRequest {
                location: Some("Topeka, KS".into()),
                units: Some(Units::Metric),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(request.source, CoordinateSource::Location("Topeka, KS".into()));
        assert_eq!(request.units, Units::Metric);
        assert_eq!(request.preferred_station.as_deref(), Some("KHOU"));
    }

    #[test]
    fn test_falls_back_to_configured_coordinates() {
        let config = Config {
            latitude: Some(29.76),
            longitude: Some(-95.37),
            ..Config::default()
        };
        let request = request_for(&config, GetWeatherRequest::default()).unwrap();
        assert!(matches!(request.source, CoordinateSource::Coordinates { .. }));
        assert_eq!(request.units, Units::Imperial);
    }

    #[test]
    fn test_nothing_to_locate() {
        let err = request_for(&Config::default(), GetWeatherRequest::default()).unwrap_err();
        assert_eq!(err.stage(), "validation");
    }
}
