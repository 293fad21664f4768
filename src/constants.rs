/// Default User-Agent for HTTP requests. NWS rejects anonymous clients.
pub const USER_AGENT: &str = "nws-dashboard/0.1.0";

/// National Weather Service API base URL
pub const NWS_API_BASE: &str = "https://api.weather.gov";

/// Nominatim (OpenStreetMap) geocoder base URL
pub const GEOCODER_BASE: &str = "https://nominatim.openstreetmap.org";

/// Accept header for NWS requests. NWS negotiates between JSON-LD, GeoJSON
/// and plain JSON, and some endpoints only honour the first listed type.
pub const NWS_ACCEPT: &str = "application/ld+json, application/geo+json, application/json";

/// Accept header for the geocoder
pub const JSON_ACCEPT: &str = "application/json";

/// Forecast periods kept from the 12-hour forecast
pub const MAX_FORECAST_PERIODS: usize = 8;

/// Periods kept from the hourly forecast
pub const MAX_HOURLY_PERIODS: usize = 24;

/// Upper bound for `alerts_max`
pub const MAX_ALERT_SUMMARIES: usize = 3;

/// Maximum redirects followed per request
pub const MAX_REDIRECTS: usize = 3;
