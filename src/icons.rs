//! Icon-key classification from forecast text and NWS icon URLs.
//!
//! Keys are the base names of the dashboard's icon files ("rain",
//! "partlycloudy", ...). Night variants carry an `nt_` prefix.

const NIGHT_PREFIX: &str = "nt_";

/// Text patterns in priority order; the first match wins. Compound phrases
/// sit above the bare "cloudy" pattern they contain.
const TEXT_PATTERNS: &[(&[&str], &str)] = &[
    (&["thunder", "t-storm", "tstorm", "tornado"], "tstorms"),
    (&["snow", "flurr"], "snow"),
    (&["sleet", "freezing", "ice"], "sleet"),
    (&["rain", "shower", "drizzle"], "rain"),
    (&["fog", "mist"], "fog"),
    (&["haze", "hazy", "smoke", "dust"], "hazy"),
    (&["mostly cloudy"], "mostlycloudy"),
    (&["partly cloudy", "partly sunny"], "partlycloudy"),
    (&["mostly sunny", "mostly clear"], "mostlysunny"),
    (&["overcast", "cloudy"], "cloudy"),
    (&["clear", "sunny", "fair"], "clear"),
];

const DEFAULT_KEY: &str = "cloudy";

/// NWS icon tokens (`/icons/land/day/<token>`) mapped to icon keys.
const ICON_TOKENS: &[(&str, &str)] = &[
    ("skc", "clear"),
    ("few", "mostlysunny"),
    ("sct", "partlycloudy"),
    ("bkn", "mostlycloudy"),
    ("ovc", "cloudy"),
    ("wind_skc", "clear"),
    ("wind_few", "mostlysunny"),
    ("wind_sct", "partlycloudy"),
    ("wind_bkn", "mostlycloudy"),
    ("wind_ovc", "cloudy"),
    ("rain", "rain"),
    ("ra", "rain"),
    ("rain_showers", "rain"),
    ("rain_showers_hi", "rain"),
    ("drizzle", "rain"),
    ("tsra", "tstorms"),
    ("tsra_sct", "tstorms"),
    ("tsra_hi", "tstorms"),
    ("tornado", "tstorms"),
    ("hurricane", "tstorms"),
    ("tropical_storm", "tstorms"),
    ("snow", "snow"),
    ("snow_showers", "snow"),
    ("blizzard", "snow"),
    ("sleet", "sleet"),
    ("fzra", "sleet"),
    ("rain_fzra", "sleet"),
    ("snow_fzra", "sleet"),
    ("rain_sleet", "sleet"),
    ("snow_sleet", "sleet"),
    ("rain_snow", "sleet"),
    ("fog", "fog"),
    ("haze", "hazy"),
    ("smoke", "hazy"),
    ("dust", "hazy"),
    ("hot", "clear"),
    ("cold", "cloudy"),
];

fn with_time_of_day(base: &str, is_daytime: bool) -> String {
    if is_daytime {
        base.to_string()
    } else {
        format!("{NIGHT_PREFIX}{base}")
    }
}

/// Icon key for a short-forecast or observation text. Total: unmatched or
/// empty text yields "cloudy".
pub fn classify(text: &str, is_daytime: bool) -> String {
    let text = text.to_lowercase();
    let base = TEXT_PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| text.contains(n)))
        .map(|(_, key)| *key)
        .unwrap_or(DEFAULT_KEY);
    with_time_of_day(base, is_daytime)
}

/// Time of day and primary condition token of an NWS icon URL, e.g.
/// `https://api.weather.gov/icons/land/night/rain_showers,40/tsra?size=medium`
/// gives `(false, "rain_showers")`.
fn parse_icon_url(url: &str) -> Option<(bool, String)> {
    let path = url.split(['?', '#']).next()?;
    let segments: Vec<&str> = path.split('/').collect();
    let tod = segments
        .iter()
        .position(|s| *s == "day" || *s == "night")?;
    let is_daytime = segments[tod] == "day";
    let token = segments.get(tod + 1)?.split(',').next()?.trim().to_lowercase();
    if token.is_empty() {
        return None;
    }
    Some((is_daytime, token))
}

/// Icon key from an NWS icon URL, or `None` when the URL has no
/// recognisable day/night token.
pub fn classify_icon_url(url: &str) -> Option<String> {
    let (is_daytime, token) = parse_icon_url(url)?;
    let base = ICON_TOKENS
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, key)| *key)?;
    Some(with_time_of_day(base, is_daytime))
}
