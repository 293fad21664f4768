//! Sunrise, sunset and moon phase, computed locally.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use serde::Serialize;

const SYNODIC_MONTH_DAYS: f64 = 29.530588861;
const JULIAN_UNIX_EPOCH: f64 = 2440587.5;
const J2000: f64 = 2451545.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Moon phase boundaries in days of lunar age.
const PHASES: &[(f64, &str)] = &[
    (1.84566, "New Moon"),
    (5.53699, "Waxing Crescent"),
    (9.22831, "First Quarter"),
    (12.91963, "Waxing Gibbous"),
    (16.61096, "Full Moon"),
    (20.30228, "Waning Gibbous"),
    (23.99361, "Last Quarter"),
    (27.68493, "Waning Crescent"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Astronomy {
    /// Local `HH:MM`, absent during polar day or night.
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub moon_phase: String,
}

fn rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

fn julian_day(year: i32, month: u32, day: u32) -> f64 {
    let (mut y, mut m) = (year as f64, month as f64);
    if m <= 2.0 {
        y -= 1.0;
        m += 12.0;
    }
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + b - 1524.5
}

fn from_julian(j: f64) -> Option<DateTime<Utc>> {
    let millis = (j - JULIAN_UNIX_EPOCH) * MS_PER_DAY;
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// UTC offset in minutes of an ISO-8601 timestamp, e.g.
/// `2025-08-15T14:00:00-05:00` gives `-300`.
pub fn parse_offset_minutes(iso: &str) -> Option<i32> {
    DateTime::parse_from_rfc3339(iso.trim())
        .ok()
        .map(|t| t.offset().local_minus_utc() / 60)
}

/// Sunrise and sunset in UTC for the date of `date`.
fn sun_times(lat: f64, lon: f64, date: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let j = julian_day(date.year(), date.month(), date.day());
    let n = (j - J2000) - lon / 360.0;
    let m = (357.5291 + 0.98560028 * n) % 360.0;
    let c = 1.9148 * rad(m).sin() + 0.02 * rad(2.0 * m).sin() + 0.0003 * rad(3.0 * m).sin();
    let l = (m + 102.9372 + c + 180.0) % 360.0;
    let transit = 2451545.5 + n + 0.0053 * rad(m).sin() - 0.0069 * rad(2.0 * l).sin();
    let dec = (rad(l).sin() * rad(23.44).sin()).asin();
    let lat_r = rad(lat);
    let cos_h0 = (rad(-0.83).sin() - lat_r.sin() * dec.sin()) / (lat_r.cos() * dec.cos());
    if !(-1.0..=1.0).contains(&cos_h0) {
        return None;
    }
    let h0 = cos_h0.acos();
    let rise = from_julian(transit - h0 / (2.0 * PI))?;
    let set = from_julian(transit + h0 / (2.0 * PI))?;
    Some((rise, set))
}

/// Moon phase name for an instant.
pub fn moon_phase(now: DateTime<Utc>) -> &'static str {
    let reference = Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0).single();
    let Some(reference) = reference else {
        return "New Moon";
    };
    let days = (now - reference).num_milliseconds() as f64 / MS_PER_DAY;
    let age = days.rem_euclid(SYNODIC_MONTH_DAYS);
    PHASES
        .iter()
        .find(|(limit, _)| age < *limit)
        .map(|(_, name)| *name)
        .unwrap_or("New Moon")
}

/// Sun and moon data for a location, with times shown in the location's
/// UTC offset (`offset_minutes`, 0 when unknown).
pub fn astronomy(lat: f64, lon: f64, now: DateTime<Utc>, offset_minutes: i32) -> Astronomy {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .or_else(|| FixedOffset::east_opt(0));
    let format = |t: DateTime<Utc>| match offset {
        Some(offset) => t.with_timezone(&offset).format("%H:%M").to_string(),
        None => t.format("%H:%M").to_string(),
    };

    let times = sun_times(lat, lon, now);
    Astronomy {
        sunrise: times.map(|(rise, _)| format(rise)),
        sunset: times.map(|(_, set)| format(set)),
        moon_phase: moon_phase(now).to_string(),
    }
}
