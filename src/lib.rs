//! Resilient data pipeline behind a National Weather Service dashboard.
//!
//! A request resolves a location to an NWS grid point, fetches the forecast,
//! hourly forecast, latest observation and active alerts with caching and
//! retries, and normalises the results into a [`view::WeatherViewModel`].

pub mod aggregate;
pub mod alerts;
pub mod astro;
pub mod cache;
pub mod config;
pub mod constants;
pub mod convert;
pub mod crc32;
pub mod error;
pub mod formatters;
pub mod geocode;
pub mod http;
pub mod icons;
pub mod models;
pub mod pipeline;
pub mod points;
pub mod retry;
pub mod service;
pub mod stations;
pub mod view;
