/*
 *  weather.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Open-Meteo current conditions for the configured location, polled
 *  every ten minutes with out-of-band refreshes on request.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::warn;
use reqwest::{Client, header};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{Config, UNIT_IMPERIAL};
use crate::constants::WEATHER_INTERVAL;
use crate::geoloc::{self, GeoError};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geolocation error: {0}")]
    Geo(#[from] GeoError),
}

/// Current conditions snapshot as consumed by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherInfo {
    pub location: String,
    pub temperature: f64,
    pub condition: String,
    pub wind_speed: String,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    weather_code: i64,
    wind_speed_10m: f64,
    is_day: i64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

pub struct WeatherClient {
    client: Client,
}

impl WeatherClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()?;

        Ok(WeatherClient { client })
    }

    /// Geocodes the location (falling back to New York on failure, as
    /// a missing city should not blank the weather line forever) and
    /// fetches current conditions with unit-mapped query parameters.
    pub async fn fetch(&self, location: &str, unit: &str) -> Result<WeatherInfo, WeatherError> {
        let (temp_unit, wind_unit) = unit_params(unit);

        let (lat, lon) = match geoloc::city_coordinates(&self.client, location).await {
            Ok(coords) => coords,
            Err(e) => {
                warn!("Failed to get city coordinates: {e}, falling back to New York, NY");
                (geoloc::DEFAULT_LAT, geoloc::DEFAULT_LON)
            }
        };

        let lat = format!("{lat:.4}");
        let lon = format!("{lon:.4}");
        let response: ForecastResponse = self
            .client
            .get(OPEN_METEO_URL)
            .query(&[
                ("temperature_unit", temp_unit),
                ("wind_speed_unit", wind_unit),
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("current", "temperature_2m,weather_code,wind_speed_10m,is_day"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let current = response.current;
        Ok(WeatherInfo {
            location: location.to_string(),
            temperature: current.temperature_2m,
            condition: condition_for(current.weather_code, current.is_day == 1).to_string(),
            wind_speed: format!("{:.1}", current.wind_speed_10m),
        })
    }
}

/// Open-Meteo query parameter pair for a config unit value.
fn unit_params(unit: &str) -> (&'static str, &'static str) {
    if unit == UNIT_IMPERIAL {
        ("fahrenheit", "mph")
    } else {
        ("celsius", "kmh")
    }
}

/// WMO weather code to a short display condition, with day/night
/// variants where they differ.
pub fn condition_for(code: i64, is_day: bool) -> &'static str {
    match code {
        0 => {
            if is_day {
                "Sunny"
            } else {
                "Clear"
            }
        }
        1 => {
            if is_day {
                "Mostly sunny"
            } else {
                "Mostly clear"
            }
        }
        2 => "Partly cloudy",
        3 => "Cloudy",
        45 | 48 => "Foggy",
        51 | 53 => "Drizzle",
        55 => "Heavy drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Light snow",
        73 | 75 | 77 => "Snow",
        80 => "Light showers",
        81 => "Showers",
        82 => "Heavy showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Hail storm",
        _ => "Unknown",
    }
}

/// Producer task: periodic fetches plus immediate refreshes whenever
/// the refresh channel fires (preference changes, stale data). The
/// send is awaited so the scheduler always sees the latest snapshot.
pub async fn run_weather_monitor(
    shared: Arc<RwLock<Config>>,
    tx: mpsc::Sender<WeatherInfo>,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    let client = match WeatherClient::new() {
        Ok(c) => c,
        Err(e) => {
            warn!("Weather monitor disabled, HTTP client failed to build: {e}");
            return;
        }
    };

    let mut ticker = tokio::time::interval(WEATHER_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(()) = refresh_rx.recv() => {}
        }

        let (location, unit) = {
            let cfg = shared.read().unwrap_or_else(|e| e.into_inner());
            (cfg.location.clone(), cfg.unit.clone())
        };

        match client.fetch(&location, &unit).await {
            Ok(info) => {
                if tx.send(info).await.is_err() {
                    return; // scheduler gone, shut down quietly
                }
            }
            Err(e) => warn!("Weather update failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_units_to_query_params() {
        assert_eq!(unit_params("imperial"), ("fahrenheit", "mph"));
        assert_eq!(unit_params("metric"), ("celsius", "kmh"));
        // anything else is treated as metric
        assert_eq!(unit_params(""), ("celsius", "kmh"));
    }

    #[test]
    fn conditions_follow_daylight() {
        assert_eq!(condition_for(0, true), "Sunny");
        assert_eq!(condition_for(0, false), "Clear");
        assert_eq!(condition_for(3, true), "Cloudy");
        assert_eq!(condition_for(95, false), "Thunderstorm");
        assert_eq!(condition_for(1234, true), "Unknown");
    }

    #[test]
    fn parses_open_meteo_payload() {
        let body = r#"{
            "latitude": 40.71,
            "longitude": -74.0,
            "current": {
                "time": "2026-08-29T12:00",
                "temperature_2m": 27.9,
                "weather_code": 2,
                "wind_speed_10m": 11.4,
                "is_day": 1
            }
        }"#;
        let parsed: ForecastResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.current.temperature_2m, 27.9);
        assert_eq!(parsed.current.weather_code, 2);
        assert_eq!(parsed.current.is_day, 1);
    }
}
