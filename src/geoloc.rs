/*
 *  geoloc.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Nominatim geocoding for the configured location string.
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
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Fallback coordinates: New York, NY.
pub const DEFAULT_LAT: f64 = 40.7128;
pub const DEFAULT_LON: f64 = -74.0060;

const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("location {0:?} not found")]
    NotFound(String),
    #[error("coordinates not parseable: {0}")]
    BadCoordinates(String),
}

// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

/// Resolves a free-form location ("Jersey City, NJ") to (lat, lon)
/// via the OpenStreetMap Nominatim API. The caller's client must carry
/// a User-Agent header; Nominatim rejects anonymous requests.
pub async fn city_coordinates(client: &Client, location: &str) -> Result<(f64, f64), GeoError> {
    let results: Vec<SearchResult> = client
        .get(NOMINATIM_SEARCH_URL)
        .query(&[("q", location), ("format", "json"), ("limit", "1")])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(first) = results.first() else {
        return Err(GeoError::NotFound(location.to_string()));
    };

    let lat = first
        .lat
        .parse::<f64>()
        .map_err(|_| GeoError::BadCoordinates(first.lat.clone()))?;
    let lon = first
        .lon
        .parse::<f64>()
        .map_err(|_| GeoError::BadCoordinates(first.lon.clone()))?;

    Ok((lat, lon))
}
