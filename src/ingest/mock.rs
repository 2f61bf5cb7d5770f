//! Deterministic offline weather source.
//!
//! Returns a recorded Weatherstack response for New York, run through the
//! same parse-and-validate step as live data, so downstream logic can be
//! tested without the API.

use super::WeatherSource;
use super::weatherstack::parse_current_response;
use crate::logging::{self, Stage};
use crate::model::{FetchError, WeatherSnapshot};

/// A captured `current` response, including fields we do not persist.
pub const MOCK_RESPONSE: &str = r#"{
    "request": {"type": "City", "query": "New York, United States of America", "language": "en", "unit": "m"},
    "location": {
        "name": "New York",
        "country": "United States of America",
        "region": "New York",
        "lat": "40.714",
        "lon": "-74.006",
        "timezone_id": "America/New_York",
        "localtime": "2026-01-27 07:53",
        "localtime_epoch": 1769500380,
        "utc_offset": "-5.0"
    },
    "current": {
        "observation_time": "12:53 PM",
        "temperature": -9,
        "weather_code": 113,
        "weather_icons": ["https://cdn.worldweatheronline.com/images/wsymbols01_png_64/wsymbol_0008_clear_sky_night.png"],
        "weather_descriptions": ["Clear "],
        "astro": {"sunrise": "07:11 AM", "sunset": "05:08 PM", "moonrise": "11:32 AM", "moonset": "02:06 AM", "moon_phase": "Waxing Gibbous", "moon_illumination": 59},
        "air_quality": {"co": "301.85", "no2": "18.35", "o3": "62", "so2": "8.35", "pm2_5": "15.35", "pm10": "15.45", "us-epa-index": "1", "gb-defra-index": "1"},
        "wind_speed": 17,
        "wind_degree": 261,
        "wind_dir": "W",
        "pressure": 1020,
        "precip": 0,
        "humidity": 48,
        "cloudcover": 0,
        "feelslike": -16,
        "uv_index": 0,
        "visibility": 16,
        "is_day": "yes"
    }
}"#;

/// Always answers with [`MOCK_RESPONSE`], whatever location is asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockWeatherSource;

impl WeatherSource for MockWeatherSource {
    fn fetch(&self, location: &str) -> Result<WeatherSnapshot, FetchError> {
        logging::info(Stage::Fetch, Some(location), "Using mock weather data (no network access)");
        parse_current_response(MOCK_RESPONSE)
    }
}
