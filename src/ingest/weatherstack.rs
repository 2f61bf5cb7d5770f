//! Weatherstack current-conditions API client
//!
//! Retrieves the current observation for a single location from the
//! Weatherstack `current` endpoint and validates it into a `WeatherSnapshot`.
//!
//! API Documentation: https://weatherstack.com/documentation
//!
//! One blocking GET per call with a fixed timeout. Failures are returned as
//! `FetchError`; nothing is retried here.

use chrono::NaiveDateTime;
use serde::Deserialize;

use super::WeatherSource;
use crate::config::{ApiConfig, Units};
use crate::logging::{self, Stage};
use crate::model::{FetchError, WeatherSnapshot};

/// Format of `location.localtime`, e.g. "2026-01-27 07:53".
pub const LOCALTIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ============================================================================
// Weatherstack API Response Structures
// ============================================================================

/// Successful `current` response. Only the fields we persist are declared;
/// everything else in the body is ignored.
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub current: CurrentConditions,
    pub location: ResponseLocation,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub weather_descriptions: Vec<String>,
    pub wind_speed: f64,
}

#[derive(Debug, Deserialize)]
pub struct ResponseLocation {
    pub name: String,
    pub localtime: String,
    pub utc_offset: String,
}

/// Weatherstack reports bad keys, exhausted quotas and unknown locations
/// with HTTP 200 and this body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    success: bool,
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    #[serde(default)]
    info: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse and validate a response body into a fully populated snapshot.
///
/// Fails closed: any missing or mistyped required field, an empty
/// description list, or an unparseable local time is `MalformedResponse`.
pub fn parse_current_response(body: &str) -> Result<WeatherSnapshot, FetchError> {
    if let Ok(api_error) = serde_json::from_str::<ErrorResponse>(body) {
        if !api_error.success {
            let info = api_error
                .error
                .info
                .or(api_error.error.kind)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(FetchError::Api {
                code: api_error.error.code,
                info,
            });
        }
    }

    let response: CurrentResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    snapshot_from_response(response)
}

fn snapshot_from_response(response: CurrentResponse) -> Result<WeatherSnapshot, FetchError> {
    let CurrentResponse { current, location } = response;

    let weather_description = current
        .weather_descriptions
        .into_iter()
        .next()
        .ok_or_else(|| {
            FetchError::MalformedResponse("current.weather_descriptions is empty".to_string())
        })?;

    let observed_local_time = NaiveDateTime::parse_from_str(&location.localtime, LOCALTIME_FORMAT)
        .map_err(|e| {
            FetchError::MalformedResponse(format!(
                "location.localtime '{}' is not a valid local time: {}",
                location.localtime, e
            ))
        })?;

    if !current.temperature.is_finite() || !current.wind_speed.is_finite() {
        return Err(FetchError::MalformedResponse(
            "non-finite temperature or wind speed".to_string(),
        ));
    }

    Ok(WeatherSnapshot {
        location_name: location.name,
        observed_local_time,
        utc_offset: location.utc_offset,
        temperature: current.temperature,
        weather_description,
        wind_speed: current.wind_speed,
    })
}

// ============================================================================
// API Client
// ============================================================================

pub struct WeatherstackSource {
    http: reqwest::blocking::Client,
    url: String,
    access_key: String,
    units: Units,
}

impl WeatherstackSource {
    pub fn new(api: &ApiConfig) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(api.timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("could not build HTTP client: {}", e)))?;

        Ok(WeatherstackSource {
            http,
            url: api.url.clone(),
            access_key: api.access_key.clone(),
            units: api.units,
        })
    }

    fn request_body(&self, location: &str) -> Result<String, FetchError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("access_key", self.access_key.as_str()),
            ("query", location),
        ];
        if self.units != Units::Metric {
            query.push(("units", self.units.as_param()));
        }

        let response = self
            .http
            .get(&self.url)
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response.text().map_err(classify_transport_error)
    }
}

impl WeatherSource for WeatherstackSource {
    fn fetch(&self, location: &str) -> Result<WeatherSnapshot, FetchError> {
        logging::info(Stage::Fetch, Some(location), "Fetching weather data from Weatherstack ...");

        let result = self
            .request_body(location)
            .and_then(|body| parse_current_response(&body));

        match &result {
            Ok(_) => logging::info(Stage::Fetch, Some(location), "API response retrieved successfully"),
            Err(e) => logging::warn(Stage::Fetch, Some(location), &format!("Fetch failed: {}", e)),
        }
        result
    }
}

/// The access key travels in the query string, so reqwest's error text
/// (which includes the URL) is stripped of it before it can reach a log.
fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }
    FetchError::Network(err.without_url().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::mock::MOCK_RESPONSE;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn api_config(url: String, timeout: Duration) -> ApiConfig {
        ApiConfig {
            url,
            access_key: "test-key-0001".to_string(),
            units: Units::Metric,
            timeout,
        }
    }

    /// Serve exactly one HTTP response on a random local port. The request
    /// head is sent back through the channel for inspection.
    fn serve_once(status_line: &'static str, body: String) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/current", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        });

        (url, rx)
    }

    // --- Parsing ------------------------------------------------------------

    #[test]
    fn test_parse_full_response_populates_all_fields() {
        let snapshot = parse_current_response(MOCK_RESPONSE).expect("mock body is well formed");
        assert_eq!(snapshot.location_name, "New York");
        assert_eq!(snapshot.temperature, -9.0);
        assert_eq!(snapshot.weather_description, "Clear ");
        assert_eq!(snapshot.wind_speed, 17.0);
        assert_eq!(snapshot.utc_offset, "-5.0");
        assert_eq!(
            snapshot.observed_local_time,
            NaiveDateTime::parse_from_str("2026-01-27 07:53", LOCALTIME_FORMAT).unwrap()
        );
    }

    #[test]
    fn test_only_first_description_is_kept() {
        let body = r#"{
            "current": {"temperature": 3.5, "weather_descriptions": ["Light Rain", "Mist"], "wind_speed": 9},
            "location": {"name": "Seattle", "localtime": "2026-03-01 18:05", "utc_offset": "-8.0"}
        }"#;
        let snapshot = parse_current_response(body).unwrap();
        assert_eq!(snapshot.weather_description, "Light Rain");
        assert_eq!(snapshot.temperature, 3.5);
    }

    #[test]
    fn test_each_missing_required_field_is_malformed() {
        let bodies = [
            r#"{"current": {"weather_descriptions": ["Clear"], "wind_speed": 1}, "location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "wind_speed": 1}, "location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "weather_descriptions": ["Clear"]}, "location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "weather_descriptions": ["Clear"], "wind_speed": 1}, "location": {"localtime": "2026-01-01 00:00", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "weather_descriptions": ["Clear"], "wind_speed": 1}, "location": {"name": "X", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "weather_descriptions": ["Clear"], "wind_speed": 1}, "location": {"name": "X", "localtime": "2026-01-01 00:00"}}"#,
            r#"{"location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}}"#,
            r#"{"current": {"temperature": 1, "weather_descriptions": ["Clear"], "wind_speed": 1}}"#,
        ];
        for body in bodies {
            let result = parse_current_response(body);
            assert!(
                matches!(result, Err(FetchError::MalformedResponse(_))),
                "expected MalformedResponse for {}, got {:?}",
                body,
                result
            );
        }
    }

    #[test]
    fn test_empty_description_list_is_malformed() {
        let body = r#"{
            "current": {"temperature": 1, "weather_descriptions": [], "wind_speed": 1},
            "location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}
        }"#;
        assert!(matches!(
            parse_current_response(body),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_mistyped_fields_are_malformed() {
        let string_temperature = r#"{
            "current": {"temperature": "cold", "weather_descriptions": ["Clear"], "wind_speed": 1},
            "location": {"name": "X", "localtime": "2026-01-01 00:00", "utc_offset": "0.0"}
        }"#;
        let bad_localtime = r#"{
            "current": {"temperature": 1, "weather_descriptions": ["Clear"], "wind_speed": 1},
            "location": {"name": "X", "localtime": "yesterday", "utc_offset": "0.0"}
        }"#;
        assert!(matches!(
            parse_current_response(string_temperature),
            Err(FetchError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_current_response(bad_localtime),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_json_body_is_malformed() {
        assert!(matches!(
            parse_current_response("<html>gateway</html>"),
            Err(FetchError::MalformedResponse(_))
        ));
        assert!(matches!(parse_current_response(""), Err(FetchError::MalformedResponse(_))));
    }

    #[test]
    fn test_api_error_body_is_reported_with_code() {
        let body = r#"{"success": false, "error": {"code": 101, "type": "invalid_access_key", "info": "You have not supplied a valid API Access Key."}}"#;
        match parse_current_response(body) {
            Err(FetchError::Api { code, info }) => {
                assert_eq!(code, 101);
                assert!(info.contains("valid API Access Key"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    // --- HTTP ---------------------------------------------------------------

    #[test]
    fn test_fetch_sends_credential_and_location_as_query_parameters() {
        let (url, requests) = serve_once("HTTP/1.1 200 OK", MOCK_RESPONSE.to_string());
        let source = WeatherstackSource::new(&api_config(url, Duration::from_secs(5))).unwrap();

        let snapshot = source.fetch("New York").expect("local server returns the mock body");
        assert_eq!(snapshot.location_name, "New York");

        let request = requests.recv_timeout(Duration::from_secs(5)).unwrap();
        let request_line = request.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /current?"), "got {}", request_line);
        assert!(request_line.contains("access_key=test-key-0001"));
        assert!(request_line.contains("query=New+York"));
        assert!(!request_line.contains("units="), "metric is the API default and is not sent");
    }

    #[test]
    fn test_non_metric_units_are_requested_explicitly() {
        let (url, requests) = serve_once("HTTP/1.1 200 OK", MOCK_RESPONSE.to_string());
        let mut api = api_config(url, Duration::from_secs(5));
        api.units = Units::Fahrenheit;
        let source = WeatherstackSource::new(&api).unwrap();

        source.fetch("New York").unwrap();
        let request = requests.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(request.lines().next().unwrap_or_default().contains("units=f"));
    }

    #[test]
    fn test_non_2xx_status_is_http_error() {
        let (url, _requests) = serve_once("HTTP/1.1 503 Service Unavailable", "{}".to_string());
        let source = WeatherstackSource::new(&api_config(url, Duration::from_secs(5))).unwrap();
        assert_eq!(source.fetch("New York"), Err(FetchError::HttpStatus(503)));
    }

    #[test]
    fn test_unresponsive_server_times_out() {
        // Bound but never accepted: the kernel completes the handshake and
        // the request then waits forever for a response.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/current", listener.local_addr().unwrap());
        let source = WeatherstackSource::new(&api_config(url, Duration::from_millis(300))).unwrap();

        assert_eq!(source.fetch("New York"), Err(FetchError::Timeout));
        drop(listener);
    }

    #[test]
    fn test_refused_connection_is_network_error_without_credential() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/current", listener.local_addr().unwrap());
        drop(listener);

        let source = WeatherstackSource::new(&api_config(url, Duration::from_secs(2))).unwrap();
        match source.fetch("New York") {
            Err(FetchError::Network(message)) => {
                assert!(!message.contains("test-key-0001"), "credential leaked: {}", message);
            }
            other => panic!("expected Network error, got {:?}", other),
        }
    }
}
