//! Weather data sources.
//!
//! - `weatherstack`: live HTTP client for the Weatherstack current API.
//! - `mock`: a fixed offline snapshot for exercising the rest of the
//!   pipeline without network access.

pub mod mock;
pub mod weatherstack;

use crate::model::{FetchError, WeatherSnapshot};

pub use mock::MockWeatherSource;
pub use weatherstack::WeatherstackSource;

/// Something that can produce one weather snapshot for a location.
///
/// Implementations never retry and never return a partially populated
/// snapshot; any problem is a `FetchError`.
pub trait WeatherSource {
    fn fetch(&self, location: &str) -> Result<WeatherSnapshot, FetchError>;
}

impl<S: WeatherSource + ?Sized> WeatherSource for &S {
    fn fetch(&self, location: &str) -> Result<WeatherSnapshot, FetchError> {
        (**self).fetch(location)
    }
}

impl<S: WeatherSource + ?Sized> WeatherSource for Box<S> {
    fn fetch(&self, location: &str) -> Result<WeatherSnapshot, FetchError> {
        (**self).fetch(location)
    }
}
