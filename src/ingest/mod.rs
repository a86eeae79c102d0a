/// Upstream API clients.
///
/// - `weatherapi`: WeatherAPI.com current conditions, one request per city.

pub mod weatherapi;
