//! Weather forecast tool, backed by the Open-Meteo API

use serde::Deserialize;

use crate::{Error, Result};

/// Open-Meteo forecast endpoint
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Conversion factor from m/s to mph
const MS_TO_MPH: f64 = 2.237;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentWeather>,
    daily: Option<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    precipitation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<f64>,
    #[serde(default)]
    temperature_2m_min: Vec<f64>,
    #[serde(default)]
    precipitation_probability_max: Vec<f64>,
    #[serde(default)]
    wind_speed_10m_max: Vec<f64>,
}

/// Fetch a concise forecast for the given coordinates
///
/// The summary is deliberately terse; it rides a mesh frame, not a web
/// page.
///
/// # Errors
///
/// Returns error if the request fails or the response is unusable
pub async fn fetch_forecast(
    client: &reqwest::Client,
    latitude: f64,
    longitude: f64,
    forecast_days: u8,
) -> Result<String> {
    let days = forecast_days.clamp(1, 7);

    let response = client
        .get(FORECAST_URL)
        .query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            (
                "current",
                "temperature_2m,wind_speed_10m,precipitation".to_string(),
            ),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_probability_max,wind_speed_10m_max"
                    .to_string(),
            ),
            ("forecast_days", days.to_string()),
            ("timezone", "auto".to_string()),
        ])
        .send()
        .await
        .map_err(|e| Error::Tool(format!("weather request failed: {e}")))?;

    let response = response
        .error_for_status()
        .map_err(|e| Error::Tool(format!("weather service error: {e}")))?;

    let forecast: ForecastResponse = response
        .json()
        .await
        .map_err(|e| Error::Tool(format!("weather response unparseable: {e}")))?;

    let current = forecast
        .current
        .ok_or_else(|| Error::Tool("weather data unavailable".to_string()))?;
    let daily = forecast
        .daily
        .ok_or_else(|| Error::Tool("forecast data unavailable".to_string()))?;

    Ok(render_summary(latitude, longitude, &current, &daily, days))
}

fn render_summary(
    latitude: f64,
    longitude: f64,
    current: &CurrentWeather,
    daily: &DailyForecast,
    days: u8,
) -> String {
    let temp = current
        .temperature_2m
        .map_or_else(|| "?".to_string(), |t| format!("{t:.1}"));
    let wind_mph = current.wind_speed_10m.unwrap_or(0.0) * MS_TO_MPH;
    let rain = current.precipitation.unwrap_or(0.0);

    let mut summary = format!(
        "Weather at ({latitude:.2}, {longitude:.2}): {temp}C wind {wind_mph:.0}mph rain {rain}mm"
    );

    for i in 0..usize::from(days).min(daily.time.len()) {
        let date = &daily.time[i];
        let max = daily
            .temperature_2m_max
            .get(i)
            .map_or_else(|| "?".to_string(), |t| format!("{t:.0}"));
        let min = daily
            .temperature_2m_min
            .get(i)
            .map_or_else(|| "?".to_string(), |t| format!("{t:.0}"));
        let rain_prob = daily
            .precipitation_probability_max
            .get(i)
            .copied()
            .unwrap_or(0.0);
        let wind = daily.wind_speed_10m_max.get(i).copied().unwrap_or(0.0) * MS_TO_MPH;

        summary.push_str(&format!(
            "\n{date}: {min}-{max}C {rain_prob:.0}% rain {wind:.0}mph"
        ));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_current_and_daily() {
        let current = CurrentWeather {
            temperature_2m: Some(18.25),
            wind_speed_10m: Some(4.0),
            precipitation: Some(0.0),
        };
        let daily = DailyForecast {
            time: vec!["2026-08-08".to_string(), "2026-08-09".to_string()],
            temperature_2m_max: vec![22.0, 24.0],
            temperature_2m_min: vec![12.0, 13.0],
            precipitation_probability_max: vec![10.0, 40.0],
            wind_speed_10m_max: vec![6.0, 8.0],
        };

        let summary = render_summary(51.5, -0.12, &current, &daily, 2);
        assert!(summary.starts_with("Weather at (51.50, -0.12): 18.2C wind 9mph rain 0mm"));
        assert!(summary.contains("2026-08-08: 12-22C 10% rain 13mph"));
        assert!(summary.contains("2026-08-09: 13-24C 40% rain 18mph"));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let current = CurrentWeather {
            temperature_2m: None,
            wind_speed_10m: None,
            precipitation: None,
        };
        let daily = DailyForecast {
            time: vec!["2026-08-08".to_string()],
            temperature_2m_max: vec![],
            temperature_2m_min: vec![],
            precipitation_probability_max: vec![],
            wind_speed_10m_max: vec![],
        };

        let summary = render_summary(0.0, 0.0, &current, &daily, 1);
        assert!(summary.contains("?C"));
        assert!(summary.contains("2026-08-08: ?-?C 0% rain 0mph"));
    }

    #[test]
    fn forecast_response_deserializes() {
        let raw = r#"{
            "current": {"temperature_2m": 18.2, "wind_speed_10m": 3.1, "precipitation": 0.2},
            "daily": {
                "time": ["2026-08-08"],
                "temperature_2m_max": [22.1],
                "temperature_2m_min": [12.4],
                "precipitation_probability_max": [15.0],
                "wind_speed_10m_max": [5.5]
            }
        }"#;
        let parsed: ForecastResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.current.is_some());
        assert_eq!(parsed.daily.unwrap().time.len(), 1);
    }
}
