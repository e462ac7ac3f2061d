//! Weather lookup against the open-meteo geocoding and forecast APIs.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::config::WeatherConfig;
use crate::llm::ToolDefinition;
use crate::tools::cache::TtlCache;
use crate::tools::error::ToolResult;
use crate::tools::{Tool, ToolFuture, required_str};

const TOOL_NAME: &str = "get_weather";
const FETCH_FAILED: &str = "Failed to fetch weather data.";

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeoLocation>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoLocation {
    name: String,
    #[serde(default)]
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

enum Lookup {
    Found(Value),
    NotFound,
}

/// `get_weather`: current conditions plus a 7-day forecast for a city.
pub struct WeatherTool {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
    cache: TtlCache<Value>,
}

impl WeatherTool {
    /// Build the tool from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &WeatherConfig) -> ToolResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.trim_end_matches('/').to_string(),
            forecast_url: config.forecast_url.trim_end_matches('/').to_string(),
            cache: TtlCache::new(
                config.cache_enabled,
                Duration::from_secs(config.cache_ttl_seconds),
                config.cache_max_entries,
            ),
        })
    }

    /// Look up the weather for `city` and return the JSON handed to the model.
    ///
    /// Lookup failures are reported inside the JSON rather than as errors.
    pub async fn weather_for(&self, city: &str) -> Value {
        let key = city.trim().to_lowercase();
        if let Some(cached) = self.cache.get(&key) {
            debug!(city = %city, "Weather cache hit");
            return cached;
        }

        match self.fetch(city).await {
            Ok(Lookup::Found(value)) => {
                self.cache.insert(&key, value.clone());
                value
            }
            Ok(Lookup::NotFound) => json!({ "error": format!("City '{city}' not found.") }),
            Err(err) => {
                error!(city = %city, error = %err, "Weather API error");
                json!({ "error": FETCH_FAILED })
            }
        }
    }

    async fn fetch(&self, city: &str) -> ToolResult<Lookup> {
        let geo_url = format!(
            "{}/v1/search?name={}&count=1&language=en&format=json",
            self.geocoding_url,
            urlencoding::encode(city)
        );
        let geo: GeocodingResponse = self
            .client
            .get(geo_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(location) = geo.results.into_iter().next() else {
            return Ok(Lookup::NotFound);
        };

        let forecast_url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current_weather=true&daily=temperature_2m_max,temperature_2m_min&timezone=auto",
            self.forecast_url, location.latitude, location.longitude
        );
        let weather: Value = self
            .client
            .get(forecast_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Lookup::Found(json!({
            "location": {
                "name": location.name,
                "country": location.country,
                "latitude": location.latitude,
                "longitude": location.longitude,
            },
            "weather": weather,
        })))
    }
}

impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            TOOL_NAME,
            "Get current weather and 7-day forecast for a specific city. Use this for any weather request including today, tomorrow, or future dates.",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The name of the city, e.g. Beijing, New York"
                    },
                    "date": {
                        "type": "string",
                        "description": "The specific date to query weather for (optional), e.g. '2024-01-01' or 'tomorrow'. The tool will return a 7-day forecast covering this date."
                    }
                },
                "required": ["city"]
            }),
        )
    }

    fn invoke(&self, arguments: Value) -> ToolFuture<'_, ToolResult<String>> {
        Box::pin(async move {
            let city = required_str(TOOL_NAME, &arguments, "city")?;
            let date = arguments.get("date").and_then(Value::as_str);
            info!(city = %city, date = ?date, "Calling weather tool");
            Ok(self.weather_for(&city).await.to_string())
        })
    }
}
