//! DaData suggestion API geocoding implementation.
//!
//! Sends the cleaned address query to the DaData address suggestion endpoint
//! and takes the top suggestion's coordinates. Suggestions without
//! coordinates count as unresolved, not as errors.

use crate::{GatewayError, GeoResolution, GeocodingFactory, GeocodingInterface, ResolvedAddress};
use async_trait::async_trait;
use dispatch_types::{
	ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry, Schema, ValidationError,
};
use serde::Deserialize;
use std::time::Duration;

/// Default suggestion endpoint base.
const DEFAULT_BASE_URL: &str = "https://suggestions.dadata.ru/suggestions/api/4_1/rs";

/// Default upstream timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Geocoder backed by the DaData address suggestion API.
pub struct DadataGeocoding {
	/// HTTP client with the request timeout baked in.
	client: reqwest::Client,
	/// API token sent in the Authorization header.
	api_key: String,
	/// Base URL of the suggestion API.
	base_url: String,
}

#[derive(Deserialize)]
struct SuggestResponse {
	suggestions: Vec<Suggestion>,
}

#[derive(Deserialize)]
struct Suggestion {
	unrestricted_value: String,
	data: SuggestionData,
}

#[derive(Deserialize)]
struct SuggestionData {
	geo_lat: Option<String>,
	geo_lon: Option<String>,
	city: Option<String>,
	settlement: Option<String>,
	region_with_type: Option<String>,
}

impl DadataGeocoding {
	/// Creates a new DaData geocoder.
	pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			api_key,
			base_url,
		})
	}
}

#[async_trait]
impl GeocodingInterface for DadataGeocoding {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DadataSchema)
	}

	async fn resolve(&self, query: &str) -> Result<GeoResolution, GatewayError> {
		let url = format!("{}/suggest/address", self.base_url);
		let response = self
			.client
			.post(&url)
			.header("Authorization", format!("Token {}", self.api_key))
			.json(&serde_json::json!({ "query": query, "count": 1 }))
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(GatewayError::InvalidResponse(format!(
				"suggestion API returned status {}",
				response.status()
			)));
		}

		let body: SuggestResponse = response
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

		let Some(suggestion) = body.suggestions.into_iter().next() else {
			return Ok(GeoResolution::Unresolved);
		};

		// A suggestion without coordinates is a textual match only.
		let (Some(lat_str), Some(lon_str)) = (suggestion.data.geo_lat, suggestion.data.geo_lon)
		else {
			return Ok(GeoResolution::Unresolved);
		};
		let (Ok(lat), Ok(lon)) = (lat_str.parse::<f64>(), lon_str.parse::<f64>()) else {
			return Ok(GeoResolution::Unresolved);
		};

		Ok(GeoResolution::Resolved(ResolvedAddress {
			point: GeoPoint { lat, lon },
			full_address: suggestion.unrestricted_value,
			city: suggestion.data.city.or(suggestion.data.settlement),
			region: suggestion.data.region_with_type,
		}))
	}
}

/// Configuration schema for DadataGeocoding.
pub struct DadataSchema;

impl ConfigSchema for DadataSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("api_key", FieldType::String)],
			// Optional fields
			vec![
				Field::new("base_url", FieldType::String),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
			],
		);

		schema.validate(config)
	}
}

/// Registry for the DaData geocoding implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "dadata";
	type Factory = GeocodingFactory;

	fn factory() -> Self::Factory {
		create_geocoding
	}
}

impl crate::GeocodingRegistry for Registry {}

/// Factory function to create a DaData geocoder from configuration.
///
/// Configuration parameters:
/// - `api_key`: DaData API token (required)
/// - `base_url`: suggestion API base URL (optional)
/// - `timeout_ms`: request timeout in milliseconds (optional, default 3000)
pub fn create_geocoding(
	config: &toml::Value,
) -> Result<Box<dyn GeocodingInterface>, GatewayError> {
	DadataSchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GatewayError::Configuration("api_key is required".to_string()))?
		.to_string();
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_BASE_URL)
		.trim_end_matches('/')
		.to_string();
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Box::new(DadataGeocoding::new(
		api_key,
		base_url,
		Duration::from_millis(timeout_ms),
	)?))
}
