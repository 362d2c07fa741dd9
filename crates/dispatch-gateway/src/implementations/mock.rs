//! Mock gateway implementations for testing and development.
//!
//! The mock geocoder answers from a canned table (plus an optional default
//! answer for every other query); the mock router returns a fixed distance
//! or reports itself unavailable. Both are wired through the same factory
//! machinery as the real implementations so development configs can select
//! them by name.

use crate::{
	GatewayError, GeoResolution, GeocodingFactory, GeocodingInterface, ResolvedAddress,
	RouteEstimate, RoutingFactory, RoutingInterface,
};
use async_trait::async_trait;
use dispatch_types::{
	ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry, Schema, ValidationError,
};
use std::collections::HashMap;

/// Geocoder that answers from a canned table.
pub struct MockGeocoding {
	/// Exact-match answers keyed by query string.
	answers: HashMap<String, ResolvedAddress>,
	/// Answer returned for queries not in the table, when set.
	default: Option<ResolvedAddress>,
}

impl MockGeocoding {
	/// Creates a mock geocoder with no canned answers.
	pub fn new() -> Self {
		Self {
			answers: HashMap::new(),
			default: None,
		}
	}

	/// Adds a canned answer for an exact query string.
	pub fn with_answer(mut self, query: impl Into<String>, answer: ResolvedAddress) -> Self {
		self.answers.insert(query.into(), answer);
		self
	}

	/// Sets the answer for every query not in the canned table.
	pub fn with_default(mut self, answer: ResolvedAddress) -> Self {
		self.default = Some(answer);
		self
	}
}

impl Default for MockGeocoding {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl GeocodingInterface for MockGeocoding {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockGeocodingSchema)
	}

	async fn resolve(&self, query: &str) -> Result<GeoResolution, GatewayError> {
		match self.answers.get(query).or(self.default.as_ref()) {
			Some(answer) => Ok(GeoResolution::Resolved(answer.clone())),
			None => Ok(GeoResolution::Unresolved),
		}
	}
}

/// Configuration schema for MockGeocoding.
pub struct MockGeocodingSchema;

impl ConfigSchema for MockGeocodingSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			// Optional fields
			vec![
				Field::new("lat", FieldType::Float),
				Field::new("lon", FieldType::Float),
				Field::new("city", FieldType::String),
				Field::new("region", FieldType::String),
			],
		);

		schema.validate(config)
	}
}

/// Registry for the mock geocoding implementation.
pub struct GeocodingMockRegistry;

impl ImplementationRegistry for GeocodingMockRegistry {
	const NAME: &'static str = "mock";
	type Factory = GeocodingFactory;

	fn factory() -> Self::Factory {
		create_geocoding
	}
}

impl crate::GeocodingRegistry for GeocodingMockRegistry {}

/// Factory function to create a mock geocoder from configuration.
///
/// When `lat` and `lon` are configured, every query resolves to that point;
/// otherwise every query is unresolved.
pub fn create_geocoding(
	config: &toml::Value,
) -> Result<Box<dyn GeocodingInterface>, GatewayError> {
	MockGeocodingSchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let lat = config.get("lat").and_then(as_float);
	let lon = config.get("lon").and_then(as_float);

	let mock = match (lat, lon) {
		(Some(lat), Some(lon)) => MockGeocoding::new().with_default(ResolvedAddress {
			point: GeoPoint { lat, lon },
			full_address: "mock address".to_string(),
			city: config
				.get("city")
				.and_then(|v| v.as_str())
				.map(str::to_string),
			region: config
				.get("region")
				.and_then(|v| v.as_str())
				.map(str::to_string),
		}),
		_ => MockGeocoding::new(),
	};

	Ok(Box::new(mock))
}

/// Router that returns a fixed distance.
pub struct MockRouting {
	/// Distance returned for every request; `None` reports unavailability.
	distance_km: Option<f64>,
}

impl MockRouting {
	/// Creates a mock router that always returns the given distance.
	pub fn with_distance(distance_km: f64) -> Self {
		Self {
			distance_km: Some(distance_km),
		}
	}

	/// Creates a mock router that is always unavailable.
	pub fn unavailable() -> Self {
		Self { distance_km: None }
	}
}

#[async_trait]
impl RoutingInterface for MockRouting {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockRoutingSchema)
	}

	async fn road_distance(
		&self,
		_from: &GeoPoint,
		_to: &GeoPoint,
	) -> Result<RouteEstimate, GatewayError> {
		match self.distance_km {
			Some(km) => Ok(RouteEstimate::Road(km)),
			None => Ok(RouteEstimate::Unavailable),
		}
	}
}

/// Configuration schema for MockRouting.
pub struct MockRoutingSchema;

impl ConfigSchema for MockRoutingSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			// Optional fields
			vec![Field::new("distance_km", FieldType::Float)],
		);

		schema.validate(config)
	}
}

/// Registry for the mock routing implementation.
pub struct RoutingMockRegistry;

impl ImplementationRegistry for RoutingMockRegistry {
	const NAME: &'static str = "mock";
	type Factory = RoutingFactory;

	fn factory() -> Self::Factory {
		create_routing
	}
}

impl crate::RoutingRegistry for RoutingMockRegistry {}

/// Factory function to create a mock router from configuration.
///
/// When `distance_km` is configured, every request returns that distance;
/// otherwise the router reports itself unavailable.
pub fn create_routing(config: &toml::Value) -> Result<Box<dyn RoutingInterface>, GatewayError> {
	MockRoutingSchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let mock = match config.get("distance_km").and_then(as_float) {
		Some(km) => MockRouting::with_distance(km),
		None => MockRouting::unavailable(),
	};

	Ok(Box::new(mock))
}

fn as_float(value: &toml::Value) -> Option<f64> {
	value
		.as_float()
		.or_else(|| value.as_integer().map(|v| v as f64))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn answer(lat: f64, lon: f64) -> ResolvedAddress {
		ResolvedAddress {
			point: GeoPoint { lat, lon },
			full_address: "г Москва, ул Тверская, д 7".to_string(),
			city: Some("Москва".to_string()),
			region: Some("Москва".to_string()),
		}
	}

	#[tokio::test]
	async fn test_canned_answer_and_fallthrough() {
		let mock = MockGeocoding::new().with_answer("Tverskaya 7", answer(55.76, 37.61));

		let hit = mock.resolve("Tverskaya 7").await.unwrap();
		assert!(matches!(hit, GeoResolution::Resolved(a) if a.point.lat == 55.76));

		let miss = mock.resolve("Unknown street 1").await.unwrap();
		assert_eq!(miss, GeoResolution::Unresolved);
	}

	#[tokio::test]
	async fn test_default_answer_covers_unknown_queries() {
		let mock = MockGeocoding::new().with_default(answer(55.0, 37.0));
		let hit = mock.resolve("anything").await.unwrap();
		assert!(matches!(hit, GeoResolution::Resolved(_)));
	}

	#[tokio::test]
	async fn test_mock_routing_outcomes() {
		let a = GeoPoint { lat: 55.0, lon: 37.0 };
		let b = GeoPoint { lat: 55.1, lon: 37.1 };

		let fixed = MockRouting::with_distance(8.4);
		assert_eq!(
			fixed.road_distance(&a, &b).await.unwrap(),
			RouteEstimate::Road(8.4)
		);

		let down = MockRouting::unavailable();
		assert_eq!(
			down.road_distance(&a, &b).await.unwrap(),
			RouteEstimate::Unavailable
		);
	}
}
