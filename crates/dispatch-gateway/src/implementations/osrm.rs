//! OSRM road routing implementation.
//!
//! Asks an OSRM instance for the driving route between two points and
//! returns its distance. OSRM speaks lon,lat order, the opposite of how
//! coordinates are stored everywhere else in this service.
//!
//! Routing failures of any kind come back as `RouteEstimate::Unavailable`
//! so the pricing pipeline can fall back to a straight-line estimate; a
//! flaky router should degrade a quote, not block it.

use crate::{GatewayError, RouteEstimate, RoutingFactory, RoutingInterface};
use async_trait::async_trait;
use dispatch_types::{
	ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry, Schema, ValidationError,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Default upstream timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Router backed by an OSRM HTTP instance.
pub struct OsrmRouting {
	/// HTTP client with the request timeout baked in.
	client: reqwest::Client,
	/// Base URL of the OSRM instance.
	base_url: String,
}

#[derive(Deserialize)]
struct RouteResponse {
	code: String,
	#[serde(default)]
	routes: Vec<Route>,
}

#[derive(Deserialize)]
struct Route {
	/// Route length in meters.
	distance: f64,
}

impl OsrmRouting {
	/// Creates a new OSRM router.
	pub fn new(base_url: String, timeout: Duration) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;

		Ok(Self { client, base_url })
	}
}

#[async_trait]
impl RoutingInterface for OsrmRouting {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(OsrmSchema)
	}

	async fn road_distance(
		&self,
		from: &GeoPoint,
		to: &GeoPoint,
	) -> Result<RouteEstimate, GatewayError> {
		// OSRM takes lon,lat pairs.
		let url = format!(
			"{}/route/v1/driving/{},{};{},{}?overview=false",
			self.base_url, from.lon, from.lat, to.lon, to.lat
		);

		let response = match self.client.get(&url).send().await {
			Ok(response) => response,
			Err(e) => {
				warn!(error = %e, "routing request failed, falling back");
				return Ok(RouteEstimate::Unavailable);
			},
		};

		if !response.status().is_success() {
			warn!(status = %response.status(), "routing request rejected, falling back");
			return Ok(RouteEstimate::Unavailable);
		}

		let body: RouteResponse = match response.json().await {
			Ok(body) => body,
			Err(e) => {
				warn!(error = %e, "routing response unreadable, falling back");
				return Ok(RouteEstimate::Unavailable);
			},
		};

		if body.code != "Ok" {
			return Ok(RouteEstimate::Unavailable);
		}

		match body.routes.first() {
			Some(route) => Ok(RouteEstimate::Road(route.distance / 1000.0)),
			None => Ok(RouteEstimate::Unavailable),
		}
	}
}

/// Configuration schema for OsrmRouting.
pub struct OsrmSchema;

impl ConfigSchema for OsrmSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("base_url", FieldType::String)],
			// Optional fields
			vec![Field::new(
				"timeout_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(60_000),
				},
			)],
		);

		schema.validate(config)
	}
}

/// Registry for the OSRM routing implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "osrm";
	type Factory = RoutingFactory;

	fn factory() -> Self::Factory {
		create_routing
	}
}

impl crate::RoutingRegistry for Registry {}

/// Factory function to create an OSRM router from configuration.
///
/// Configuration parameters:
/// - `base_url`: OSRM instance base URL (required)
/// - `timeout_ms`: request timeout in milliseconds (optional, default 3000)
pub fn create_routing(config: &toml::Value) -> Result<Box<dyn RoutingInterface>, GatewayError> {
	OsrmSchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GatewayError::Configuration("base_url is required".to_string()))?
		.trim_end_matches('/')
		.to_string();
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Box::new(OsrmRouting::new(
		base_url,
		Duration::from_millis(timeout_ms),
	)?))
}
