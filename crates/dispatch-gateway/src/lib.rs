//! External gateway module for the dispatch service.
//!
//! This module provides interfaces and implementations for the two outside
//! services the pricing pipeline depends on: address geocoding and road
//! routing. Both follow the same trait-based pattern as other dispatch
//! components, and both model upstream absence as an outcome value rather
//! than an error, because "this address does not resolve" is a normal
//! business answer, not a failure.

use async_trait::async_trait;
use dispatch_types::{ConfigSchema, GeoPoint, ImplementationRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod address;

/// Re-export implementations
pub mod implementations {
	pub mod dadata;
	pub mod mock;
	pub mod osrm;
}

/// Errors that can occur during gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// Error that occurs during network communication with an upstream service.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when an upstream response cannot be parsed.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A successfully geocoded address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
	/// The coordinates of the address.
	pub point: GeoPoint,
	/// The canonical full address as the geocoder writes it.
	pub full_address: String,
	/// The city component, when the geocoder reports one.
	pub city: Option<String>,
	/// The region component, when the geocoder reports one.
	pub region: Option<String>,
}

/// Outcome of a geocoding request.
///
/// `Unresolved` means the upstream answered but could not place the address.
/// Transport and parse failures surface as `GatewayError` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoResolution {
	/// The address resolved to coordinates.
	Resolved(ResolvedAddress),
	/// The geocoder found no match for the query.
	Unresolved,
}

/// Outcome of a road distance request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteEstimate {
	/// Road distance between the two points, in kilometers.
	Road(f64),
	/// The router could not produce a route; the caller falls back to a
	/// straight-line estimate.
	Unavailable,
}

/// Trait defining the interface for geocoding implementations.
#[async_trait]
pub trait GeocodingInterface: Send + Sync {
	/// Returns the configuration schema for this geocoding implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Resolves a free-form address query to coordinates.
	async fn resolve(&self, query: &str) -> Result<GeoResolution, GatewayError>;
}

/// Trait defining the interface for routing implementations.
#[async_trait]
pub trait RoutingInterface: Send + Sync {
	/// Returns the configuration schema for this routing implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Estimates the road distance between two points.
	async fn road_distance(
		&self,
		from: &GeoPoint,
		to: &GeoPoint,
	) -> Result<RouteEstimate, GatewayError>;
}

/// Type alias for geocoding factory functions.
pub type GeocodingFactory = fn(&toml::Value) -> Result<Box<dyn GeocodingInterface>, GatewayError>;

/// Type alias for routing factory functions.
pub type RoutingFactory = fn(&toml::Value) -> Result<Box<dyn RoutingInterface>, GatewayError>;

/// Registry trait for geocoding implementations.
pub trait GeocodingRegistry: ImplementationRegistry<Factory = GeocodingFactory> {}

/// Registry trait for routing implementations.
pub trait RoutingRegistry: ImplementationRegistry<Factory = RoutingFactory> {}

/// Get all registered geocoding implementations.
pub fn get_all_geocoding_implementations() -> Vec<(&'static str, GeocodingFactory)> {
	use implementations::{dadata, mock};

	vec![
		(dadata::Registry::NAME, dadata::Registry::factory()),
		(
			mock::GeocodingMockRegistry::NAME,
			mock::GeocodingMockRegistry::factory(),
		),
	]
}

/// Get all registered routing implementations.
pub fn get_all_routing_implementations() -> Vec<(&'static str, RoutingFactory)> {
	use implementations::{mock, osrm};

	vec![
		(osrm::Registry::NAME, osrm::Registry::factory()),
		(
			mock::RoutingMockRegistry::NAME,
			mock::RoutingMockRegistry::factory(),
		),
	]
}

/// Service that manages geocoding with multiple implementations.
pub struct GeocodingService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn GeocodingInterface>>,
	/// The primary implementation to use for resolution.
	primary_implementation: String,
}

impl GeocodingService {
	/// Creates a new GeocodingService with the given implementations.
	pub fn new(
		implementations: HashMap<String, Arc<dyn GeocodingInterface>>,
		primary_implementation: String,
	) -> Result<Self, GatewayError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(GatewayError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	/// Resolves an address using the primary implementation.
	pub async fn resolve(&self, query: &str) -> Result<GeoResolution, GatewayError> {
		let implementation = self
			.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				GatewayError::Configuration(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})?;

		implementation.resolve(query).await
	}
}

/// Service that manages routing with multiple implementations.
pub struct RoutingService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn RoutingInterface>>,
	/// The primary implementation to use for distance estimates.
	primary_implementation: String,
}

impl RoutingService {
	/// Creates a new RoutingService with the given implementations.
	pub fn new(
		implementations: HashMap<String, Arc<dyn RoutingInterface>>,
		primary_implementation: String,
	) -> Result<Self, GatewayError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(GatewayError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	/// Estimates road distance using the primary implementation.
	pub async fn road_distance(
		&self,
		from: &GeoPoint,
		to: &GeoPoint,
	) -> Result<RouteEstimate, GatewayError> {
		let implementation = self
			.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				GatewayError::Configuration(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})?;

		implementation.road_distance(from, to).await
	}
}
