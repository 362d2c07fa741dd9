//! Configuration module for the dispatch service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set. Every empirically
//! tuned constant (tariff ladder, cutoff hour, correction coefficients,
//! courier cap) is a config field with a documented default; nothing reads
//! those values as hard-coded literals elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the dispatch service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Service region used for geocoding enrichment and zone validation.
	pub region: RegionConfig,
	/// Order intake and claiming policy.
	#[serde(default)]
	pub orders: OrdersConfig,
	/// Tariff ladder and distance-correction coefficients.
	#[serde(default)]
	pub pricing: PricingConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the geocoding gateway.
	pub geocoding: GatewayConfig,
	/// Configuration for the road-routing gateway.
	pub routing: GatewayConfig,
}

/// Configuration specific to this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this deployment (one per city).
	pub id: String,
}

/// Service region configuration.
///
/// The same code runs in different cities; only these two strings change.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionConfig {
	/// City prepended to bare addresses before geocoding.
	pub city: String,
	/// Administrative area an address must resolve into to be priced
	/// automatically, e.g. "Chelyabinskaya oblast".
	pub area: String,
}

/// Order intake and claiming policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Hour (0-23) after which same-day delivery can no longer be chosen.
	#[serde(default = "default_cutoff_hour")]
	pub cutoff_hour: u32,
	/// Maximum simultaneously unfinished orders a courier may hold.
	#[serde(default = "default_courier_active_cap")]
	pub courier_active_cap: usize,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			cutoff_hour: default_cutoff_hour(),
			courier_active_cap: default_courier_active_cap(),
		}
	}
}

fn default_cutoff_hour() -> u32 {
	21
}

fn default_courier_active_cap() -> usize {
	3
}

/// One tariff ladder entry: flat price up to a maximum distance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TariffEntry {
	/// Breakpoint distance in kilometers (inclusive).
	pub max_km: u32,
	/// Flat price for any distance up to the breakpoint, in currency units.
	pub price: u64,
}

/// Tariff ladder and distance-correction coefficients.
///
/// The correction curve and the fallback multiplier were calibrated against
/// one specific city's road network; deployments elsewhere should re-tune
/// them here rather than in code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Ordered distance -> price breakpoints.
	#[serde(default = "default_tariffs")]
	pub tariffs: Vec<TariffEntry>,
	/// Block size for pricing distances beyond the last breakpoint.
	#[serde(default = "default_extension_block_km")]
	pub extension_block_km: u32,
	/// Price added per started block beyond the last breakpoint.
	#[serde(default = "default_extension_block_price")]
	pub extension_block_price: u64,
	/// Multiplier applied to straight-line distance when the routing gateway
	/// is unavailable.
	#[serde(default = "default_fallback_road_coefficient")]
	pub fallback_road_coefficient: f64,
	/// Below this road distance the routing gateway is trusted as-is.
	#[serde(default = "default_correction_flat_below_km")]
	pub correction_flat_below_km: f64,
	/// At and above this road distance the full correction applies.
	#[serde(default = "default_correction_flat_above_km")]
	pub correction_flat_above_km: f64,
	/// Correction multiplier at and beyond `correction_flat_above_km`; the
	/// routing provider under-estimates longer legs.
	#[serde(default = "default_correction_max")]
	pub correction_max: f64,
}

impl Default for PricingConfig {
	fn default() -> Self {
		Self {
			tariffs: default_tariffs(),
			extension_block_km: default_extension_block_km(),
			extension_block_price: default_extension_block_price(),
			fallback_road_coefficient: default_fallback_road_coefficient(),
			correction_flat_below_km: default_correction_flat_below_km(),
			correction_flat_above_km: default_correction_flat_above_km(),
			correction_max: default_correction_max(),
		}
	}
}

/// Returns the default 14-entry tariff ladder, from 3 km up to 30 km.
fn default_tariffs() -> Vec<TariffEntry> {
	[
		(3, 300),
		(5, 400),
		(7, 500),
		(9, 700),
		(11, 850),
		(13, 1000),
		(15, 1150),
		(17, 1300),
		(19, 1450),
		(21, 1550),
		(23, 1650),
		(25, 1750),
		(27, 1850),
		(30, 2000),
	]
	.into_iter()
	.map(|(max_km, price)| TariffEntry { max_km, price })
	.collect()
}

fn default_extension_block_km() -> u32 {
	3
}

fn default_extension_block_price() -> u64 {
	100
}

fn default_fallback_road_coefficient() -> f64 {
	1.6
}

fn default_correction_flat_below_km() -> f64 {
	5.0
}

fn default_correction_flat_above_km() -> f64 {
	12.0
}

fn default_correction_max() -> f64 {
	1.24
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for an external gateway (geocoding or routing).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of gateway implementation names to their configurations.
	/// Each implementation has its own format stored as raw TOML values.
	pub implementations: HashMap<String, toml::Value>,
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path)?;
		Self::from_toml_str(&raw)
	}

	/// Loads and validates configuration from a TOML file without blocking.
	pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path.as_ref()).await?;
		Self::from_toml_str(&raw)
	}

	/// Parses and validates configuration from a TOML string.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("service.id must not be empty".into()));
		}
		if self.region.city.is_empty() || self.region.area.is_empty() {
			return Err(ConfigError::Validation(
				"region.city and region.area must not be empty".into(),
			));
		}
		if self.orders.cutoff_hour > 23 {
			return Err(ConfigError::Validation(
				"orders.cutoff_hour must be between 0 and 23".into(),
			));
		}
		if self.orders.courier_active_cap == 0 {
			return Err(ConfigError::Validation(
				"orders.courier_active_cap must be at least 1".into(),
			));
		}
		self.validate_pricing()?;
		for (section, gateway) in [
			("storage", (&self.storage.primary, &self.storage.implementations)),
			("geocoding", (&self.geocoding.primary, &self.geocoding.implementations)),
			("routing", (&self.routing.primary, &self.routing.implementations)),
		] {
			let (primary, implementations) = gateway;
			if !implementations.contains_key(primary.as_str()) {
				return Err(ConfigError::Validation(format!(
					"{}.primary '{}' has no matching entry in {}.implementations",
					section, primary, section
				)));
			}
		}
		Ok(())
	}

	fn validate_pricing(&self) -> Result<(), ConfigError> {
		let pricing = &self.pricing;
		if pricing.tariffs.is_empty() {
			return Err(ConfigError::Validation(
				"pricing.tariffs must contain at least one breakpoint".into(),
			));
		}
		let mut prev: Option<&TariffEntry> = None;
		for entry in &pricing.tariffs {
			if let Some(p) = prev {
				if entry.max_km <= p.max_km {
					return Err(ConfigError::Validation(format!(
						"pricing.tariffs breakpoints must be strictly increasing (found {} after {})",
						entry.max_km, p.max_km
					)));
				}
				if entry.price < p.price {
					return Err(ConfigError::Validation(format!(
						"pricing.tariffs prices must be non-decreasing (found {} after {})",
						entry.price, p.price
					)));
				}
			}
			prev = Some(entry);
		}
		if pricing.extension_block_km == 0 {
			return Err(ConfigError::Validation(
				"pricing.extension_block_km must be at least 1".into(),
			));
		}
		if pricing.fallback_road_coefficient < 1.0 {
			return Err(ConfigError::Validation(
				"pricing.fallback_road_coefficient must be >= 1.0".into(),
			));
		}
		if pricing.correction_flat_above_km <= pricing.correction_flat_below_km {
			return Err(ConfigError::Validation(
				"pricing.correction_flat_above_km must exceed correction_flat_below_km".into(),
			));
		}
		if pricing.correction_max < 1.0 {
			return Err(ConfigError::Validation(
				"pricing.correction_max must be >= 1.0".into(),
			));
		}
		Ok(())
	}

	/// The minimum acceptable stop price: the first breakpoint's price.
	///
	/// Manual price entry in the dialogs is validated against this floor.
	pub fn min_stop_price(&self) -> u64 {
		self.pricing.tariffs.first().map(|t| t.price).unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
		[service]
		id = "dispatch-test"

		[region]
		city = "Chelyabinsk"
		area = "Chelyabinskaya oblast"

		[storage]
		primary = "memory"
		[storage.implementations.memory]

		[geocoding]
		primary = "mock"
		[geocoding.implementations.mock]

		[routing]
		primary = "mock"
		[routing.implementations.mock]
	"#;

	#[test]
	fn minimal_config_uses_documented_defaults() {
		let config = Config::from_toml_str(MINIMAL).unwrap();
		assert_eq!(config.orders.cutoff_hour, 21);
		assert_eq!(config.orders.courier_active_cap, 3);
		assert_eq!(config.pricing.tariffs.len(), 14);
		assert_eq!(config.pricing.tariffs[0].max_km, 3);
		assert_eq!(config.pricing.tariffs[0].price, 300);
		assert_eq!(config.pricing.tariffs[13].max_km, 30);
		assert_eq!(config.pricing.tariffs[13].price, 2000);
		assert_eq!(config.min_stop_price(), 300);
		assert!((config.pricing.fallback_road_coefficient - 1.6).abs() < f64::EPSILON);
	}

	#[test]
	fn primary_without_implementation_is_rejected() {
		let raw = MINIMAL.replace("primary = \"memory\"", "primary = \"postgres\"");
		let err = Config::from_toml_str(&raw).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn out_of_order_tariffs_are_rejected() {
		let raw = format!(
			"{}\n[[pricing.tariffs]]\nmax_km = 5\nprice = 400\n[[pricing.tariffs]]\nmax_km = 3\nprice = 300\n",
			MINIMAL
		);
		let err = Config::from_toml_str(&raw).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn cutoff_hour_out_of_range_is_rejected() {
		let raw = format!("{}\n[orders]\ncutoff_hour = 24\n", MINIMAL);
		let err = Config::from_toml_str(&raw).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}
}
