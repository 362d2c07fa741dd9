//! Wires configuration into a running dialog router.
//!
//! Implementations are instantiated through the factory lists each crate
//! exports, so a config file selects backends by name and an unknown name
//! fails fast with the available alternatives listed.

use dispatch_config::Config;
use dispatch_core::{CourierService, OrderService, ShopService};
use dispatch_dialog::{
	CourierRegisterHandler, OrderCreateHandler, OrderEditHandler, Router, SessionStore,
	ShopRegisterHandler,
};
use dispatch_gateway::{
	get_all_geocoding_implementations, get_all_routing_implementations, GeocodingInterface,
	GeocodingService, RoutingInterface, RoutingService,
};
use dispatch_storage::{get_all_implementations, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Resolves one named implementation from a factory list, or fails with
/// the names that would have worked.
macro_rules! resolve_factory {
	($factories:expr, $name:expr, $kind:literal) => {{
		let factories: HashMap<&str, _> = $factories.into_iter().collect();
		match factories.get($name.as_str()) {
			Some(factory) => *factory,
			None => {
				let mut available: Vec<_> = factories.keys().copied().collect();
				available.sort_unstable();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$kind,
					$name,
					available.join(", ")
				)
				.into());
			},
		}
	}};
}

/// Builds the fully wired router from validated configuration.
pub fn build_router(config: &Config) -> Result<Router, Box<dyn std::error::Error>> {
	let storage = build_storage(config)?;
	let geocoding = build_geocoding(config)?;
	let routing = build_routing(config)?;

	let pricing = Arc::new(dispatch_pricing::PricingPipeline::new(
		Arc::new(geocoding),
		Arc::new(routing),
		&config.pricing,
		config.region.clone(),
	));
	let orders = Arc::new(OrderService::new(
		storage.clone(),
		pricing.clone(),
		config.orders.courier_active_cap,
	));
	let shops = Arc::new(ShopService::new(storage.clone(), pricing.clone()));
	let couriers = Arc::new(CourierService::new(storage));

	info!(
		service = %config.service.id,
		city = %config.region.city,
		"service components wired"
	);

	Ok(Router::new(
		Arc::new(SessionStore::new()),
		OrderCreateHandler::new(pricing, orders.clone(), config.orders.cutoff_hour),
		OrderEditHandler::new(orders.clone()),
		ShopRegisterHandler::new(shops.clone()),
		CourierRegisterHandler::new(couriers.clone()),
		shops,
		couriers,
		orders,
	))
}

fn build_storage(config: &Config) -> Result<Arc<StorageService>, Box<dyn std::error::Error>> {
	let name = &config.storage.primary;
	let factory = resolve_factory!(get_all_implementations(), name, "storage");
	// Config validation guarantees the primary has a settings entry.
	let settings = config
		.storage
		.implementations
		.get(name)
		.ok_or_else(|| format!("Missing settings for storage implementation '{}'", name))?;
	let backend = factory(settings)?;
	info!(implementation = %name, "storage backend ready");
	Ok(Arc::new(StorageService::new(backend)))
}

fn build_geocoding(config: &Config) -> Result<GeocodingService, Box<dyn std::error::Error>> {
	let mut implementations: HashMap<String, Arc<dyn GeocodingInterface>> = HashMap::new();
	for (name, settings) in &config.geocoding.implementations {
		let factory = resolve_factory!(get_all_geocoding_implementations(), name, "geocoding");
		implementations.insert(name.clone(), Arc::from(factory(settings)?));
	}
	info!(primary = %config.geocoding.primary, "geocoding gateway ready");
	Ok(GeocodingService::new(
		implementations,
		config.geocoding.primary.clone(),
	)?)
}

fn build_routing(config: &Config) -> Result<RoutingService, Box<dyn std::error::Error>> {
	let mut implementations: HashMap<String, Arc<dyn RoutingInterface>> = HashMap::new();
	for (name, settings) in &config.routing.implementations {
		let factory = resolve_factory!(get_all_routing_implementations(), name, "routing");
		implementations.insert(name.clone(), Arc::from(factory(settings)?));
	}
	info!(primary = %config.routing.primary, "routing gateway ready");
	Ok(RoutingService::new(
		implementations,
		config.routing.primary.clone(),
	)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	const MOCKED: &str = r#"
		[service]
		id = "dispatch-test"

		[region]
		city = "Москва"
		area = "Московская"

		[storage]
		primary = "memory"
		[storage.implementations.memory]

		[geocoding]
		primary = "mock"
		[geocoding.implementations.mock]
		lat = 55.80
		lon = 37.70
		city = "Москва"
		region = "Московская область"

		[routing]
		primary = "mock"
		[routing.implementations.mock]
		distance_km = 4.0
	"#;

	#[test]
	fn test_mocked_config_builds_a_router() {
		let config = Config::from_toml_str(MOCKED).unwrap();
		assert!(build_router(&config).is_ok());
	}

	#[test]
	fn test_unknown_storage_name_lists_alternatives() {
		let raw = MOCKED
			.replace("primary = \"memory\"", "primary = \"postgres\"")
			.replace("[storage.implementations.memory]", "[storage.implementations.postgres]");
		let config = Config::from_toml_str(&raw).unwrap();
		let err = build_router(&config).err().unwrap().to_string();
		assert!(err.contains("postgres"));
		assert!(err.contains("memory"));
	}
}
