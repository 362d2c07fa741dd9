//! Pricing module for the dispatch service.
//!
//! This module turns a customer-typed stop address into a delivery quote:
//! geocode the address, measure the distance from the anchor point (the shop
//! for the first stop, the previous stop for each later one), and look the
//! distance up in the tariff ladder. Geocoder misses and out-of-zone
//! addresses are quote outcomes, not errors; the dialog layer renders them
//! as questions back to the customer.

use dashmap::DashMap;
use dispatch_config::{PricingConfig, RegionConfig};
use dispatch_gateway::{
	address::{enrich_with_city, normalize_address, region_matches},
	GeoResolution, GeocodingService, ResolvedAddress, RouteEstimate, RoutingService,
};
use dispatch_types::GeoPoint;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub mod distance;
pub mod tariff;

use distance::{correction_coefficient, haversine_km, round_km};
use tariff::TariffTable;

/// How long a cached geocoder answer stays usable. Long enough to cover one
/// multi-stop dialog retyping the same address, short enough that a corrected
/// listing reaches customers the same evening.
const GEOCODE_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Hard bound on cached geocoder answers.
const GEOCODE_CACHE_MAX_ENTRIES: usize = 1024;

/// One cached geocoder answer and when it was stored.
struct CachedAnswer {
	answer: ResolvedAddress,
	stored_at: Instant,
}

impl CachedAnswer {
	fn is_fresh(&self, now: Instant) -> bool {
		now.duration_since(self.stored_at) < GEOCODE_CACHE_TTL
	}
}

/// Outcome of quoting a single stop.
#[derive(Debug, Clone, PartialEq)]
pub enum StopQuote {
	/// The stop was geocoded and priced.
	Priced {
		/// Distance from the anchor, rounded to one decimal.
		distance_km: f64,
		/// Tariff price for that distance.
		price: Decimal,
		/// Canonical address as the geocoder writes it.
		resolved_address: String,
		/// Coordinates of the stop.
		point: GeoPoint,
	},
	/// The geocoder could not place the address.
	Unresolved,
	/// The address resolved outside the configured service area.
	OutOfZone {
		/// The region the address actually resolved to.
		region: String,
	},
}

/// Quoting pipeline shared by order creation and order editing.
pub struct PricingPipeline {
	/// Geocoding gateway.
	geocoding: Arc<GeocodingService>,
	/// Routing gateway.
	routing: Arc<RoutingService>,
	/// Tariff ladder.
	tariffs: TariffTable,
	/// Service city and area.
	region: RegionConfig,
	/// Straight-line multiplier used when the router is unavailable.
	fallback_road_coefficient: f64,
	/// Lower bound of the correction curve's linear segment.
	correction_flat_below_km: f64,
	/// Upper bound of the correction curve's linear segment.
	correction_flat_above_km: f64,
	/// Correction coefficient past the linear segment.
	correction_max: f64,
	/// Recent geocoding answers keyed by the enriched query string. Entries
	/// expire after `GEOCODE_CACHE_TTL` and the map never exceeds
	/// `GEOCODE_CACHE_MAX_ENTRIES`.
	geocode_cache: DashMap<String, CachedAnswer>,
}

impl PricingPipeline {
	/// Creates a pipeline from validated configuration and wired gateways.
	pub fn new(
		geocoding: Arc<GeocodingService>,
		routing: Arc<RoutingService>,
		pricing: &PricingConfig,
		region: RegionConfig,
	) -> Self {
		Self {
			geocoding,
			routing,
			tariffs: TariffTable::from_config(pricing),
			region,
			fallback_road_coefficient: pricing.fallback_road_coefficient,
			correction_flat_below_km: pricing.correction_flat_below_km,
			correction_flat_above_km: pricing.correction_flat_above_km,
			correction_max: pricing.correction_max,
			geocode_cache: DashMap::new(),
		}
	}

	/// The lowest tariff price; manual price entry may not go below this.
	pub fn min_price(&self) -> Decimal {
		self.tariffs.min_price()
	}

	/// Resolves a free-form address without pricing it.
	///
	/// Used for shop pickup addresses, which anchor the first stop of every
	/// chain but are not priced themselves. Returns `None` when the geocoder
	/// misses or fails; callers treat the address as unplaced.
	pub async fn resolve_address(&self, raw_address: &str) -> Option<ResolvedAddress> {
		let query = enrich_with_city(&self.region.city, &normalize_address(raw_address));
		self.resolve_query(&query).await
	}

	/// Quotes one stop against its anchor point.
	pub async fn quote_stop(&self, anchor: &GeoPoint, raw_address: &str) -> StopQuote {
		let query = enrich_with_city(&self.region.city, &normalize_address(raw_address));

		let Some(resolved) = self.resolve_query(&query).await else {
			return StopQuote::Unresolved;
		};

		if let Some(region) = &resolved.region {
			if !region_matches(&self.region.area, region) && !region_matches(&self.region.city, region)
			{
				return StopQuote::OutOfZone {
					region: region.clone(),
				};
			}
		}

		let km = round_km(self.leg_distance(anchor, &resolved.point).await);
		StopQuote::Priced {
			distance_km: km,
			price: self.tariffs.price_for_distance(km),
			resolved_address: resolved.full_address,
			point: resolved.point,
		}
	}

	/// Prices a leg between two already-resolved points.
	///
	/// Used when an order chain is re-priced after an edit; the points are
	/// already known, only distances and prices change.
	pub async fn price_leg(&self, from: &GeoPoint, to: &GeoPoint) -> (f64, Decimal) {
		let km = round_km(self.leg_distance(from, to).await);
		(km, self.tariffs.price_for_distance(km))
	}

	/// Distance of one leg, preferring the router's answer.
	async fn leg_distance(&self, from: &GeoPoint, to: &GeoPoint) -> f64 {
		match self.routing.road_distance(from, to).await {
			Ok(RouteEstimate::Road(km)) => {
				km * correction_coefficient(
					km,
					self.correction_flat_below_km,
					self.correction_flat_above_km,
					self.correction_max,
				)
			},
			Ok(RouteEstimate::Unavailable) => {
				haversine_km(from, to) * self.fallback_road_coefficient
			},
			Err(e) => {
				warn!(error = %e, "routing gateway failed, using straight-line fallback");
				haversine_km(from, to) * self.fallback_road_coefficient
			},
		}
	}

	/// Cache-through geocoding of an already-enriched query.
	async fn resolve_query(&self, query: &str) -> Option<ResolvedAddress> {
		let now = Instant::now();
		if let Some(hit) = self.geocode_cache.get(query) {
			if hit.is_fresh(now) {
				return Some(hit.answer.clone());
			}
			// Stale; fall through and overwrite with a fresh answer.
		}

		match self.geocoding.resolve(query).await {
			Ok(GeoResolution::Resolved(resolved)) => {
				self.cache_answer(query, resolved.clone(), now);
				Some(resolved)
			},
			Ok(GeoResolution::Unresolved) => None,
			Err(e) => {
				// An unreachable geocoder reads the same as a miss to the
				// customer; the dialog asks them to retype the address.
				warn!(error = %e, "geocoding gateway failed");
				None
			},
		}
	}

	/// Stores one answer, evicting expired entries when the map is full.
	fn cache_answer(&self, query: &str, answer: ResolvedAddress, now: Instant) {
		if self.geocode_cache.len() >= GEOCODE_CACHE_MAX_ENTRIES {
			self.geocode_cache.retain(|_, entry| entry.is_fresh(now));
			if self.geocode_cache.len() >= GEOCODE_CACHE_MAX_ENTRIES {
				self.geocode_cache.clear();
			}
		}
		self.geocode_cache.insert(
			query.to_string(),
			CachedAnswer {
				answer,
				stored_at: now,
			},
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_gateway::implementations::mock::{MockGeocoding, MockRouting};
	use dispatch_gateway::{GeocodingInterface, RoutingInterface};
	use rust_decimal_macros::dec;
	use std::collections::HashMap;

	fn region() -> RegionConfig {
		RegionConfig {
			city: "Москва".to_string(),
			area: "Московская".to_string(),
		}
	}

	fn geocoding_service(mock: MockGeocoding) -> Arc<GeocodingService> {
		let mut implementations: HashMap<String, Arc<dyn GeocodingInterface>> = HashMap::new();
		implementations.insert("mock".to_string(), Arc::new(mock));
		Arc::new(GeocodingService::new(implementations, "mock".to_string()).unwrap())
	}

	fn routing_service(mock: MockRouting) -> Arc<RoutingService> {
		let mut implementations: HashMap<String, Arc<dyn RoutingInterface>> = HashMap::new();
		implementations.insert("mock".to_string(), Arc::new(mock));
		Arc::new(RoutingService::new(implementations, "mock".to_string()).unwrap())
	}

	fn resolved(lat: f64, lon: f64, region: &str) -> ResolvedAddress {
		ResolvedAddress {
			point: GeoPoint::new(lat, lon),
			full_address: "г Москва, ул Тверская, д 7".to_string(),
			city: Some("Москва".to_string()),
			region: Some(region.to_string()),
		}
	}

	fn pipeline(geocoder: MockGeocoding, router: MockRouting) -> PricingPipeline {
		PricingPipeline::new(
			geocoding_service(geocoder),
			routing_service(router),
			&PricingConfig::default(),
			region(),
		)
	}

	#[tokio::test]
	async fn test_quote_applies_correction_and_tariff() {
		let geocoder =
			MockGeocoding::new().with_default(resolved(55.76, 37.61, "Московская область"));
		let p = pipeline(geocoder, MockRouting::with_distance(8.4));

		let anchor = GeoPoint::new(55.70, 37.50);
		let quote = p.quote_stop(&anchor, "Tverskaya 7, apt 15").await;

		// 8.4 km road, corrected by the linear segment, lands at 9.4 km.
		match quote {
			StopQuote::Priced {
				distance_km, price, ..
			} => {
				assert_eq!(distance_km, 9.4);
				assert_eq!(price, dec!(850));
			},
			other => panic!("expected priced quote, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_quote_falls_back_to_straight_line() {
		// Destination one degree of latitude away, router down.
		let geocoder = MockGeocoding::new().with_default(resolved(56.70, 37.50, "Москва"));
		let p = pipeline(geocoder, MockRouting::unavailable());

		let anchor = GeoPoint::new(55.70, 37.50);
		let quote = p.quote_stop(&anchor, "Far street 1").await;

		match quote {
			StopQuote::Priced { distance_km, .. } => {
				// 111.19 km straight line, times the 1.6 fallback factor.
				assert!((distance_km - 177.9).abs() < 0.1, "got {}", distance_km);
			},
			other => panic!("expected priced quote, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_unresolved_address_is_an_outcome() {
		let p = pipeline(MockGeocoding::new(), MockRouting::with_distance(5.0));
		let anchor = GeoPoint::new(55.70, 37.50);
		assert_eq!(
			p.quote_stop(&anchor, "No such street 99").await,
			StopQuote::Unresolved
		);
	}

	#[tokio::test]
	async fn test_out_of_zone_address_is_rejected_with_region() {
		let geocoder = MockGeocoding::new().with_default(resolved(56.86, 35.90, "Тверская область"));
		let p = pipeline(geocoder, MockRouting::with_distance(5.0));

		let anchor = GeoPoint::new(55.70, 37.50);
		match p.quote_stop(&anchor, "Sovetskaya 1").await {
			StopQuote::OutOfZone { region } => assert_eq!(region, "Тверская область"),
			other => panic!("expected out-of-zone, got {:?}", other),
		}
	}

	#[test]
	fn test_cached_answer_expires_after_the_ttl() {
		let entry = CachedAnswer {
			answer: resolved(55.76, 37.61, "Москва"),
			stored_at: Instant::now(),
		};

		assert!(entry.is_fresh(entry.stored_at + GEOCODE_CACHE_TTL / 2));
		assert!(!entry.is_fresh(entry.stored_at + GEOCODE_CACHE_TTL * 2));
	}

	#[tokio::test]
	async fn test_geocode_cache_is_bounded() {
		let geocoder = MockGeocoding::new().with_default(resolved(55.76, 37.61, "Москва"));
		let p = pipeline(geocoder, MockRouting::with_distance(3.0));

		for i in 0..(GEOCODE_CACHE_MAX_ENTRIES + 200) {
			let hit = p.resolve_address(&format!("Tverskaya {}", i)).await;
			assert!(hit.is_some());
		}

		assert!(p.geocode_cache.len() <= GEOCODE_CACHE_MAX_ENTRIES);
	}

	#[tokio::test]
	async fn test_stale_cache_entry_is_replaced_by_a_fresh_answer() {
		let geocoder = MockGeocoding::new().with_default(resolved(55.80, 37.70, "Москва"));
		let p = pipeline(geocoder, MockRouting::with_distance(3.0));

		// Plant an expired answer pointing somewhere else entirely.
		let Some(past) = Instant::now().checked_sub(GEOCODE_CACHE_TTL * 2) else {
			// Monotonic clock too young to backdate; nothing to verify here.
			return;
		};
		let query = enrich_with_city(&p.region.city, "Tverskaya 7");
		p.geocode_cache.insert(
			query,
			CachedAnswer {
				answer: resolved(11.11, 22.22, "Москва"),
				stored_at: past,
			},
		);

		let hit = p.resolve_address("Tverskaya 7").await.unwrap();
		assert_eq!(hit.point.lat, 55.80);
	}

	#[tokio::test]
	async fn test_city_region_counts_as_in_zone() {
		// Federal-city addresses report the city itself as their region.
		let geocoder = MockGeocoding::new().with_default(resolved(55.76, 37.61, "г Москва"));
		let p = pipeline(geocoder, MockRouting::with_distance(3.0));

		let anchor = GeoPoint::new(55.70, 37.50);
		assert!(matches!(
			p.quote_stop(&anchor, "Tverskaya 7").await,
			StopQuote::Priced { .. }
		));
	}
}
