//! Distance-banded tariff ladder.
//!
//! The ladder maps a distance band upper bound to a flat price; a quote
//! takes the price of the smallest band that still covers the distance.
//! Beyond the last band the price extends in fixed-size distance blocks at
//! a fixed surcharge per block.

use dispatch_config::PricingConfig;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Tariff ladder with block extension beyond the last band.
#[derive(Debug, Clone)]
pub struct TariffTable {
	/// Band upper bound in whole kilometers to price.
	bands: BTreeMap<u32, Decimal>,
	/// Size of one extension block in kilometers.
	extension_block_km: u32,
	/// Surcharge per extension block.
	extension_block_price: Decimal,
}

impl TariffTable {
	/// Builds the table from validated pricing configuration.
	pub fn from_config(config: &PricingConfig) -> Self {
		let bands = config
			.tariffs
			.iter()
			.map(|entry| (entry.max_km, Decimal::from(entry.price)))
			.collect();

		Self {
			bands,
			extension_block_km: config.extension_block_km,
			extension_block_price: Decimal::from(config.extension_block_price),
		}
	}

	/// Price for a delivery leg of the given distance.
	pub fn price_for_distance(&self, km: f64) -> Decimal {
		let whole_km = km.max(0.0).ceil() as u32;

		if let Some((_, price)) = self.bands.range(whole_km..).next() {
			return *price;
		}

		// Past the last band: extend in fixed blocks. Ceiling division puts
		// any partial block at the full block surcharge.
		let (last_band, last_price) = match self.bands.iter().next_back() {
			Some((band, price)) => (*band, *price),
			None => return Decimal::ZERO,
		};
		let extra_km = whole_km - last_band;
		let blocks = extra_km.div_ceil(self.extension_block_km);
		last_price + self.extension_block_price * Decimal::from(blocks)
	}

	/// The lowest price on the ladder, used as the floor for manual prices.
	pub fn min_price(&self) -> Decimal {
		self.bands
			.iter()
			.next()
			.map(|(_, price)| *price)
			.unwrap_or(Decimal::ZERO)
	}
}
