//! Geographic primitives shared across gateways and pricing.

use serde::{Deserialize, Serialize};

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	/// Latitude in decimal degrees.
	pub lat: f64,
	/// Longitude in decimal degrees.
	pub lon: f64,
}

impl GeoPoint {
	pub fn new(lat: f64, lon: f64) -> Self {
		Self { lat, lon }
	}
}

impl std::fmt::Display for GeoPoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{:.6},{:.6}]", self.lat, self.lon)
	}
}
