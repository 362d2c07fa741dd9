//! Distance math for delivery quoting.
//!
//! Road distances come from the routing gateway; when it cannot answer, the
//! fallback is a straight-line estimate scaled up to approximate city
//! driving. Both paths feed the same tariff lookup.

use dispatch_types::GeoPoint;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
	let lat1 = a.lat.to_radians();
	let lat2 = b.lat.to_radians();
	let dlat = (b.lat - a.lat).to_radians();
	let dlon = (b.lon - a.lon).to_radians();

	let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
	2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Correction applied to router-reported distances.
///
/// Short urban routes come back close to reality, longer ones
/// systematically short. The coefficient is flat at 1.0 up to
/// `flat_below_km`, flat at `max` beyond `flat_above_km`, and linear in
/// between.
pub fn correction_coefficient(km: f64, flat_below_km: f64, flat_above_km: f64, max: f64) -> f64 {
	if km <= flat_below_km {
		1.0
	} else if km >= flat_above_km {
		max
	} else {
		1.0 + (max - 1.0) * (km - flat_below_km) / (flat_above_km - flat_below_km)
	}
}

/// Rounds a distance to one decimal place for display and tariff lookup.
pub fn round_km(km: f64) -> f64 {
	(km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_haversine_one_degree_of_latitude() {
		let a = GeoPoint::new(55.0, 37.0);
		let b = GeoPoint::new(56.0, 37.0);
		let km = haversine_km(&a, &b);
		// One degree of latitude on a 6371 km sphere.
		assert!((km - 111.19).abs() < 0.01, "got {}", km);
	}

	#[test]
	fn test_haversine_zero_for_same_point() {
		let p = GeoPoint::new(55.7558, 37.6173);
		assert_eq!(haversine_km(&p, &p), 0.0);
	}

	#[test]
	fn test_correction_is_flat_then_linear_then_capped() {
		assert_eq!(correction_coefficient(4.6, 5.0, 12.0, 1.24), 1.0);
		assert_eq!(correction_coefficient(5.0, 5.0, 12.0, 1.24), 1.0);
		let mid = correction_coefficient(8.5, 5.0, 12.0, 1.24);
		assert!((mid - 1.12).abs() < 1e-9, "got {}", mid);
		assert_eq!(correction_coefficient(12.0, 5.0, 12.0, 1.24), 1.24);
		assert_eq!(correction_coefficient(25.0, 5.0, 12.0, 1.24), 1.24);
	}

	#[test]
	fn test_round_km() {
		assert_eq!(round_km(9.3792), 9.4);
		assert_eq!(round_km(9.34), 9.3);
	}
}
