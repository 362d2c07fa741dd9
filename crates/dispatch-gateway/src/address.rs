//! Address query preparation and region matching.
//!
//! Customers type addresses with entrance and apartment details that confuse
//! geocoders ("Lenina 44, entrance 2, apt 15" resolves worse than "Lenina
//! 44"). Queries are stripped of those tokens before they go upstream, and
//! the geocoder's reported region is matched loosely against the configured
//! service area.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches entrance designators with their number, in Russian and English.
static ENTRANCE_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)[,\s]+(?:подъезд|подьезд|под\.?|п\.?|entrance|ent\.?)\s*№?\s*\d+\w*")
		.expect("entrance pattern is valid")
});

/// Matches apartment designators with their number, in Russian and English.
static APARTMENT_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)[,\s]+(?:квартира|кв\.?|к\.|apartment|apt\.?)\s*№?\s*\d+\w*")
		.expect("apartment pattern is valid")
});

/// Collapses runs of whitespace left behind by token removal.
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("space pattern is valid"));

/// Strips entrance and apartment tokens from a customer-typed address.
///
/// The removed details matter to the courier, not to the geocoder; the
/// original text is kept on the stop while this cleaned form becomes the
/// geocoding query.
pub fn normalize_address(raw: &str) -> String {
	let cleaned = ENTRANCE_RE.replace_all(raw, "");
	let cleaned = APARTMENT_RE.replace_all(&cleaned, "");
	let cleaned = SPACE_RE.replace_all(&cleaned, " ");
	cleaned.trim().trim_end_matches([',', ' ']).to_string()
}

/// Prefixes the service city onto a query that does not already mention it.
///
/// Bare street addresses resolve to the wrong city surprisingly often
/// without this.
pub fn enrich_with_city(city: &str, address: &str) -> String {
	if address.to_lowercase().contains(&city.to_lowercase()) {
		address.to_string()
	} else {
		format!("{}, {}", city, address)
	}
}

/// Loosely matches a geocoder-reported region against the configured
/// service area.
///
/// Both sides are lowercased and stripped of generic region suffixes, then
/// compared by containment in either direction, so "Московская область"
/// matches a configured area of "Московская" and vice versa.
pub fn region_matches(configured_area: &str, reported_region: &str) -> bool {
	let configured = strip_region_suffix(&configured_area.to_lowercase());
	let reported = strip_region_suffix(&reported_region.to_lowercase());
	if configured.is_empty() || reported.is_empty() {
		return false;
	}
	configured.contains(&reported) || reported.contains(&configured)
}

fn strip_region_suffix(value: &str) -> String {
	let trimmed = value.trim();
	for suffix in [" область", " обл.", " обл", " region", " oblast"] {
		if let Some(stripped) = trimmed.strip_suffix(suffix) {
			return stripped.trim().to_string();
		}
	}
	trimmed.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_strips_entrance_and_apartment() {
		assert_eq!(
			normalize_address("Lenina 44, entrance 2, apt 15"),
			"Lenina 44"
		);
	}

	#[test]
	fn test_normalize_strips_russian_tokens() {
		assert_eq!(
			normalize_address("ул. Ленина 44, подъезд 2, кв. 15"),
			"ул. Ленина 44"
		);
	}

	#[test]
	fn test_normalize_keeps_plain_address() {
		assert_eq!(normalize_address("Tverskaya 7"), "Tverskaya 7");
	}

	#[test]
	fn test_enrich_prepends_missing_city() {
		assert_eq!(enrich_with_city("Москва", "Tverskaya 7"), "Москва, Tverskaya 7");
		assert_eq!(
			enrich_with_city("Москва", "москва, Tverskaya 7"),
			"москва, Tverskaya 7"
		);
	}

	#[test]
	fn test_region_matches_ignores_suffix_and_case() {
		assert!(region_matches("Московская", "Московская область"));
		assert!(region_matches("московская область", "Московская"));
		assert!(!region_matches("Московская", "Тверская область"));
	}
}
