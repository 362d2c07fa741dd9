//! Order aggregate types for the dispatch service.
//!
//! An order is the durable unit of work a shop creates and a courier claims.
//! It always carries at least one delivery stop; multi-stop orders chain each
//! stop's pricing anchor off the previous stop's resolved coordinates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GeoPoint;

/// Stable numeric identity of a chat user.
pub type UserId = i64;

/// One delivery leg of an order.
///
/// Stop numbers are 1-based and contiguous. Stop 1 is priced from the shop's
/// pickup location; stop N>1 is priced from stop N-1's resolved coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
	/// 1-based ordinal position within the order.
	pub number: u32,
	/// Recipient name for this leg.
	pub recipient_name: String,
	/// Recipient phone for this leg.
	pub recipient_phone: String,
	/// Address text as entered by the shop.
	pub address: String,
	/// Full address string returned by the geocoder, when resolution succeeded.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolved_address: Option<String>,
	/// Resolved coordinates, when geocoding succeeded and the address was in zone.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub point: Option<GeoPoint>,
	/// Road distance from this stop's anchor, rounded to one decimal.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub distance_km: Option<f64>,
	/// Delivery price for this leg.
	pub price: Decimal,
	/// Free-text courier note for this leg.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	/// Delivery progress of this leg.
	pub status: StopStatus,
}

/// Delivery progress of a single stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopStatus {
	/// Not yet delivered.
	Pending,
	/// Handed over to the recipient.
	Delivered,
}

/// The durable order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// The shop that created the order.
	pub shop_id: String,
	/// Delivery stops in visiting order. Never empty.
	pub stops: Vec<Stop>,
	/// Single calendar date shared by all stops.
	pub delivery_date: NaiveDate,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Courier bound by a successful claim.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub courier_id: Option<String>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Sum of all stop prices.
	pub fn total_price(&self) -> Decimal {
		self.stops.iter().map(|s| s.price).sum()
	}

	/// Derived, never stored: more than one stop.
	pub fn is_multi_stop(&self) -> bool {
		self.stops.len() > 1
	}

	/// True once every stop has been delivered.
	pub fn all_stops_delivered(&self) -> bool {
		self.stops.iter().all(|s| s.status == StopStatus::Delivered)
	}
}

/// Status of an order in the delivery lifecycle.
///
/// The happy path is New -> Accepted -> PickedUp -> Delivered. Cancelled is
/// only reachable from New; Returned is a side exit from the claimed states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
	/// Created by a shop, visible to couriers, not yet claimed.
	New,
	/// Claimed by a courier.
	Accepted,
	/// Courier has collected the goods from the shop.
	PickedUp,
	/// Every stop has been delivered.
	Delivered,
	/// Cancelled by the shop before any claim.
	Cancelled,
	/// Returned to the shop after a claim.
	Returned,
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::New => write!(f, "New"),
			OrderStatus::Accepted => write!(f, "Accepted"),
			OrderStatus::PickedUp => write!(f, "PickedUp"),
			OrderStatus::Delivered => write!(f, "Delivered"),
			OrderStatus::Cancelled => write!(f, "Cancelled"),
			OrderStatus::Returned => write!(f, "Returned"),
		}
	}
}
