//! Shop and courier records.

use serde::{Deserialize, Serialize};

use crate::{GeoPoint, UserId};

/// A shop that creates delivery orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
	/// Unique identifier for this shop.
	pub id: String,
	/// Chat identity of the owner.
	pub owner: UserId,
	/// Display name of the shop.
	pub name: String,
	/// Contact phone collected at registration.
	pub phone: String,
	/// Pickup address text.
	pub pickup_address: String,
	/// Pickup coordinates; geocoded lazily on first pricing use.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub point: Option<GeoPoint>,
	/// Admin activation flag. Inactive shops cannot create orders.
	pub active: bool,
	/// Timestamp when this shop was registered.
	pub created_at: u64,
}

/// A courier that claims and delivers orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
	/// Unique identifier for this courier.
	pub id: String,
	/// Chat identity of the courier.
	pub user: UserId,
	/// Full legal name.
	pub full_name: String,
	/// Contact phone collected via a shared-contact attachment.
	pub phone: String,
	/// File id of the identity-document selfie.
	pub id_photo_file: String,
	/// Review status.
	pub status: CourierStatus,
	/// Admin activation flag. Inactive couriers cannot claim orders.
	pub active: bool,
	/// Timestamp when this courier was registered.
	pub created_at: u64,
}

/// Review status of a courier profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CourierStatus {
	/// Registered, awaiting admin approval.
	Pending,
	/// Approved and allowed to claim orders.
	Active,
	/// Blocked by an admin.
	Blocked,
}
