//! Shop registration and lookup.
//!
//! One shop per chat user, keyed by the owner's user id. New shops start
//! inactive and are switched on by an operator out of band. The pickup
//! address is geocoded lazily: registration accepts it as text, and the
//! coordinates are filled in the first time an order needs them.

use crate::state::current_timestamp;
use dispatch_pricing::PricingPipeline;
use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{Shop, StorageKey, UserId};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors that can occur in the shop service.
#[derive(Debug, Error)]
pub enum ShopServiceError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Time error: {0}")]
	Time(String),
}

impl From<StorageError> for ShopServiceError {
	fn from(e: StorageError) -> Self {
		ShopServiceError::Storage(e.to_string())
	}
}

/// Service owning shop records.
pub struct ShopService {
	storage: Arc<StorageService>,
	pricing: Arc<PricingPipeline>,
}

impl ShopService {
	pub fn new(storage: Arc<StorageService>, pricing: Arc<PricingPipeline>) -> Self {
		Self { storage, pricing }
	}

	/// Registers a shop for a chat user, replacing any previous profile.
	pub async fn register(
		&self,
		owner: UserId,
		name: String,
		phone: String,
		pickup_address: String,
	) -> Result<Shop, ShopServiceError> {
		let shop = Shop {
			id: Uuid::new_v4().to_string(),
			owner,
			name,
			phone,
			pickup_address,
			point: None,
			active: false,
			created_at: current_timestamp().map_err(|e| ShopServiceError::Time(e.to_string()))?,
		};

		self.storage
			.store(StorageKey::Shops.as_str(), &owner.to_string(), &shop)
			.await?;
		info!(shop_id = %shop.id, owner = owner, "shop registered, awaiting activation");
		Ok(shop)
	}

	/// Looks up the shop owned by a chat user.
	pub async fn shop_for_owner(&self, owner: UserId) -> Result<Option<Shop>, ShopServiceError> {
		match self
			.storage
			.retrieve::<Shop>(StorageKey::Shops.as_str(), &owner.to_string())
			.await
		{
			Ok(shop) => Ok(Some(shop)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Ensures the shop's pickup coordinates are resolved, geocoding and
	/// persisting them on first use.
	///
	/// Returns the updated shop, or `None` when the pickup address cannot
	/// be geocoded; orders cannot be priced for such a shop until its
	/// address is corrected.
	pub async fn ensure_pickup_point(&self, shop: &Shop) -> Result<Option<Shop>, ShopServiceError> {
		if shop.point.is_some() {
			return Ok(Some(shop.clone()));
		}

		let Some(resolved) = self.pricing.resolve_address(&shop.pickup_address).await else {
			return Ok(None);
		};

		let mut updated = shop.clone();
		updated.point = Some(resolved.point);
		self.storage
			.update(StorageKey::Shops.as_str(), &shop.owner.to_string(), &updated)
			.await?;
		info!(shop_id = %shop.id, point = %resolved.point, "pickup address geocoded");
		Ok(Some(updated))
	}
}
