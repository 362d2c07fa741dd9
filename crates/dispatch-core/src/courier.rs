//! Courier registration and lookup.
//!
//! One courier profile per chat user, keyed by user id. Registration
//! collects the full name, a shared contact for the phone number, and an
//! identity-document photo; the profile then waits for operator approval
//! before the courier may claim anything.

use crate::state::current_timestamp;
use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{Courier, CourierStatus, StorageKey, UserId};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors that can occur in the courier service.
#[derive(Debug, Error)]
pub enum CourierServiceError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Time error: {0}")]
	Time(String),
}

impl From<StorageError> for CourierServiceError {
	fn from(e: StorageError) -> Self {
		CourierServiceError::Storage(e.to_string())
	}
}

/// Service owning courier records.
pub struct CourierService {
	storage: Arc<StorageService>,
}

impl CourierService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Registers a courier profile for a chat user, replacing any previous
	/// one.
	pub async fn register(
		&self,
		user: UserId,
		full_name: String,
		phone: String,
		id_photo_file: String,
	) -> Result<Courier, CourierServiceError> {
		let courier = Courier {
			id: Uuid::new_v4().to_string(),
			user,
			full_name,
			phone,
			id_photo_file,
			status: CourierStatus::Pending,
			active: false,
			created_at: current_timestamp().map_err(|e| CourierServiceError::Time(e.to_string()))?,
		};

		self.storage
			.store(StorageKey::Couriers.as_str(), &user.to_string(), &courier)
			.await?;
		info!(courier_id = %courier.id, user = user, "courier registered, awaiting approval");
		Ok(courier)
	}

	/// Looks up the courier profile of a chat user.
	pub async fn courier_for_user(
		&self,
		user: UserId,
	) -> Result<Option<Courier>, CourierServiceError> {
		match self
			.storage
			.retrieve::<Courier>(StorageKey::Couriers.as_str(), &user.to_string())
			.await
		{
			Ok(courier) => Ok(Some(courier)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Approves a pending courier, allowing claims.
	pub async fn approve(&self, user: UserId) -> Result<Option<Courier>, CourierServiceError> {
		let Some(mut courier) = self.courier_for_user(user).await? else {
			return Ok(None);
		};
		courier.status = CourierStatus::Active;
		courier.active = true;
		self.storage
			.update(StorageKey::Couriers.as_str(), &user.to_string(), &courier)
			.await?;
		info!(courier_id = %courier.id, "courier approved");
		Ok(Some(courier))
	}

	/// Blocks a courier, preventing further claims.
	pub async fn block(&self, user: UserId) -> Result<Option<Courier>, CourierServiceError> {
		let Some(mut courier) = self.courier_for_user(user).await? else {
			return Ok(None);
		};
		courier.status = CourierStatus::Blocked;
		courier.active = false;
		self.storage
			.update(StorageKey::Couriers.as_str(), &user.to_string(), &courier)
			.await?;
		info!(courier_id = %courier.id, "courier blocked");
		Ok(Some(courier))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_storage::implementations::memory::MemoryStorage;

	fn service() -> CourierService {
		CourierService::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_registration_starts_pending_and_inactive() {
		let svc = service();
		let courier = svc
			.register(
				200,
				"Ivan Petrov".to_string(),
				"+79991111111".to_string(),
				"file-1".to_string(),
			)
			.await
			.unwrap();

		assert_eq!(courier.status, CourierStatus::Pending);
		assert!(!courier.active);
		assert!(svc.courier_for_user(200).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_approve_then_block() {
		let svc = service();
		svc.register(
			200,
			"Ivan Petrov".to_string(),
			"+79991111111".to_string(),
			"file-1".to_string(),
		)
		.await
		.unwrap();

		let approved = svc.approve(200).await.unwrap().unwrap();
		assert_eq!(approved.status, CourierStatus::Active);
		assert!(approved.active);

		let blocked = svc.block(200).await.unwrap().unwrap();
		assert_eq!(blocked.status, CourierStatus::Blocked);
		assert!(!blocked.active);

		assert!(svc.approve(999).await.unwrap().is_none());
	}
}
