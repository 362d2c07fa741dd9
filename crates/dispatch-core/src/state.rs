//! Order state machine implementation.
//!
//! Manages order state transitions with validation, ensuring orders move
//! through valid lifecycle states: New -> Accepted -> PickedUp -> Delivered.
//! Cancelled is only reachable before a claim; Returned is the side exit
//! from the claimed states.

use dispatch_storage::StorageService;
use dispatch_types::{Order, OrderStatus, StorageKey};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Time error: {0}")]
	TimeError(String),
}

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Updates an order with a closure and persists it
	pub async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<Order, OrderStateError>
	where
		F: FnOnce(&mut Order),
	{
		let mut order: Order = self
			.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		// Apply the update
		updater(&mut order);

		// Automatically set updated_at timestamp
		order.updated_at = current_timestamp()?;

		self.storage
			.update(StorageKey::Orders.as_str(), order_id, &order)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		Ok(order)
	}

	/// Transitions an order to a new status with validation
	pub async fn transition_order_status(
		&self,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Order, OrderStateError> {
		let order: Order = self
			.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		// Validate state transition
		if !Self::is_valid_transition(&order.status, &new_status) {
			return Err(OrderStateError::InvalidTransition {
				from: order.status,
				to: new_status,
			});
		}

		self.update_order_with(order_id, |o| {
			o.status = new_status;
		})
		.await
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: &OrderStatus, to: &OrderStatus) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				OrderStatus::New,
				HashSet::from([OrderStatus::Accepted, OrderStatus::Cancelled]),
			);
			m.insert(
				OrderStatus::Accepted,
				HashSet::from([OrderStatus::PickedUp, OrderStatus::Returned]),
			);
			m.insert(
				OrderStatus::PickedUp,
				HashSet::from([OrderStatus::Delivered, OrderStatus::Returned]),
			);
			m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
			m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
			m.insert(OrderStatus::Returned, HashSet::new()); // terminal
			m
		});

		TRANSITIONS.get(from).is_some_and(|set| set.contains(to))
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderStateError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}

	/// Stores a new order
	pub async fn store_order(&self, order: &Order) -> Result<(), OrderStateError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}
}

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> Result<u64, OrderStateError> {
	Ok(SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_err(|e| OrderStateError::TimeError(e.to_string()))?
		.as_secs())
}
