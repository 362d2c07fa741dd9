//! Per-user dialog session store.
//!
//! Each chat user has at most one active flow. The store is a concurrent
//! map with per-key atomicity; distinct users never contend beyond the
//! map's own sharding, and no lock is held across an await point. Starting
//! a new flow replaces whatever flow was active before, so a half-finished
//! registration cannot silently corrupt an order dialog.

use crate::flows::{
	courier_register::CourierRegisterFlow, order_create::OrderCreateFlow,
	order_edit::OrderEditFlow, shop_register::ShopRegisterFlow,
};
use dashmap::DashMap;
use dispatch_types::UserId;

/// The active dialog flow of one user.
#[derive(Debug, Clone)]
pub enum Flow {
	OrderCreate(OrderCreateFlow),
	OrderEdit(OrderEditFlow),
	ShopRegister(ShopRegisterFlow),
	CourierRegister(CourierRegisterFlow),
}

/// Concurrent map from user identity to active flow.
#[derive(Default)]
pub struct SessionStore {
	sessions: DashMap<UserId, Flow>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self {
			sessions: DashMap::new(),
		}
	}

	/// Returns a snapshot of the user's active flow, if any.
	pub fn get(&self, user: UserId) -> Option<Flow> {
		self.sessions.get(&user).map(|entry| entry.clone())
	}

	/// Sets the user's active flow, replacing any previous one.
	pub fn set(&self, user: UserId, flow: Flow) {
		self.sessions.insert(user, flow);
	}

	/// Clears the user's active flow.
	pub fn clear(&self, user: UserId) {
		self.sessions.remove(&user);
	}

	/// Whether the user currently has an active flow.
	pub fn is_active(&self, user: UserId) -> bool {
		self.sessions.contains_key(&user)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::flows::shop_register::{ShopRegisterFlow, ShopStep};

	fn shop_flow() -> Flow {
		Flow::ShopRegister(ShopRegisterFlow {
			step: ShopStep::Name,
			name: None,
			pickup_address: None,
		})
	}

	fn courier_flow() -> Flow {
		Flow::CourierRegister(crate::flows::courier_register::CourierRegisterFlow {
			step: crate::flows::courier_register::CourierStep::Name,
			full_name: None,
			phone: None,
		})
	}

	#[test]
	fn test_one_flow_per_user() {
		let store = SessionStore::new();
		store.set(1, shop_flow());
		store.set(1, courier_flow());

		assert!(matches!(store.get(1), Some(Flow::CourierRegister(_))));
	}

	#[test]
	fn test_clear_removes_the_flow() {
		let store = SessionStore::new();
		store.set(1, shop_flow());
		store.clear(1);
		assert!(store.get(1).is_none());
		assert!(!store.is_active(1));
	}

	#[test]
	fn test_users_do_not_interfere() {
		let store = SessionStore::new();
		store.set(1, shop_flow());
		store.set(2, courier_flow());
		store.clear(1);

		assert!(store.get(1).is_none());
		assert!(matches!(store.get(2), Some(Flow::CourierRegister(_))));
	}
}
