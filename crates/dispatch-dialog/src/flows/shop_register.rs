//! Shop registration flow.
//!
//! Collects the shop name, the pickup address, and a shared-contact
//! attachment for the phone number, then persists an inactive shop profile
//! for an operator to approve. Plain text while the contact attachment is
//! awaited is rejected with a re-prompt; it is never treated as the phone.

use super::char_len;
use crate::DialogError;
use dispatch_core::ShopService;
use dispatch_types::{EventKind, Reply, UserId};
use std::sync::Arc;
use tracing::warn;

/// Steps of the shop registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopStep {
	Name,
	PickupAddress,
	AwaitContact,
}

/// Accumulated state of one shop registration.
#[derive(Debug, Clone)]
pub struct ShopRegisterFlow {
	pub step: ShopStep,
	pub name: Option<String>,
	pub pickup_address: Option<String>,
}

/// Handler driving the shop registration flow.
pub struct ShopRegisterHandler {
	shops: Arc<ShopService>,
}

impl ShopRegisterHandler {
	pub fn new(shops: Arc<ShopService>) -> Self {
		Self { shops }
	}

	/// Starts a fresh registration.
	pub fn start(&self) -> (ShopRegisterFlow, Vec<Reply>) {
		(
			ShopRegisterFlow {
				step: ShopStep::Name,
				name: None,
				pickup_address: None,
			},
			vec![Reply::text("What is your shop called? (2-255 characters)")],
		)
	}

	/// Feeds one event into the flow.
	pub async fn handle(
		&self,
		user: UserId,
		mut flow: ShopRegisterFlow,
		event: &EventKind,
	) -> Result<(Option<ShopRegisterFlow>, Vec<Reply>), DialogError> {
		match flow.step {
			ShopStep::Name => match event {
				EventKind::Text(text) if (2..=255).contains(&char_len(text)) => {
					flow.name = Some(text.trim().to_string());
					flow.step = ShopStep::PickupAddress;
					Ok((
						Some(flow),
						vec![Reply::text(
							"Where do couriers pick up orders? Enter the pickup address (5-500 characters).",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please enter a shop name, 2 to 255 characters.")],
				)),
			},
			ShopStep::PickupAddress => match event {
				EventKind::Text(text) if (5..=500).contains(&char_len(text)) => {
					flow.pickup_address = Some(text.trim().to_string());
					flow.step = ShopStep::AwaitContact;
					Ok((
						Some(flow),
						vec![Reply::text(
							"Now share your contact (the attach button), so we have a phone number on file.",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text(
						"Please enter the pickup address, 5 to 500 characters.",
					)],
				)),
			},
			ShopStep::AwaitContact => match event {
				EventKind::Contact { phone } => {
					let (Some(name), Some(pickup_address)) =
						(flow.name.clone(), flow.pickup_address.clone())
					else {
						// A later step ran without its fields; reset rather
						// than persist a half-filled profile.
						warn!(user = user, "shop registration lost its fields, resetting");
						return Ok((
							None,
							vec![Reply::text("Something went wrong, please start over.")],
						));
					};

					let shop = self
						.shops
						.register(user, name, phone.clone(), pickup_address)
						.await
						.map_err(|e| DialogError::Service(e.to_string()))?;
					Ok((
						None,
						vec![Reply::text(format!(
							"Shop \"{}\" registered. You will be able to create orders once an operator activates it.",
							shop.name
						))],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text(
						"Please use the contact attachment to share your phone number.",
					)],
				)),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_config::{PricingConfig, RegionConfig};
	use dispatch_gateway::implementations::mock::{MockGeocoding, MockRouting};
	use dispatch_gateway::{GeocodingInterface, GeocodingService, RoutingInterface, RoutingService};
	use dispatch_pricing::PricingPipeline;
	use dispatch_storage::{implementations::memory::MemoryStorage, StorageService};
	use std::collections::HashMap;

	fn handler() -> ShopRegisterHandler {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let mut geocoders: HashMap<String, Arc<dyn GeocodingInterface>> = HashMap::new();
		geocoders.insert("mock".to_string(), Arc::new(MockGeocoding::new()));
		let mut routers: HashMap<String, Arc<dyn RoutingInterface>> = HashMap::new();
		routers.insert("mock".to_string(), Arc::new(MockRouting::unavailable()));
		let pricing = Arc::new(PricingPipeline::new(
			Arc::new(GeocodingService::new(geocoders, "mock".to_string()).unwrap()),
			Arc::new(RoutingService::new(routers, "mock".to_string()).unwrap()),
			&PricingConfig::default(),
			RegionConfig {
				city: "Москва".to_string(),
				area: "Московская".to_string(),
			},
		));
		ShopRegisterHandler::new(Arc::new(ShopService::new(storage, pricing)))
	}

	#[tokio::test]
	async fn test_happy_path_persists_on_contact() {
		let h = handler();
		let (flow, _) = h.start();

		let (flow, _) = h
			.handle(1, flow, &EventKind::Text("Blooms".to_string()))
			.await
			.unwrap();
		let (flow, _) = h
			.handle(1, flow.unwrap(), &EventKind::Text("Tverskaya 7, Moscow".to_string()))
			.await
			.unwrap();
		let (flow, replies) = h
			.handle(
				1,
				flow.unwrap(),
				&EventKind::Contact {
					phone: "+79990000000".to_string(),
				},
			)
			.await
			.unwrap();

		assert!(flow.is_none());
		assert!(matches!(&replies[0], Reply::Text(t) if t.contains("Blooms")));
	}

	#[tokio::test]
	async fn test_short_name_reprompts_without_advancing() {
		let h = handler();
		let (flow, _) = h.start();
		let (flow, replies) = h
			.handle(1, flow, &EventKind::Text("B".to_string()))
			.await
			.unwrap();

		let flow = flow.unwrap();
		assert_eq!(flow.step, ShopStep::Name);
		assert!(flow.name.is_none());
		assert_eq!(replies.len(), 1);
	}

	#[tokio::test]
	async fn test_text_is_not_accepted_as_contact() {
		let h = handler();
		let (flow, _) = h.start();
		let (flow, _) = h
			.handle(1, flow, &EventKind::Text("Blooms".to_string()))
			.await
			.unwrap();
		let (flow, _) = h
			.handle(1, flow.unwrap(), &EventKind::Text("Tverskaya 7, Moscow".to_string()))
			.await
			.unwrap();
		let (flow, _) = h
			.handle(1, flow.unwrap(), &EventKind::Text("+79990000000".to_string()))
			.await
			.unwrap();

		// Still waiting for the attachment.
		assert_eq!(flow.unwrap().step, ShopStep::AwaitContact);
	}
}
