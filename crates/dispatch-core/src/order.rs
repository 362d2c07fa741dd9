//! Order lifecycle service.
//!
//! Creation, the courier claim protocol, delivery progress, and shop-side
//! edits. The claim path is the concurrency-sensitive one: many couriers
//! race for the same order, and exactly one may win. The race is settled by
//! a single compare-and-swap against the order bytes the claimer read;
//! anything that changed the order in between makes the swap fail and the
//! claim report the order as no longer available.

use crate::state::{current_timestamp, OrderStateMachine};
use dispatch_pricing::{PricingPipeline, StopQuote};
use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{
	Courier, CourierStatus, Order, OrderStatus, Shop, Stop, StopStatus, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors that can occur in the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Order has no stops")]
	EmptyOrder,
	#[error("State error: {0}")]
	State(#[from] crate::state::OrderStateError),
}

impl From<StorageError> for OrderServiceError {
	fn from(e: StorageError) -> Self {
		OrderServiceError::Storage(e.to_string())
	}
}

/// Outcome of a courier's attempt to claim an order.
#[derive(Debug)]
pub enum ClaimOutcome {
	/// The claim won; the order is now bound to the courier.
	Claimed(Order),
	/// The order was claimed, cancelled, or otherwise changed first.
	NoLongerAvailable,
	/// The courier is not approved or has been deactivated.
	CourierInactive,
	/// The courier already carries the maximum number of active orders.
	CapExceeded,
	/// No such order.
	NotFound,
}

/// Outcome of a shop's attempt to cancel an order.
#[derive(Debug)]
pub enum CancelOutcome {
	/// The order was cancelled.
	Cancelled,
	/// The order is past the point of cancellation or not owned by the shop.
	NotCancellable,
	/// No such order.
	NotFound,
}

/// Outcome of a courier progress action (pickup, return).
#[derive(Debug)]
pub enum ProgressOutcome {
	/// The order moved to the requested state.
	Updated(Order),
	/// No such order.
	NotFound,
	/// The order is not assigned to this courier.
	NotAssigned,
	/// The order is not in a state that allows this action.
	WrongPhase,
}

/// Outcome of marking a stop delivered.
#[derive(Debug)]
pub enum DeliveryOutcome {
	/// The stop was marked; other stops remain.
	StopDelivered(Order),
	/// The stop was marked and it was the last one; the order is delivered.
	Completed(Order),
	/// No such order or stop.
	NotFound,
	/// The order is not assigned to this courier.
	NotAssigned,
	/// The order has not been picked up yet, or is already finished.
	WrongPhase,
}

/// Outcome of a shop-side edit.
#[derive(Debug)]
pub enum EditOutcome {
	/// The edit was applied; the returned order reflects it.
	Updated(Order),
	/// The new address did not geocode inside the service area. The address
	/// text was updated; coordinates, distances, and prices were left
	/// untouched. `region` is set when the address resolved out of zone.
	AddressKeptUnpriced {
		order: Order,
		region: Option<String>,
	},
	/// No such order or stop.
	NotFound,
	/// Orders can only be edited before a courier claims them, and only by
	/// the shop that created them.
	NotEditable,
}

/// Service owning order creation, claiming, progress, and edits.
pub struct OrderService {
	storage: Arc<StorageService>,
	state: OrderStateMachine,
	pricing: Arc<PricingPipeline>,
	courier_active_cap: usize,
}

impl OrderService {
	pub fn new(
		storage: Arc<StorageService>,
		pricing: Arc<PricingPipeline>,
		courier_active_cap: usize,
	) -> Self {
		Self {
			state: OrderStateMachine::new(storage.clone()),
			storage,
			pricing,
			courier_active_cap,
		}
	}

	/// Creates a new order from fully-collected stops.
	///
	/// Stops are renumbered in visiting order; the dialog layer has already
	/// priced them.
	pub async fn create_order(
		&self,
		shop: &Shop,
		delivery_date: chrono::NaiveDate,
		mut stops: Vec<Stop>,
	) -> Result<Order, OrderServiceError> {
		if stops.is_empty() {
			return Err(OrderServiceError::EmptyOrder);
		}
		for (i, stop) in stops.iter_mut().enumerate() {
			stop.number = (i + 1) as u32;
		}

		let now = current_timestamp()?;
		let order = Order {
			id: Uuid::new_v4().to_string(),
			shop_id: shop.id.clone(),
			stops,
			delivery_date,
			status: OrderStatus::New,
			courier_id: None,
			created_at: now,
			updated_at: now,
		};

		self.state.store_order(&order).await?;
		info!(order_id = %order.id, shop_id = %shop.id, stops = order.stops.len(), "order created");
		Ok(order)
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderServiceError> {
		match self
			.storage
			.retrieve::<Order>(StorageKey::Orders.as_str(), order_id)
			.await
		{
			Ok(order) => Ok(Some(order)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Orders visible to couriers: unclaimed, oldest first.
	pub async fn available_orders(&self) -> Result<Vec<Order>, OrderServiceError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await?;
		orders.retain(|o| o.status == OrderStatus::New);
		orders.sort_by_key(|o| o.created_at);
		Ok(orders)
	}

	/// All orders created by a shop, newest first.
	pub async fn orders_for_shop(&self, shop_id: &str) -> Result<Vec<Order>, OrderServiceError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await?;
		orders.retain(|o| o.shop_id == shop_id);
		orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
		Ok(orders)
	}

	/// Orders a courier has claimed and not yet finished.
	pub async fn active_orders_for_courier(
		&self,
		courier_id: &str,
	) -> Result<Vec<Order>, OrderServiceError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await?;
		orders.retain(|o| {
			o.courier_id.as_deref() == Some(courier_id)
				&& matches!(o.status, OrderStatus::Accepted | OrderStatus::PickedUp)
		});
		orders.sort_by_key(|o| o.created_at);
		Ok(orders)
	}

	/// Attempts to claim an order for a courier.
	///
	/// Eligibility (approval, active-order cap) is checked first; the claim
	/// itself is one compare-and-swap against the exact record that was
	/// read. The cap is re-verified after the swap lands: two claims by the
	/// same courier on different orders can both pass the read-side check,
	/// so an over-cap winner releases its order again and reports
	/// `CapExceeded`. No retry on a lost race: the order is gone, and the
	/// courier should pick another one.
	pub async fn claim(
		&self,
		order_id: &str,
		courier: &Courier,
	) -> Result<ClaimOutcome, OrderServiceError> {
		if !courier.active || courier.status != CourierStatus::Active {
			return Ok(ClaimOutcome::CourierInactive);
		}

		let active = self.active_orders_for_courier(&courier.id).await?;
		if active.len() >= self.courier_active_cap {
			return Ok(ClaimOutcome::CapExceeded);
		}

		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(ClaimOutcome::NotFound),
		};
		if current.status != OrderStatus::New {
			return Ok(ClaimOutcome::NoLongerAvailable);
		}

		let mut claimed = current.clone();
		claimed.status = OrderStatus::Accepted;
		claimed.courier_id = Some(courier.id.clone());
		claimed.updated_at = current_timestamp()?;

		match self
			.storage
			.compare_and_swap(StorageKey::Orders.as_str(), order_id, &current, &claimed)
			.await
		{
			Ok(true) => {
				let active = self.active_orders_for_courier(&courier.id).await?;
				if active.len() > self.courier_active_cap {
					self.release_over_cap_claim(order_id, &claimed).await?;
					return Ok(ClaimOutcome::CapExceeded);
				}
				info!(order_id = %order_id, courier_id = %courier.id, "order claimed");
				Ok(ClaimOutcome::Claimed(claimed))
			},
			Ok(false) => Ok(ClaimOutcome::NoLongerAvailable),
			Err(StorageError::NotFound) => Ok(ClaimOutcome::NoLongerAvailable),
			Err(e) => Err(e.into()),
		}
	}

	/// Puts a just-claimed order back on the market.
	///
	/// Every claim that observes itself over the cap releases, so the cap
	/// holds no matter how the racing recounts interleave; the courier is
	/// told to finish an order first either way.
	async fn release_over_cap_claim(
		&self,
		order_id: &str,
		claimed: &Order,
	) -> Result<(), OrderServiceError> {
		let mut released = claimed.clone();
		released.status = OrderStatus::New;
		released.courier_id = None;
		released.updated_at = current_timestamp()?;

		match self
			.storage
			.compare_and_swap(StorageKey::Orders.as_str(), order_id, claimed, &released)
			.await
		{
			Ok(true) => {
				warn!(order_id = %order_id, "claim released, courier over active cap");
				Ok(())
			},
			// The order moved on since our swap (only this courier could
			// have progressed it); leave it alone.
			Ok(false) | Err(StorageError::NotFound) => Ok(()),
			Err(e) => Err(e.into()),
		}
	}

	/// Cancels an unclaimed order.
	///
	/// Uses the same compare-and-swap as claiming, so a cancellation racing
	/// a claim resolves cleanly in one direction or the other.
	pub async fn cancel(
		&self,
		order_id: &str,
		shop: &Shop,
	) -> Result<CancelOutcome, OrderServiceError> {
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(CancelOutcome::NotFound),
		};
		if current.shop_id != shop.id || current.status != OrderStatus::New {
			return Ok(CancelOutcome::NotCancellable);
		}

		let mut cancelled = current.clone();
		cancelled.status = OrderStatus::Cancelled;
		cancelled.updated_at = current_timestamp()?;

		match self
			.storage
			.compare_and_swap(StorageKey::Orders.as_str(), order_id, &current, &cancelled)
			.await
		{
			Ok(true) => {
				info!(order_id = %order_id, "order cancelled");
				Ok(CancelOutcome::Cancelled)
			},
			Ok(false) => Ok(CancelOutcome::NotCancellable),
			Err(StorageError::NotFound) => Ok(CancelOutcome::NotFound),
			Err(e) => Err(e.into()),
		}
	}

	/// Marks a claimed order as collected from the shop.
	pub async fn pick_up(
		&self,
		order_id: &str,
		courier: &Courier,
	) -> Result<ProgressOutcome, OrderServiceError> {
		self.progress(order_id, courier, OrderStatus::PickedUp).await
	}

	/// Returns a claimed order to the shop.
	pub async fn return_order(
		&self,
		order_id: &str,
		courier: &Courier,
	) -> Result<ProgressOutcome, OrderServiceError> {
		self.progress(order_id, courier, OrderStatus::Returned).await
	}

	async fn progress(
		&self,
		order_id: &str,
		courier: &Courier,
		target: OrderStatus,
	) -> Result<ProgressOutcome, OrderServiceError> {
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(ProgressOutcome::NotFound),
		};
		if current.courier_id.as_deref() != Some(courier.id.as_str()) {
			return Ok(ProgressOutcome::NotAssigned);
		}
		if !OrderStateMachine::is_valid_transition(&current.status, &target) {
			return Ok(ProgressOutcome::WrongPhase);
		}

		let order = self.state.transition_order_status(order_id, target).await?;
		info!(order_id = %order_id, status = %order.status, "order progressed");
		Ok(ProgressOutcome::Updated(order))
	}

	/// Marks one stop delivered; completes the order when it was the last.
	pub async fn mark_stop_delivered(
		&self,
		order_id: &str,
		courier: &Courier,
		stop_number: u32,
	) -> Result<DeliveryOutcome, OrderServiceError> {
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(DeliveryOutcome::NotFound),
		};
		if current.courier_id.as_deref() != Some(courier.id.as_str()) {
			return Ok(DeliveryOutcome::NotAssigned);
		}
		if current.status != OrderStatus::PickedUp {
			return Ok(DeliveryOutcome::WrongPhase);
		}
		if !current.stops.iter().any(|s| s.number == stop_number) {
			return Ok(DeliveryOutcome::NotFound);
		}

		let order = self
			.state
			.update_order_with(order_id, |o| {
				if let Some(stop) = o.stops.iter_mut().find(|s| s.number == stop_number) {
					stop.status = StopStatus::Delivered;
				}
				if o.all_stops_delivered() {
					o.status = OrderStatus::Delivered;
				}
			})
			.await?;

		if order.status == OrderStatus::Delivered {
			info!(order_id = %order_id, "order completed");
			Ok(DeliveryOutcome::Completed(order))
		} else {
			Ok(DeliveryOutcome::StopDelivered(order))
		}
	}

	/// Replaces the recipient phone of one stop.
	pub async fn edit_stop_phone(
		&self,
		order_id: &str,
		shop: &Shop,
		stop_number: u32,
		phone: String,
	) -> Result<EditOutcome, OrderServiceError> {
		self.edit_stop_field(order_id, shop, stop_number, move |stop| {
			stop.recipient_phone = phone;
		})
		.await
	}

	/// Replaces the courier note of one stop.
	pub async fn edit_stop_comment(
		&self,
		order_id: &str,
		shop: &Shop,
		stop_number: u32,
		comment: Option<String>,
	) -> Result<EditOutcome, OrderServiceError> {
		self.edit_stop_field(order_id, shop, stop_number, move |stop| {
			stop.comment = comment;
		})
		.await
	}

	/// Replaces the delivery date of the whole order.
	pub async fn edit_delivery_date(
		&self,
		order_id: &str,
		shop: &Shop,
		date: chrono::NaiveDate,
	) -> Result<EditOutcome, OrderServiceError> {
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(EditOutcome::NotFound),
		};
		if current.shop_id != shop.id || current.status != OrderStatus::New {
			return Ok(EditOutcome::NotEditable);
		}

		let order = self
			.state
			.update_order_with(order_id, |o| o.delivery_date = date)
			.await?;
		Ok(EditOutcome::Updated(order))
	}

	/// Replaces the address of one stop and re-prices the chain.
	///
	/// The edited stop is quoted against its anchor (the shop for stop 1,
	/// the previous stop otherwise). Every later stop is re-priced off the
	/// shifted chain; re-pricing walks forward only while consecutive stops
	/// have resolved coordinates.
	pub async fn edit_stop_address(
		&self,
		order_id: &str,
		shop: &Shop,
		stop_number: u32,
		new_address: String,
	) -> Result<EditOutcome, OrderServiceError> {
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(EditOutcome::NotFound),
		};
		if current.shop_id != shop.id || current.status != OrderStatus::New {
			return Ok(EditOutcome::NotEditable);
		}
		let Some(index) = current.stops.iter().position(|s| s.number == stop_number) else {
			return Ok(EditOutcome::NotFound);
		};

		let mut stops = current.stops.clone();
		let anchor = if index == 0 {
			shop.point
		} else {
			stops[index - 1].point
		};

		// When the address does not geocode inside the zone, the text still
		// changes but coordinates and prices stay as they were.
		let mut out_of_zone_region = None;
		let mut repriced = false;
		match anchor {
			Some(anchor) => match self.pricing.quote_stop(&anchor, &new_address).await {
				StopQuote::Priced {
					distance_km,
					price,
					resolved_address,
					point,
				} => {
					let stop = &mut stops[index];
					stop.address = new_address;
					stop.resolved_address = Some(resolved_address);
					stop.point = Some(point);
					stop.distance_km = Some(distance_km);
					stop.price = price;
					repriced = true;
				},
				StopQuote::Unresolved => {
					stops[index].address = new_address;
				},
				StopQuote::OutOfZone { region } => {
					stops[index].address = new_address;
					out_of_zone_region = Some(region);
				},
			},
			None => {
				// No anchor to price from; record the new address and its
				// coordinates if it resolves, keep the old price.
				match self.pricing.resolve_address(&new_address).await {
					Some(resolved) => {
						let stop = &mut stops[index];
						stop.address = new_address;
						stop.resolved_address = Some(resolved.full_address);
						stop.point = Some(resolved.point);
						repriced = true;
					},
					None => {
						stops[index].address = new_address;
					},
				}
			},
		}

		// The edited stop moved, so every later leg has a new length.
		if repriced {
			for i in (index + 1)..stops.len() {
				let (Some(from), Some(to)) = (stops[i - 1].point, stops[i].point) else {
					break;
				};
				let (distance_km, price) = self.pricing.price_leg(&from, &to).await;
				stops[i].distance_km = Some(distance_km);
				stops[i].price = price;
			}
		}

		let order = self
			.state
			.update_order_with(order_id, move |o| o.stops = stops)
			.await?;
		if repriced {
			info!(order_id = %order_id, stop = stop_number, "stop address edited, chain re-priced");
			Ok(EditOutcome::Updated(order))
		} else {
			info!(order_id = %order_id, stop = stop_number, "stop address updated without pricing");
			Ok(EditOutcome::AddressKeptUnpriced {
				order,
				region: out_of_zone_region,
			})
		}
	}

	async fn edit_stop_field<F>(
		&self,
		order_id: &str,
		shop: &Shop,
		stop_number: u32,
		apply: F,
	) -> Result<EditOutcome, OrderServiceError>
	where
		F: FnOnce(&mut Stop),
	{
		let current = match self.get_order(order_id).await? {
			Some(order) => order,
			None => return Ok(EditOutcome::NotFound),
		};
		if current.shop_id != shop.id || current.status != OrderStatus::New {
			return Ok(EditOutcome::NotEditable);
		}
		if !current.stops.iter().any(|s| s.number == stop_number) {
			return Ok(EditOutcome::NotFound);
		}

		let order = self
			.state
			.update_order_with(order_id, move |o| {
				if let Some(stop) = o.stops.iter_mut().find(|s| s.number == stop_number) {
					apply(stop);
				}
			})
			.await?;
		Ok(EditOutcome::Updated(order))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use dispatch_config::{PricingConfig, RegionConfig};
	use dispatch_gateway::implementations::mock::{MockGeocoding, MockRouting};
	use dispatch_gateway::{
		GeocodingInterface, GeocodingService, ResolvedAddress, RoutingInterface, RoutingService,
	};
	use dispatch_storage::implementations::memory::MemoryStorage;
	use dispatch_types::GeoPoint;
	use rust_decimal_macros::dec;
	use std::collections::HashMap;

	fn pipeline_with(geocoder: MockGeocoding) -> Arc<PricingPipeline> {
		let mut geocoders: HashMap<String, Arc<dyn GeocodingInterface>> = HashMap::new();
		geocoders.insert("mock".to_string(), Arc::new(geocoder));
		let mut routers: HashMap<String, Arc<dyn RoutingInterface>> = HashMap::new();
		routers.insert("mock".to_string(), Arc::new(MockRouting::with_distance(4.0)));

		Arc::new(PricingPipeline::new(
			Arc::new(GeocodingService::new(geocoders, "mock".to_string()).unwrap()),
			Arc::new(RoutingService::new(routers, "mock".to_string()).unwrap()),
			&PricingConfig::default(),
			RegionConfig {
				city: "Москва".to_string(),
				area: "Московская".to_string(),
			},
		))
	}

	fn pipeline() -> Arc<PricingPipeline> {
		pipeline_with(MockGeocoding::new().with_default(ResolvedAddress {
			point: GeoPoint::new(55.80, 37.70),
			full_address: "г Москва, ул Новая, д 1".to_string(),
			city: Some("Москва".to_string()),
			region: Some("Московская область".to_string()),
		}))
	}

	fn service() -> Arc<OrderService> {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		Arc::new(OrderService::new(storage, pipeline(), 3))
	}

	fn service_with(geocoder: MockGeocoding) -> Arc<OrderService> {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		Arc::new(OrderService::new(storage, pipeline_with(geocoder), 3))
	}

	fn service_with_cap(cap: usize) -> Arc<OrderService> {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		Arc::new(OrderService::new(storage, pipeline(), cap))
	}

	fn shop() -> Shop {
		Shop {
			id: "shop-1".to_string(),
			owner: 100,
			name: "Blooms".to_string(),
			phone: "+79990000000".to_string(),
			pickup_address: "Tverskaya 7".to_string(),
			point: Some(GeoPoint::new(55.76, 37.61)),
			active: true,
			created_at: 0,
		}
	}

	fn courier(id: &str) -> Courier {
		Courier {
			id: id.to_string(),
			user: 200,
			full_name: "Ivan Petrov".to_string(),
			phone: "+79991111111".to_string(),
			id_photo_file: "file-1".to_string(),
			status: CourierStatus::Active,
			active: true,
			created_at: 0,
		}
	}

	fn stop(number: u32, price: i64) -> Stop {
		Stop {
			number,
			recipient_name: "Anna".to_string(),
			recipient_phone: "+79992222222".to_string(),
			address: "Lenina 44".to_string(),
			resolved_address: Some("г Москва, ул Ленина, д 44".to_string()),
			point: Some(GeoPoint::new(55.70, 37.50)),
			distance_km: Some(3.0),
			price: rust_decimal::Decimal::from(price),
			comment: None,
			status: StopStatus::Pending,
		}
	}

	fn date() -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
	}

	async fn new_order(svc: &OrderService, stops: Vec<Stop>) -> Order {
		svc.create_order(&shop(), date(), stops).await.unwrap()
	}

	#[tokio::test]
	async fn test_exactly_one_concurrent_claim_wins() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300)]).await;

		let mut handles = Vec::new();
		for i in 0..8 {
			let svc = svc.clone();
			let order_id = order.id.clone();
			handles.push(tokio::spawn(async move {
				svc.claim(&order_id, &courier(&format!("courier-{}", i)))
					.await
					.unwrap()
			}));
		}

		let mut wins = 0;
		let mut losses = 0;
		for handle in handles {
			match handle.await.unwrap() {
				ClaimOutcome::Claimed(_) => wins += 1,
				ClaimOutcome::NoLongerAvailable => losses += 1,
				other => panic!("unexpected outcome {:?}", other),
			}
		}
		assert_eq!(wins, 1);
		assert_eq!(losses, 7);
	}

	#[tokio::test]
	async fn test_claim_respects_active_cap() {
		let svc = service();
		let c = courier("courier-1");

		for _ in 0..3 {
			let order = new_order(&svc, vec![stop(1, 300)]).await;
			assert!(matches!(
				svc.claim(&order.id, &c).await.unwrap(),
				ClaimOutcome::Claimed(_)
			));
		}

		let fourth = new_order(&svc, vec![stop(1, 300)]).await;
		assert!(matches!(
			svc.claim(&fourth.id, &c).await.unwrap(),
			ClaimOutcome::CapExceeded
		));
	}

	#[tokio::test]
	async fn test_racing_claims_on_two_orders_cannot_exceed_the_cap() {
		let svc = service_with_cap(1);
		let first = new_order(&svc, vec![stop(1, 300)]).await;
		let second = new_order(&svc, vec![stop(1, 300)]).await;
		let c = courier("courier-1");

		let mut handles = Vec::new();
		for order_id in [first.id.clone(), second.id.clone()] {
			let svc = svc.clone();
			let c = c.clone();
			handles.push(tokio::spawn(
				async move { svc.claim(&order_id, &c).await.unwrap() },
			));
		}

		let mut wins = 0;
		for handle in handles {
			match handle.await.unwrap() {
				ClaimOutcome::Claimed(_) => wins += 1,
				ClaimOutcome::CapExceeded => {},
				other => panic!("unexpected outcome {:?}", other),
			}
		}
		assert!(wins <= 1);

		// The cap holds in storage, and a released order is back on the
		// market for other couriers.
		let active = svc.active_orders_for_courier("courier-1").await.unwrap();
		assert_eq!(active.len(), wins);
		let available = svc.available_orders().await.unwrap();
		assert_eq!(active.len() + available.len(), 2);
	}

	#[tokio::test]
	async fn test_unapproved_courier_cannot_claim() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300)]).await;

		let mut pending = courier("courier-1");
		pending.status = CourierStatus::Pending;
		assert!(matches!(
			svc.claim(&order.id, &pending).await.unwrap(),
			ClaimOutcome::CourierInactive
		));

		let mut deactivated = courier("courier-2");
		deactivated.active = false;
		assert!(matches!(
			svc.claim(&order.id, &deactivated).await.unwrap(),
			ClaimOutcome::CourierInactive
		));
	}

	#[tokio::test]
	async fn test_cancel_loses_to_a_prior_claim() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300)]).await;
		let c = courier("courier-1");

		assert!(matches!(
			svc.claim(&order.id, &c).await.unwrap(),
			ClaimOutcome::Claimed(_)
		));
		assert!(matches!(
			svc.cancel(&order.id, &shop()).await.unwrap(),
			CancelOutcome::NotCancellable
		));
	}

	#[tokio::test]
	async fn test_delivering_every_stop_completes_the_order() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300), stop(2, 400)]).await;
		let c = courier("courier-1");

		svc.claim(&order.id, &c).await.unwrap();
		assert!(matches!(
			svc.pick_up(&order.id, &c).await.unwrap(),
			ProgressOutcome::Updated(_)
		));

		match svc.mark_stop_delivered(&order.id, &c, 1).await.unwrap() {
			DeliveryOutcome::StopDelivered(o) => assert_eq!(o.status, OrderStatus::PickedUp),
			other => panic!("unexpected outcome {:?}", other),
		}
		match svc.mark_stop_delivered(&order.id, &c, 2).await.unwrap() {
			DeliveryOutcome::Completed(o) => assert_eq!(o.status, OrderStatus::Delivered),
			other => panic!("unexpected outcome {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_stops_cannot_be_marked_before_pickup() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300)]).await;
		let c = courier("courier-1");

		svc.claim(&order.id, &c).await.unwrap();
		assert!(matches!(
			svc.mark_stop_delivered(&order.id, &c, 1).await.unwrap(),
			DeliveryOutcome::WrongPhase
		));
	}

	#[tokio::test]
	async fn test_address_edit_reprices_the_chain() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300), stop(2, 400)]).await;

		// Mock router reports every leg as 4.0 km, which prices at the 5 km
		// band.
		match svc
			.edit_stop_address(&order.id, &shop(), 1, "Novaya 1".to_string())
			.await
			.unwrap()
		{
			EditOutcome::Updated(o) => {
				assert_eq!(o.stops[0].address, "Novaya 1");
				assert_eq!(o.stops[0].distance_km, Some(4.0));
				assert_eq!(o.stops[0].price, dec!(400));
				// Stop 2 re-priced off stop 1's new position.
				assert_eq!(o.stops[1].distance_km, Some(4.0));
				assert_eq!(o.stops[1].price, dec!(400));
			},
			other => panic!("unexpected outcome {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_unresolvable_edit_updates_text_but_keeps_price() {
		let svc = service_with(MockGeocoding::new());
		let order = new_order(&svc, vec![stop(1, 300)]).await;

		match svc
			.edit_stop_address(&order.id, &shop(), 1, "Gibberish 123".to_string())
			.await
			.unwrap()
		{
			EditOutcome::AddressKeptUnpriced { order: o, region } => {
				assert!(region.is_none());
				assert_eq!(o.stops[0].address, "Gibberish 123");
				assert_eq!(o.stops[0].price, dec!(300));
				// Coordinates stay what they were before the edit.
				assert_eq!(o.stops[0].point, Some(GeoPoint::new(55.70, 37.50)));
			},
			other => panic!("unexpected outcome {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_claimed_orders_are_not_editable() {
		let svc = service();
		let order = new_order(&svc, vec![stop(1, 300)]).await;
		let c = courier("courier-1");
		svc.claim(&order.id, &c).await.unwrap();

		assert!(matches!(
			svc.edit_stop_phone(&order.id, &shop(), 1, "+70000000001".to_string())
				.await
				.unwrap(),
			EditOutcome::NotEditable
		));
	}

	#[tokio::test]
	async fn test_available_orders_lists_only_unclaimed() {
		let svc = service();
		let first = new_order(&svc, vec![stop(1, 300)]).await;
		let second = new_order(&svc, vec![stop(1, 300)]).await;
		svc.claim(&first.id, &courier("courier-1")).await.unwrap();

		let available = svc.available_orders().await.unwrap();
		assert_eq!(available.len(), 1);
		assert_eq!(available[0].id, second.id);
	}
}
