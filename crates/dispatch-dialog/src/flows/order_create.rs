//! Order creation flow.
//!
//! One question per step: delivery date, then recipient name, phone, and
//! address for each stop. The address step runs the pricing pipeline; the
//! shop confirms the suggested price or types its own (never below the
//! tariff floor), adds an optional courier comment, and decides whether to
//! chain another stop. Stop 1 is priced from the shop's pickup point, stop
//! N from stop N-1, so the stops form one priced route.
//!
//! All stops live in a single list from the first field onward; the stop
//! being collected is always the last element.

use super::char_len;
use crate::DialogError;
use chrono::{Datelike, Local, NaiveDate, Timelike};
use dispatch_core::OrderService;
use dispatch_pricing::{PricingPipeline, StopQuote};
use dispatch_types::{Button, EventKind, GeoPoint, Reply, Shop, Stop, StopStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

/// Steps of the order creation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
	Date,
	RecipientName,
	RecipientPhone,
	Address,
	PriceConfirm,
	ManualPrice,
	Comment,
	AskAnotherStop,
}

/// One stop being collected.
#[derive(Debug, Clone, Default)]
pub struct StopDraft {
	pub recipient_name: String,
	pub recipient_phone: String,
	pub address: String,
	pub resolved_address: Option<String>,
	pub point: Option<GeoPoint>,
	pub distance_km: Option<f64>,
	pub price: Option<Decimal>,
	pub comment: Option<String>,
}

/// Accumulated state of one order creation.
#[derive(Debug, Clone)]
pub struct OrderCreateFlow {
	pub step: CreateStep,
	pub delivery_date: Option<NaiveDate>,
	pub stops: Vec<StopDraft>,
}

/// Whether a same-day delivery may still be ordered at this hour.
pub fn today_allowed(hour: u32, cutoff_hour: u32) -> bool {
	hour < cutoff_hour
}

/// Handler driving the order creation flow.
pub struct OrderCreateHandler {
	pricing: Arc<PricingPipeline>,
	orders: Arc<OrderService>,
	cutoff_hour: u32,
}

impl OrderCreateHandler {
	pub fn new(pricing: Arc<PricingPipeline>, orders: Arc<OrderService>, cutoff_hour: u32) -> Self {
		Self {
			pricing,
			orders,
			cutoff_hour,
		}
	}

	/// Starts a fresh order.
	pub fn start(&self) -> (OrderCreateFlow, Vec<Reply>) {
		(
			OrderCreateFlow {
				step: CreateStep::Date,
				delivery_date: None,
				stops: Vec::new(),
			},
			vec![self.date_menu()],
		)
	}

	/// Feeds one event into the flow.
	pub async fn handle(
		&self,
		shop: &Shop,
		mut flow: OrderCreateFlow,
		event: &EventKind,
	) -> Result<(Option<OrderCreateFlow>, Vec<Reply>), DialogError> {
		if let EventKind::Text(text) = event {
			if text.trim() == "/cancel" {
				return Ok((None, vec![Reply::text("Order creation cancelled.")]));
			}
		}

		match flow.step {
			CreateStep::Date => match event {
				EventKind::Button(data) if data == "date:today" => {
					let now = Local::now();
					if !today_allowed(now.hour(), self.cutoff_hour) {
						return Ok((
							Some(flow),
							vec![Reply::menu(
								format!(
									"Same-day orders close at {}:00; only tomorrow is available.",
									self.cutoff_hour
								),
								vec![Button::new("Tomorrow", "date:tomorrow")],
							)],
						));
					}
					self.accept_date(flow, now.date_naive())
				},
				EventKind::Button(data) if data == "date:tomorrow" => {
					let tomorrow = Local::now().date_naive().succ_opt();
					match tomorrow {
						Some(date) => self.accept_date(flow, date),
						// Only reachable at the end of the calendar.
						None => Ok((Some(flow), vec![self.date_menu()])),
					}
				},
				_ => Ok((Some(flow), vec![self.date_menu()])),
			},
			CreateStep::RecipientName => match event {
				EventKind::Text(text) if char_len(text) >= 2 => {
					if let Some(draft) = flow.stops.last_mut() {
						draft.recipient_name = text.trim().to_string();
					}
					flow.step = CreateStep::RecipientPhone;
					Ok((
						Some(flow),
						vec![Reply::text("Recipient phone number (at least 5 characters).")],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please enter the recipient's name, at least 2 characters.")],
				)),
			},
			CreateStep::RecipientPhone => match event {
				EventKind::Text(text) if char_len(text) >= 5 => {
					if let Some(draft) = flow.stops.last_mut() {
						draft.recipient_phone = text.trim().to_string();
					}
					flow.step = CreateStep::Address;
					Ok((
						Some(flow),
						vec![Reply::text(
							"Delivery address (at least 10 characters). Entrance and apartment are welcome, the courier will see them.",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please enter a phone number, at least 5 characters.")],
				)),
			},
			CreateStep::Address => match event {
				EventKind::Text(text) if char_len(text) >= 10 => {
					self.quote_address(shop, flow, text.trim().to_string()).await
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please enter the full address, at least 10 characters.")],
				)),
			},
			CreateStep::PriceConfirm => match event {
				EventKind::Button(data) if data == "price:accept" => {
					flow.step = CreateStep::Comment;
					Ok((Some(flow), vec![comment_prompt()]))
				},
				EventKind::Button(data) if data == "price:manual" => {
					flow.step = CreateStep::ManualPrice;
					Ok((Some(flow), vec![self.manual_price_prompt()]))
				},
				// A typed number at the confirm step is a manual override.
				EventKind::Text(text) => match text.trim().parse::<Decimal>() {
					Ok(price) if price >= self.pricing.min_price() => {
						if let Some(draft) = flow.stops.last_mut() {
							draft.price = Some(price);
						}
						flow.step = CreateStep::Comment;
						Ok((Some(flow), vec![comment_prompt()]))
					},
					_ => Ok((Some(flow), vec![self.manual_price_prompt()])),
				},
				_ => {
					let menu = self.price_confirm_menu(&flow);
					Ok((Some(flow), vec![menu]))
				},
			},
			CreateStep::ManualPrice => match event {
				EventKind::Text(text) => match text.trim().parse::<Decimal>() {
					Ok(price) if price >= self.pricing.min_price() => {
						if let Some(draft) = flow.stops.last_mut() {
							draft.price = Some(price);
						}
						flow.step = CreateStep::Comment;
						Ok((Some(flow), vec![comment_prompt()]))
					},
					_ => Ok((Some(flow), vec![self.manual_price_prompt()])),
				},
				_ => Ok((Some(flow), vec![self.manual_price_prompt()])),
			},
			CreateStep::Comment => match event {
				EventKind::Text(text) => {
					if let Some(draft) = flow.stops.last_mut() {
						let trimmed = text.trim();
						draft.comment = if trimmed == "/skip" {
							None
						} else {
							Some(trimmed.to_string())
						};
					}
					flow.step = CreateStep::AskAnotherStop;
					Ok((
						Some(flow),
						vec![Reply::menu(
							"Add another delivery stop to this order?",
							vec![
								Button::new("Add a stop", "stop:add"),
								Button::new("Finish order", "stop:done"),
							],
						)],
					))
				},
				_ => Ok((Some(flow), vec![comment_prompt()])),
			},
			CreateStep::AskAnotherStop => match event {
				EventKind::Button(data) if data == "stop:add" => {
					flow.stops.push(StopDraft::default());
					flow.step = CreateStep::RecipientName;
					let n = flow.stops.len();
					Ok((
						Some(flow),
						vec![Reply::text(format!("Stop {}: recipient name?", n))],
					))
				},
				EventKind::Button(data) if data == "stop:done" => self.finalize(shop, flow).await,
				_ => Ok((
					Some(flow),
					vec![Reply::menu(
						"Add another delivery stop to this order?",
						vec![
							Button::new("Add a stop", "stop:add"),
							Button::new("Finish order", "stop:done"),
						],
					)],
				)),
			},
		}
	}

	fn accept_date(
		&self,
		mut flow: OrderCreateFlow,
		date: NaiveDate,
	) -> Result<(Option<OrderCreateFlow>, Vec<Reply>), DialogError> {
		flow.delivery_date = Some(date);
		flow.stops.push(StopDraft::default());
		flow.step = CreateStep::RecipientName;
		Ok((
			Some(flow),
			vec![Reply::text(format!(
				"Delivery on {:02}.{:02}. Stop 1: recipient name?",
				date.day(),
				date.month()
			))],
		))
	}

	/// Runs the pricing pipeline for the stop being collected.
	async fn quote_address(
		&self,
		shop: &Shop,
		mut flow: OrderCreateFlow,
		address: String,
	) -> Result<(Option<OrderCreateFlow>, Vec<Reply>), DialogError> {
		if flow.stops.is_empty() {
			error!("address step reached with no stop under collection, resetting flow");
			return Ok((
				None,
				vec![Reply::text("Something went wrong, please start over.")],
			));
		}
		let index = flow.stops.len() - 1;
		let anchor = if index == 0 {
			shop.point
		} else {
			flow.stops[index - 1].point
		};
		flow.stops[index].address = address.clone();

		let Some(anchor) = anchor else {
			flow.step = CreateStep::ManualPrice;
			return Ok((
				Some(flow),
				vec![Reply::text(format!(
					"The distance cannot be computed for this stop. Enter the delivery price manually (at least {}).",
					self.pricing.min_price()
				))],
			));
		};

		match self.pricing.quote_stop(&anchor, &address).await {
			StopQuote::Priced {
				distance_km,
				price,
				resolved_address,
				point,
			} => {
				let draft = &mut flow.stops[index];
				draft.resolved_address = Some(resolved_address.clone());
				draft.point = Some(point);
				draft.distance_km = Some(distance_km);
				draft.price = Some(price);
				flow.step = CreateStep::PriceConfirm;
				let menu = self.price_confirm_menu(&flow);
				Ok((
					Some(flow),
					vec![Reply::text(format!("Found: {}", resolved_address)), menu],
				))
			},
			StopQuote::Unresolved => {
				flow.step = CreateStep::ManualPrice;
				Ok((
					Some(flow),
					vec![Reply::text(format!(
						"Could not find that address on the map. The text is saved for the courier; enter the delivery price manually (at least {}).",
						self.pricing.min_price()
					))],
				))
			},
			StopQuote::OutOfZone { region } => {
				flow.step = CreateStep::ManualPrice;
				Ok((
					Some(flow),
					vec![Reply::text(format!(
						"That address resolves to {}, outside our delivery zone. Enter the delivery price manually (at least {}).",
						region,
						self.pricing.min_price()
					))],
				))
			},
		}
	}

	/// Persists the finished order.
	async fn finalize(
		&self,
		shop: &Shop,
		flow: OrderCreateFlow,
	) -> Result<(Option<OrderCreateFlow>, Vec<Reply>), DialogError> {
		let Some(delivery_date) = flow.delivery_date else {
			error!("order finalized without a delivery date, resetting flow");
			return Ok((
				None,
				vec![Reply::text("Something went wrong, please start over.")],
			));
		};

		let mut stops = Vec::with_capacity(flow.stops.len());
		for draft in flow.stops {
			let Some(price) = draft.price else {
				error!("order finalized with an unpriced stop, resetting flow");
				return Ok((
					None,
					vec![Reply::text("Something went wrong, please start over.")],
				));
			};
			stops.push(Stop {
				number: 0, // assigned on creation
				recipient_name: draft.recipient_name,
				recipient_phone: draft.recipient_phone,
				address: draft.address,
				resolved_address: draft.resolved_address,
				point: draft.point,
				distance_km: draft.distance_km,
				price,
				comment: draft.comment,
				status: StopStatus::Pending,
			});
		}

		let order = self
			.orders
			.create_order(shop, delivery_date, stops)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		info!(order_id = %order.id, "order creation flow finished");

		Ok((
			None,
			vec![Reply::text(format!(
				"Order created: {} stop(s) on {:02}.{:02}, total {}. Couriers can now take it.",
				order.stops.len(),
				order.delivery_date.day(),
				order.delivery_date.month(),
				order.total_price()
			))],
		))
	}

	fn date_menu(&self) -> Reply {
		let mut buttons = Vec::new();
		if today_allowed(Local::now().hour(), self.cutoff_hour) {
			buttons.push(Button::new("Today", "date:today"));
		}
		buttons.push(Button::new("Tomorrow", "date:tomorrow"));
		Reply::menu("When should the order be delivered?", buttons)
	}

	fn price_confirm_menu(&self, flow: &OrderCreateFlow) -> Reply {
		let (km, price) = flow
			.stops
			.last()
			.map(|d| (d.distance_km.unwrap_or(0.0), d.price.unwrap_or_default()))
			.unwrap_or((0.0, Decimal::ZERO));
		Reply::menu(
			format!("About {} km to this stop, delivery price {}.", km, price),
			vec![
				Button::new("Accept price", "price:accept"),
				Button::new("Enter my own", "price:manual"),
			],
		)
	}

	fn manual_price_prompt(&self) -> Reply {
		Reply::text(format!(
			"Enter the delivery price as a number, at least {}.",
			self.pricing.min_price()
		))
	}
}

fn comment_prompt() -> Reply {
	Reply::text("Comment for the courier (intercom code, timing), or /skip.")
}

#[cfg(test)]
mod tests {
	use super::*;
	use dispatch_config::{PricingConfig, RegionConfig};
	use dispatch_gateway::implementations::mock::{MockGeocoding, MockRouting};
	use dispatch_gateway::{
		GeocodingInterface, GeocodingService, ResolvedAddress, RoutingInterface, RoutingService,
	};
	use dispatch_storage::{implementations::memory::MemoryStorage, StorageService};
	use rust_decimal_macros::dec;
	use std::collections::HashMap;

	fn resolved(lat: f64, lon: f64) -> ResolvedAddress {
		ResolvedAddress {
			point: GeoPoint::new(lat, lon),
			full_address: format!("г Москва, resolved at {},{}", lat, lon),
			city: Some("Москва".to_string()),
			region: Some("Московская область".to_string()),
		}
	}

	fn fixture(geocoder: MockGeocoding, router: MockRouting) -> (OrderCreateHandler, Arc<OrderService>) {
		let mut geocoders: HashMap<String, Arc<dyn GeocodingInterface>> = HashMap::new();
		geocoders.insert("mock".to_string(), Arc::new(geocoder));
		let mut routers: HashMap<String, Arc<dyn RoutingInterface>> = HashMap::new();
		routers.insert("mock".to_string(), Arc::new(router));
		let pricing = Arc::new(PricingPipeline::new(
			Arc::new(GeocodingService::new(geocoders, "mock".to_string()).unwrap()),
			Arc::new(RoutingService::new(routers, "mock".to_string()).unwrap()),
			&PricingConfig::default(),
			RegionConfig {
				city: "Москва".to_string(),
				area: "Московская".to_string(),
			},
		));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let orders = Arc::new(OrderService::new(storage, pricing.clone(), 3));
		(
			OrderCreateHandler::new(pricing, orders.clone(), 21),
			orders,
		)
	}

	fn shop() -> Shop {
		Shop {
			id: "shop-1".to_string(),
			owner: 100,
			name: "Blooms".to_string(),
			phone: "+79990000000".to_string(),
			pickup_address: "Tverskaya 7".to_string(),
			point: Some(GeoPoint::new(55.70, 37.50)),
			active: true,
			created_at: 0,
		}
	}

	async fn step(
		h: &OrderCreateHandler,
		flow: OrderCreateFlow,
		event: EventKind,
	) -> OrderCreateFlow {
		h.handle(&shop(), flow, &event).await.unwrap().0.unwrap()
	}

	#[test]
	fn test_today_allowed_respects_cutoff() {
		assert!(today_allowed(20, 21));
		assert!(!today_allowed(21, 21));
		assert!(!today_allowed(23, 21));
	}

	#[tokio::test]
	async fn test_two_stop_order_chains_anchors() {
		// Router down, so leg distances come from straight-line fallback:
		// the second leg is short only if it is anchored at stop 1.
		let geocoder = MockGeocoding::new()
			.with_answer("Москва, Lenina 44", resolved(55.80, 37.70))
			.with_answer("Москва, Sadovaya 10", resolved(55.81, 37.70));
		let (h, orders) = fixture(geocoder, MockRouting::unavailable());

		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Anna".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("+79992222222".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Lenina 44, apt 15".to_string())).await;
		assert_eq!(flow.step, CreateStep::PriceConfirm);
		let flow = step(&h, flow, EventKind::Button("price:accept".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("/skip".to_string())).await;
		let flow = step(&h, flow, EventKind::Button("stop:add".to_string())).await;

		let flow = step(&h, flow, EventKind::Text("Boris".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("+79993333333".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Sadovaya 10, entrance 2".to_string())).await;
		let flow = step(&h, flow, EventKind::Button("price:accept".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("leave at the door".to_string())).await;

		let (end, replies) = h
			.handle(&shop(), flow, &EventKind::Button("stop:done".to_string()))
			.await
			.unwrap();
		assert!(end.is_none());
		assert!(matches!(&replies[0], Reply::Text(t) if t.contains("Order created")));

		let created = &orders.available_orders().await.unwrap()[0];
		assert_eq!(created.stops.len(), 2);
		// Stop 1 is far from the shop, stop 2 is a short hop from stop 1.
		assert!(created.stops[0].distance_km.unwrap() > 20.0);
		assert!(created.stops[1].distance_km.unwrap() < 3.0);
		assert_eq!(created.stops[1].price, dec!(300));
		assert_eq!(created.stops[1].comment.as_deref(), Some("leave at the door"));
	}

	#[tokio::test]
	async fn test_three_stop_chain_anchors_each_stop_on_the_previous_one() {
		// Each geocode sits ~1 ladder apart: stop 1 far from the shop,
		// stop 2 well north of stop 1, stop 3 a short hop from stop 2. If
		// stop 3 were anchored at the shop or stop 1 its leg would be tens
		// of kilometers, not under 3.
		let geocoder = MockGeocoding::new()
			.with_answer("Москва, Lenina 44", resolved(55.80, 37.70))
			.with_answer("Москва, Sadovaya 10", resolved(55.90, 37.70))
			.with_answer("Москва, Parkovaya 3", resolved(55.91, 37.70));
		let (h, orders) = fixture(geocoder, MockRouting::unavailable());

		let (flow, _) = h.start();
		let mut flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		for address in ["Lenina 44, apt 15", "Sadovaya 10, entrance 2", "Parkovaya 3, apt 1"] {
			flow = step(&h, flow, EventKind::Text("Anna".to_string())).await;
			flow = step(&h, flow, EventKind::Text("+79992222222".to_string())).await;
			flow = step(&h, flow, EventKind::Text(address.to_string())).await;
			flow = step(&h, flow, EventKind::Button("price:accept".to_string())).await;
			flow = step(&h, flow, EventKind::Text("/skip".to_string())).await;
			if address.starts_with("Parkovaya") {
				break;
			}
			flow = step(&h, flow, EventKind::Button("stop:add".to_string())).await;
		}
		let (end, _) = h
			.handle(&shop(), flow, &EventKind::Button("stop:done".to_string()))
			.await
			.unwrap();
		assert!(end.is_none());

		let created = &orders.available_orders().await.unwrap()[0];
		assert_eq!(created.stops.len(), 3);
		// Leg 2 spans stop 1 to stop 2 (~18 km), not shop to stop 2 (~40 km).
		let leg2 = created.stops[1].distance_km.unwrap();
		assert!(leg2 > 15.0 && leg2 < 20.0);
		// Leg 3 is the short hop from stop 2.
		assert!(created.stops[2].distance_km.unwrap() < 3.0);
		assert_eq!(created.stops[2].price, dec!(300));
	}

	#[tokio::test]
	async fn test_typed_price_at_confirm_step_overrides_the_quote() {
		let geocoder = MockGeocoding::new().with_default(resolved(55.80, 37.70));
		let (h, _) = fixture(geocoder, MockRouting::with_distance(4.0));

		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Anna".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("+79992222222".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Lenina 44, apt 15".to_string())).await;
		assert_eq!(flow.step, CreateStep::PriceConfirm);
		assert_eq!(flow.stops[0].price, Some(dec!(400)));

		// Typing a number instead of tapping a button replaces the quote.
		let flow = step(&h, flow, EventKind::Text("950".to_string())).await;
		assert_eq!(flow.step, CreateStep::Comment);
		assert_eq!(flow.stops[0].price, Some(dec!(950)));
	}

	#[tokio::test]
	async fn test_typed_price_below_floor_is_rejected_at_confirm_step() {
		let geocoder = MockGeocoding::new().with_default(resolved(55.80, 37.70));
		let (h, _) = fixture(geocoder, MockRouting::with_distance(4.0));

		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Anna".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("+79992222222".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Lenina 44, apt 15".to_string())).await;

		let flow = step(&h, flow, EventKind::Text("250".to_string())).await;
		assert_eq!(flow.step, CreateStep::PriceConfirm);
		assert_eq!(flow.stops[0].price, Some(dec!(400)));
	}

	#[tokio::test]
	async fn test_short_name_reprompts_without_losing_date() {
		let (h, _) = fixture(MockGeocoding::new(), MockRouting::unavailable());
		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		let date = flow.delivery_date;

		let flow = step(&h, flow, EventKind::Text("A".to_string())).await;
		assert_eq!(flow.step, CreateStep::RecipientName);
		assert_eq!(flow.delivery_date, date);
	}

	#[tokio::test]
	async fn test_unresolved_address_falls_back_to_manual_price() {
		let (h, _) = fixture(MockGeocoding::new(), MockRouting::unavailable());
		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Anna".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("+79992222222".to_string())).await;
		let flow = step(&h, flow, EventKind::Text("Nowhere lane 4321".to_string())).await;
		assert_eq!(flow.step, CreateStep::ManualPrice);

		// Below the tariff floor: rejected.
		let flow = step(&h, flow, EventKind::Text("250".to_string())).await;
		assert_eq!(flow.step, CreateStep::ManualPrice);

		let flow = step(&h, flow, EventKind::Text("350".to_string())).await;
		assert_eq!(flow.step, CreateStep::Comment);
		assert_eq!(flow.stops[0].price, Some(dec!(350)));
	}

	#[tokio::test]
	async fn test_cancel_aborts_the_flow() {
		let (h, _) = fixture(MockGeocoding::new(), MockRouting::unavailable());
		let (flow, _) = h.start();
		let flow = step(&h, flow, EventKind::Button("date:tomorrow".to_string())).await;

		let (end, replies) = h
			.handle(&shop(), flow, &EventKind::Text("/cancel".to_string()))
			.await
			.unwrap();
		assert!(end.is_none());
		assert!(matches!(&replies[0], Reply::Text(t) if t.contains("cancelled")));
	}
}
