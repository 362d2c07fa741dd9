//! Inbound event dispatch.
//!
//! Every inbound chat event passes through here exactly once. Commands
//! (button payloads with a known shape) either start a flow, run a
//! standalone action like claiming, or render a list; anything else is fed
//! to the user's active flow. The outcome is uniform: `Handled` with the
//! outbound messages to send, or `NotHandled` when the event means nothing
//! in the current state, which is also what makes duplicate button presses
//! after a finished flow harmless.

use crate::flows::{
	courier_register::CourierRegisterHandler, order_create::OrderCreateHandler,
	order_edit::OrderEditHandler, shop_register::ShopRegisterHandler,
};
use crate::session::{Flow, SessionStore};
use crate::DialogError;
use dispatch_core::{
	CancelOutcome, ClaimOutcome, CourierService, DeliveryOutcome, OrderService, ProgressOutcome,
	ShopService,
};
use dispatch_types::{
	Button, ChatId, Courier, EventKind, InboundEvent, Order, OutboundMessage, Reply, Shop, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of routing one inbound event.
#[derive(Debug)]
pub enum RouteOutcome {
	/// The event was consumed; send these messages.
	Handled(Vec<OutboundMessage>),
	/// The event means nothing right now; no state was touched.
	NotHandled,
}

/// Routes inbound events to flows and standalone actions.
pub struct Router {
	sessions: Arc<SessionStore>,
	order_create: OrderCreateHandler,
	order_edit: OrderEditHandler,
	shop_register: ShopRegisterHandler,
	courier_register: CourierRegisterHandler,
	shops: Arc<ShopService>,
	couriers: Arc<CourierService>,
	orders: Arc<OrderService>,
}

impl Router {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		sessions: Arc<SessionStore>,
		order_create: OrderCreateHandler,
		order_edit: OrderEditHandler,
		shop_register: ShopRegisterHandler,
		courier_register: CourierRegisterHandler,
		shops: Arc<ShopService>,
		couriers: Arc<CourierService>,
		orders: Arc<OrderService>,
	) -> Self {
		Self {
			sessions,
			order_create,
			order_edit,
			shop_register,
			courier_register,
			shops,
			couriers,
			orders,
		}
	}

	/// Routes one inbound event.
	pub async fn route(&self, event: &InboundEvent) -> Result<RouteOutcome, DialogError> {
		// Commands win over an active flow; starting a new flow replaces
		// the old one.
		if let Some(outcome) = self.try_command(event).await? {
			return Ok(outcome);
		}

		if let Some(flow) = self.sessions.get(event.user) {
			let replies = self.continue_flow(event, flow).await?;
			return Ok(RouteOutcome::Handled(to_outbound(event.chat, replies)));
		}

		debug!(user = event.user, "event matched no command and no active flow");
		Ok(RouteOutcome::NotHandled)
	}

	/// Tries to interpret the event as a command.
	async fn try_command(
		&self,
		event: &InboundEvent,
	) -> Result<Option<RouteOutcome>, DialogError> {
		let data = match &event.kind {
			EventKind::Button(data) => data.as_str(),
			EventKind::Text(text) if text.trim() == "/start" => {
				return Ok(Some(RouteOutcome::Handled(to_outbound(
					event.chat,
					vec![main_menu()],
				))));
			},
			_ => return Ok(None),
		};

		let replies = match data {
			"menu:new_order" => self.start_order_creation(event.user).await?,
			"menu:my_orders" => return self.list_shop_orders(event).await.map(Some),
			"menu:available" => self.list_available_orders(event.user).await?,
			"menu:register_shop" => {
				let (flow, replies) = self.shop_register.start();
				self.sessions.set(event.user, Flow::ShopRegister(flow));
				replies
			},
			"menu:register_courier" => {
				let (flow, replies) = self.courier_register.start();
				self.sessions.set(event.user, Flow::CourierRegister(flow));
				replies
			},
			_ => {
				if let Some(order_id) = data.strip_prefix("claim:") {
					self.claim(event.user, order_id).await?
				} else if let Some(order_id) = data.strip_prefix("cancel:") {
					self.cancel(event.user, order_id).await?
				} else if let Some(order_id) = data.strip_prefix("edit:") {
					self.start_order_edit(event.user, order_id).await?
				} else if let Some(order_id) = data.strip_prefix("pickup:") {
					self.pickup(event.user, order_id).await?
				} else if let Some(order_id) = data.strip_prefix("return:") {
					self.return_order(event.user, order_id).await?
				} else if let Some(rest) = data.strip_prefix("deliver:") {
					self.deliver(event.user, rest).await?
				} else {
					return Ok(None);
				}
			},
		};

		Ok(Some(RouteOutcome::Handled(to_outbound(event.chat, replies))))
	}

	/// Feeds the event into the user's active flow and stores the result.
	async fn continue_flow(
		&self,
		event: &InboundEvent,
		flow: Flow,
	) -> Result<Vec<Reply>, DialogError> {
		match flow {
			Flow::OrderCreate(state) => {
				let Some(shop) = self.active_shop(event.user).await? else {
					self.sessions.clear(event.user);
					return Ok(vec![Reply::text(
						"Your shop is not available anymore; order creation stopped.",
					)]);
				};
				let (next, replies) = self.order_create.handle(&shop, state, &event.kind).await?;
				self.store_or_clear(event.user, next.map(Flow::OrderCreate));
				Ok(replies)
			},
			Flow::OrderEdit(state) => {
				let Some(shop) = self.active_shop(event.user).await? else {
					self.sessions.clear(event.user);
					return Ok(vec![Reply::text(
						"Your shop is not available anymore; editing stopped.",
					)]);
				};
				let (next, replies) = self.order_edit.handle(&shop, state, &event.kind).await?;
				self.store_or_clear(event.user, next.map(Flow::OrderEdit));
				Ok(replies)
			},
			Flow::ShopRegister(state) => {
				let (next, replies) = self
					.shop_register
					.handle(event.user, state, &event.kind)
					.await?;
				self.store_or_clear(event.user, next.map(Flow::ShopRegister));
				Ok(replies)
			},
			Flow::CourierRegister(state) => {
				let (next, replies) = self
					.courier_register
					.handle(event.user, state, &event.kind)
					.await?;
				self.store_or_clear(event.user, next.map(Flow::CourierRegister));
				Ok(replies)
			},
		}
	}

	async fn start_order_creation(&self, user: UserId) -> Result<Vec<Reply>, DialogError> {
		let Some(shop) = self.shop_for(user).await? else {
			return Ok(vec![Reply::menu(
				"You need a registered shop to create orders.",
				vec![Button::new("Register a shop", "menu:register_shop")],
			)]);
		};
		if !shop.active {
			return Ok(vec![Reply::text(
				"Your shop is awaiting activation by an operator.",
			)]);
		}

		// Geocode the pickup address now so stop 1 can be priced; a miss is
		// tolerated, the flow falls back to manual pricing.
		let _ = self
			.shops
			.ensure_pickup_point(&shop)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;

		let (flow, replies) = self.order_create.start();
		self.sessions.set(user, Flow::OrderCreate(flow));
		info!(user = user, "order creation flow started");
		Ok(replies)
	}

	async fn start_order_edit(&self, user: UserId, order_id: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(shop) = self.shop_for(user).await? else {
			return Ok(vec![Reply::text("You have no registered shop.")]);
		};
		let (flow, replies) = self.order_edit.start(&shop, order_id).await?;
		match flow {
			Some(flow) => self.sessions.set(user, Flow::OrderEdit(flow)),
			None => self.sessions.clear(user),
		}
		Ok(replies)
	}

	async fn list_shop_orders(&self, event: &InboundEvent) -> Result<RouteOutcome, DialogError> {
		let Some(shop) = self.shop_for(event.user).await? else {
			return Ok(RouteOutcome::Handled(to_outbound(
				event.chat,
				vec![Reply::text("You have no registered shop.")],
			)));
		};

		let orders = self
			.orders
			.orders_for_shop(&shop.id)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		if orders.is_empty() {
			return Ok(RouteOutcome::Handled(to_outbound(
				event.chat,
				vec![Reply::text("You have no orders yet.")],
			)));
		}

		let mut replies = Vec::with_capacity(orders.len());
		for order in &orders {
			if order.status == dispatch_types::OrderStatus::New {
				replies.push(Reply::menu(
					order_line(order),
					vec![
						Button::new("Edit", format!("edit:{}", order.id)),
						Button::new("Cancel", format!("cancel:{}", order.id)),
					],
				));
			} else {
				replies.push(Reply::text(order_line(order)));
			}
		}
		Ok(RouteOutcome::Handled(to_outbound(event.chat, replies)))
	}

	async fn list_available_orders(&self, user: UserId) -> Result<Vec<Reply>, DialogError> {
		let Some(_courier) = self.courier_for(user).await? else {
			return Ok(vec![Reply::menu(
				"You need an approved courier profile to take orders.",
				vec![Button::new("Apply as courier", "menu:register_courier")],
			)]);
		};

		let orders = self
			.orders
			.available_orders()
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		if orders.is_empty() {
			return Ok(vec![Reply::text("No open orders right now.")]);
		}

		Ok(orders
			.iter()
			.map(|order| {
				Reply::menu(
					order_line(order),
					vec![Button::new("Take this order", format!("claim:{}", order.id))],
				)
			})
			.collect())
	}

	async fn claim(&self, user: UserId, order_id: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(courier) = self.courier_for(user).await? else {
			return Ok(vec![Reply::text("You have no courier profile.")]);
		};

		let outcome = self
			.orders
			.claim(order_id, &courier)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		Ok(vec![match outcome {
			ClaimOutcome::Claimed(order) => Reply::menu(
				format!(
					"Order is yours: {}. Pick it up at {}.",
					order_line(&order),
					shop_pickup_line(&order)
				),
				vec![Button::new("Picked up", format!("pickup:{}", order.id))],
			),
			ClaimOutcome::NoLongerAvailable => {
				Reply::text("This order is no longer available.")
			},
			ClaimOutcome::CourierInactive => {
				Reply::text("Your profile is not approved for taking orders yet.")
			},
			ClaimOutcome::CapExceeded => {
				Reply::text("You already carry the maximum number of active orders. Finish one first.")
			},
			ClaimOutcome::NotFound => Reply::text("This order no longer exists."),
		}])
	}

	async fn cancel(&self, user: UserId, order_id: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(shop) = self.shop_for(user).await? else {
			return Ok(vec![Reply::text("You have no registered shop.")]);
		};

		let outcome = self
			.orders
			.cancel(order_id, &shop)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		Ok(vec![match outcome {
			CancelOutcome::Cancelled => Reply::text("Order cancelled."),
			CancelOutcome::NotCancellable => {
				Reply::text("This order has already been taken and cannot be cancelled.")
			},
			CancelOutcome::NotFound => Reply::text("This order no longer exists."),
		}])
	}

	async fn pickup(&self, user: UserId, order_id: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(courier) = self.courier_for(user).await? else {
			return Ok(vec![Reply::text("You have no courier profile.")]);
		};

		let outcome = self
			.orders
			.pick_up(order_id, &courier)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		Ok(match outcome {
			ProgressOutcome::Updated(order) => vec![delivery_menu(&order)],
			other => vec![progress_problem(other)],
		})
	}

	async fn return_order(&self, user: UserId, order_id: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(courier) = self.courier_for(user).await? else {
			return Ok(vec![Reply::text("You have no courier profile.")]);
		};

		let outcome = self
			.orders
			.return_order(order_id, &courier)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		Ok(vec![match outcome {
			ProgressOutcome::Updated(_) => Reply::text("Order returned to the shop."),
			other => progress_problem(other),
		}])
	}

	async fn deliver(&self, user: UserId, rest: &str) -> Result<Vec<Reply>, DialogError> {
		let Some(courier) = self.courier_for(user).await? else {
			return Ok(vec![Reply::text("You have no courier profile.")]);
		};
		let Some((order_id, stop)) = rest.rsplit_once(':') else {
			return Ok(vec![Reply::text("This order no longer exists.")]);
		};
		let Ok(stop_number) = stop.parse::<u32>() else {
			return Ok(vec![Reply::text("This order no longer exists.")]);
		};

		let outcome = self
			.orders
			.mark_stop_delivered(order_id, &courier, stop_number)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		Ok(match outcome {
			DeliveryOutcome::StopDelivered(order) => vec![delivery_menu(&order)],
			DeliveryOutcome::Completed(_) => {
				vec![Reply::text("All stops delivered. Order complete, thank you!")]
			},
			DeliveryOutcome::NotFound => vec![Reply::text("This order or stop no longer exists.")],
			DeliveryOutcome::NotAssigned => vec![Reply::text("This order is not assigned to you.")],
			DeliveryOutcome::WrongPhase => {
				vec![Reply::text("Mark the pickup first, then deliver the stops.")]
			},
		})
	}

	fn store_or_clear(&self, user: UserId, flow: Option<Flow>) {
		match flow {
			Some(flow) => self.sessions.set(user, flow),
			None => self.sessions.clear(user),
		}
	}

	async fn shop_for(&self, user: UserId) -> Result<Option<Shop>, DialogError> {
		self.shops
			.shop_for_owner(user)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))
	}

	async fn active_shop(&self, user: UserId) -> Result<Option<Shop>, DialogError> {
		Ok(self.shop_for(user).await?.filter(|s| s.active))
	}

	async fn courier_for(&self, user: UserId) -> Result<Option<Courier>, DialogError> {
		self.couriers
			.courier_for_user(user)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))
	}
}

fn to_outbound(chat: ChatId, replies: Vec<Reply>) -> Vec<OutboundMessage> {
	replies
		.into_iter()
		.map(|reply| OutboundMessage { chat, reply })
		.collect()
}

fn main_menu() -> Reply {
	Reply::menu(
		"What would you like to do?",
		vec![
			Button::new("New order", "menu:new_order"),
			Button::new("My orders", "menu:my_orders"),
			Button::new("Open orders", "menu:available"),
			Button::new("Register a shop", "menu:register_shop"),
			Button::new("Apply as courier", "menu:register_courier"),
		],
	)
}

/// One-line order summary used in lists.
fn order_line(order: &Order) -> String {
	use chrono::Datelike;
	format!(
		"Order {}: {} stop(s) on {:02}.{:02}, total {} [{}]",
		short_id(&order.id),
		order.stops.len(),
		order.delivery_date.day(),
		order.delivery_date.month(),
		order.total_price(),
		order.status
	)
}

fn shop_pickup_line(order: &Order) -> String {
	// The pickup address lives on the shop; couriers get the shop id to
	// look it up in the order card.
	format!("shop {}", short_id(&order.shop_id))
}

/// Per-stop delivery menu for a picked-up order.
fn delivery_menu(order: &Order) -> Reply {
	let buttons = order
		.stops
		.iter()
		.filter(|s| s.status == dispatch_types::StopStatus::Pending)
		.map(|s| {
			Button::new(
				format!("Delivered stop {} ({})", s.number, s.address),
				format!("deliver:{}:{}", order.id, s.number),
			)
		})
		.collect();
	Reply::menu("Mark stops as you deliver them.", buttons)
}

fn progress_problem(outcome: ProgressOutcome) -> Reply {
	match outcome {
		ProgressOutcome::Updated(_) => Reply::text("Done."),
		ProgressOutcome::NotFound => Reply::text("This order no longer exists."),
		ProgressOutcome::NotAssigned => Reply::text("This order is not assigned to you."),
		ProgressOutcome::WrongPhase => Reply::text("This order is not in the right state for that."),
	}
}

fn short_id(id: &str) -> &str {
	id.get(..8).unwrap_or(id)
}
