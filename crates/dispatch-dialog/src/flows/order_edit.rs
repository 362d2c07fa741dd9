//! Order editing flow.
//!
//! Only unclaimed orders can be edited. The shop picks a stop (skipped for
//! single-stop orders), picks a field, and supplies the new value. Address
//! edits go through the core service, which re-geocodes the stop and
//! re-prices every later leg of the chain; date edits are a two-button
//! choice with no pricing impact.

use super::char_len;
use crate::DialogError;
use chrono::{Datelike, Local, NaiveDate};
use dispatch_core::{EditOutcome, OrderService};
use dispatch_types::{Button, EventKind, Order, Reply, Shop};
use std::sync::Arc;
use tracing::info;

/// Which stop field is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
	Address,
	Phone,
	Comment,
}

/// Steps of the order editing flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
	ChooseStop,
	ChooseField,
	AwaitValue(EditField),
	ChooseDate,
}

/// Accumulated state of one edit.
#[derive(Debug, Clone)]
pub struct OrderEditFlow {
	pub order_id: String,
	pub stop_number: Option<u32>,
	pub step: EditStep,
}

/// Handler driving the order editing flow.
pub struct OrderEditHandler {
	orders: Arc<OrderService>,
}

impl OrderEditHandler {
	pub fn new(orders: Arc<OrderService>) -> Self {
		Self { orders }
	}

	/// Starts editing an order the shop owns.
	///
	/// Returns no flow when the order cannot be edited (already claimed,
	/// not found, or foreign); the replies explain why.
	pub async fn start(
		&self,
		shop: &Shop,
		order_id: &str,
	) -> Result<(Option<OrderEditFlow>, Vec<Reply>), DialogError> {
		let order = self
			.orders
			.get_order(order_id)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;

		let Some(order) = order else {
			return Ok((None, vec![Reply::text("That order no longer exists.")]));
		};
		if order.shop_id != shop.id {
			return Ok((None, vec![Reply::text("That order is not yours to edit.")]));
		}
		if order.status != dispatch_types::OrderStatus::New {
			return Ok((
				None,
				vec![Reply::text(
					"A courier has already taken this order; it can no longer be edited.",
				)],
			));
		}

		if order.is_multi_stop() {
			Ok((
				Some(OrderEditFlow {
					order_id: order_id.to_string(),
					stop_number: None,
					step: EditStep::ChooseStop,
				}),
				vec![stop_menu(&order)],
			))
		} else {
			Ok((
				Some(OrderEditFlow {
					order_id: order_id.to_string(),
					stop_number: Some(1),
					step: EditStep::ChooseField,
				}),
				vec![field_menu()],
			))
		}
	}

	/// Feeds one event into the flow.
	pub async fn handle(
		&self,
		shop: &Shop,
		mut flow: OrderEditFlow,
		event: &EventKind,
	) -> Result<(Option<OrderEditFlow>, Vec<Reply>), DialogError> {
		match flow.step {
			EditStep::ChooseStop => match event {
				EventKind::Button(data) => match data.strip_prefix("editstop:") {
					Some(n) => match n.parse::<u32>() {
						Ok(n) => {
							flow.stop_number = Some(n);
							flow.step = EditStep::ChooseField;
							Ok((Some(flow), vec![field_menu()]))
						},
						Err(_) => self.reprompt_stops(flow).await,
					},
					None => self.reprompt_stops(flow).await,
				},
				_ => self.reprompt_stops(flow).await,
			},
			EditStep::ChooseField => match event {
				EventKind::Button(data) => match data.as_str() {
					"editfield:address" => {
						flow.step = EditStep::AwaitValue(EditField::Address);
						Ok((
							Some(flow),
							vec![Reply::text("Enter the new delivery address (at least 10 characters).")],
						))
					},
					"editfield:phone" => {
						flow.step = EditStep::AwaitValue(EditField::Phone);
						Ok((
							Some(flow),
							vec![Reply::text("Enter the new recipient phone (at least 5 characters).")],
						))
					},
					"editfield:comment" => {
						flow.step = EditStep::AwaitValue(EditField::Comment);
						Ok((
							Some(flow),
							vec![Reply::text("Enter the new courier comment, or /skip to clear it.")],
						))
					},
					"editfield:date" => {
						flow.step = EditStep::ChooseDate;
						Ok((Some(flow), vec![date_menu()]))
					},
					_ => Ok((Some(flow), vec![field_menu()])),
				},
				_ => Ok((Some(flow), vec![field_menu()])),
			},
			EditStep::AwaitValue(field) => match event {
				EventKind::Text(text) => self.apply_value(shop, flow, field, text).await,
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please send the new value as text.")],
				)),
			},
			EditStep::ChooseDate => match event {
				EventKind::Button(data) if data == "date:today" || data == "date:tomorrow" => {
					let today = Local::now().date_naive();
					let date: Option<NaiveDate> = if data == "date:today" {
						Some(today)
					} else {
						today.succ_opt()
					};
					let Some(date) = date else {
						return Ok((Some(flow), vec![date_menu()]));
					};

					let outcome = self
						.orders
						.edit_delivery_date(&flow.order_id, shop, date)
						.await
						.map_err(|e| DialogError::Service(e.to_string()))?;
					match outcome {
						EditOutcome::Updated(order) => Ok((
							None,
							vec![Reply::text(format!(
								"Delivery date changed to {:02}.{:02}.",
								order.delivery_date.day(),
								order.delivery_date.month()
							))],
						)),
						_ => Ok((None, vec![cannot_edit_reply()])),
					}
				},
				_ => Ok((Some(flow), vec![date_menu()])),
			},
		}
	}

	async fn apply_value(
		&self,
		shop: &Shop,
		flow: OrderEditFlow,
		field: EditField,
		text: &str,
	) -> Result<(Option<OrderEditFlow>, Vec<Reply>), DialogError> {
		let stop_number = flow.stop_number.unwrap_or(1);
		let value = text.trim();

		let outcome = match field {
			EditField::Address => {
				if char_len(value) < 10 {
					return Ok((
						Some(flow),
						vec![Reply::text("Please enter the full address, at least 10 characters.")],
					));
				}
				self.orders
					.edit_stop_address(&flow.order_id, shop, stop_number, value.to_string())
					.await
			},
			EditField::Phone => {
				if char_len(value) < 5 {
					return Ok((
						Some(flow),
						vec![Reply::text("Please enter a phone number, at least 5 characters.")],
					));
				}
				self.orders
					.edit_stop_phone(&flow.order_id, shop, stop_number, value.to_string())
					.await
			},
			EditField::Comment => {
				let comment = if value == "/skip" {
					None
				} else {
					Some(value.to_string())
				};
				self.orders
					.edit_stop_comment(&flow.order_id, shop, stop_number, comment)
					.await
			},
		}
		.map_err(|e| DialogError::Service(e.to_string()))?;

		match outcome {
			EditOutcome::Updated(order) => {
				info!(order_id = %order.id, stop = stop_number, "order edited");
				Ok((
					None,
					vec![Reply::text(format!(
						"Updated. Order total is now {}.",
						order.total_price()
					))],
				))
			},
			EditOutcome::AddressKeptUnpriced { order, region } => {
				let reason = match region {
					Some(region) => format!("it resolves to {}, outside our zone", region),
					None => "it could not be found on the map".to_string(),
				};
				Ok((
					None,
					vec![Reply::text(format!(
						"Address text saved, but {}; the previous price ({}) was kept.",
						reason,
						order.total_price()
					))],
				))
			},
			EditOutcome::NotFound => Ok((None, vec![Reply::text("That order or stop no longer exists.")])),
			EditOutcome::NotEditable => Ok((None, vec![cannot_edit_reply()])),
		}
	}

	async fn reprompt_stops(
		&self,
		flow: OrderEditFlow,
	) -> Result<(Option<OrderEditFlow>, Vec<Reply>), DialogError> {
		let order = self
			.orders
			.get_order(&flow.order_id)
			.await
			.map_err(|e| DialogError::Service(e.to_string()))?;
		match order {
			Some(order) => Ok((Some(flow), vec![stop_menu(&order)])),
			None => Ok((None, vec![Reply::text("That order no longer exists.")])),
		}
	}
}

fn stop_menu(order: &Order) -> Reply {
	let buttons = order
		.stops
		.iter()
		.map(|s| {
			Button::new(
				format!("Stop {}: {}", s.number, s.recipient_name),
				format!("editstop:{}", s.number),
			)
		})
		.collect();
	Reply::menu("Which stop do you want to edit?", buttons)
}

fn field_menu() -> Reply {
	Reply::menu(
		"What do you want to change?",
		vec![
			Button::new("Address", "editfield:address"),
			Button::new("Phone", "editfield:phone"),
			Button::new("Comment", "editfield:comment"),
			Button::new("Delivery date", "editfield:date"),
		],
	)
}

fn date_menu() -> Reply {
	Reply::menu(
		"New delivery date?",
		vec![
			Button::new("Today", "date:today"),
			Button::new("Tomorrow", "date:tomorrow"),
		],
	)
}

fn cannot_edit_reply() -> Reply {
	Reply::text("This order can no longer be edited.")
}
