//! Courier registration flow.
//!
//! Collects the full name, a shared-contact attachment for the phone, and
//! a photo attachment (selfie with an identity document), then persists a
//! pending courier profile for an operator to approve.

use super::char_len;
use crate::DialogError;
use dispatch_core::CourierService;
use dispatch_types::{EventKind, Reply, UserId};
use std::sync::Arc;
use tracing::warn;

/// Steps of the courier registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierStep {
	Name,
	AwaitContact,
	AwaitPhoto,
}

/// Accumulated state of one courier registration.
#[derive(Debug, Clone)]
pub struct CourierRegisterFlow {
	pub step: CourierStep,
	pub full_name: Option<String>,
	pub phone: Option<String>,
}

/// Handler driving the courier registration flow.
pub struct CourierRegisterHandler {
	couriers: Arc<CourierService>,
}

impl CourierRegisterHandler {
	pub fn new(couriers: Arc<CourierService>) -> Self {
		Self { couriers }
	}

	/// Starts a fresh registration.
	pub fn start(&self) -> (CourierRegisterFlow, Vec<Reply>) {
		(
			CourierRegisterFlow {
				step: CourierStep::Name,
				full_name: None,
				phone: None,
			},
			vec![Reply::text("Enter your full name (3-255 characters).")],
		)
	}

	/// Feeds one event into the flow.
	pub async fn handle(
		&self,
		user: UserId,
		mut flow: CourierRegisterFlow,
		event: &EventKind,
	) -> Result<(Option<CourierRegisterFlow>, Vec<Reply>), DialogError> {
		match flow.step {
			CourierStep::Name => match event {
				EventKind::Text(text) if (3..=255).contains(&char_len(text)) => {
					flow.full_name = Some(text.trim().to_string());
					flow.step = CourierStep::AwaitContact;
					Ok((
						Some(flow),
						vec![Reply::text(
							"Share your contact (the attach button), so we have a phone number on file.",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text("Please enter your full name, 3 to 255 characters.")],
				)),
			},
			CourierStep::AwaitContact => match event {
				EventKind::Contact { phone } => {
					flow.phone = Some(phone.clone());
					flow.step = CourierStep::AwaitPhoto;
					Ok((
						Some(flow),
						vec![Reply::text(
							"Now send a photo of yourself holding your identity document.",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text(
						"Please use the contact attachment to share your phone number.",
					)],
				)),
			},
			CourierStep::AwaitPhoto => match event {
				EventKind::Photo { file_id } => {
					let (Some(full_name), Some(phone)) = (flow.full_name.clone(), flow.phone.clone())
					else {
						warn!(user = user, "courier registration lost its fields, resetting");
						return Ok((
							None,
							vec![Reply::text("Something went wrong, please start over.")],
						));
					};

					self.couriers
						.register(user, full_name, phone, file_id.clone())
						.await
						.map_err(|e| DialogError::Service(e.to_string()))?;
					Ok((
						None,
						vec![Reply::text(
							"Application received. You will be able to take orders once an operator approves you.",
						)],
					))
				},
				_ => Ok((
					Some(flow),
					vec![Reply::text(
						"Please send a photo of yourself with your identity document.",
					)],
				)),
			},
		}
	}
}
