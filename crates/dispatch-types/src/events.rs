//! Chat event types at the transport boundary.
//!
//! The chat transport delivers inbound events tagged with user and chat
//! identity; the dialog layer answers with outbound replies. Message
//! formatting and the transport protocol itself are out of scope.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Conversation identity on the chat platform.
pub type ChatId = i64;

/// One inbound event from the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
	/// User who produced the event.
	pub user: UserId,
	/// Conversation the event arrived in.
	pub chat: ChatId,
	/// What the user actually did.
	pub kind: EventKind,
}

/// The shape of an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
	/// Free-form text message.
	Text(String),
	/// Inline-button press carrying the button's data payload.
	Button(String),
	/// Shared-contact attachment carrying a phone number.
	Contact { phone: String },
	/// Photo attachment carrying the platform file id.
	Photo { file_id: String },
}

/// One outbound reply toward the chat transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
	/// Plain text message.
	Text(String),
	/// Text message with an inline button menu.
	Menu { text: String, buttons: Vec<Button> },
}

impl Reply {
	pub fn text(text: impl Into<String>) -> Self {
		Reply::Text(text.into())
	}

	pub fn menu(text: impl Into<String>, buttons: Vec<Button>) -> Self {
		Reply::Menu {
			text: text.into(),
			buttons,
		}
	}
}

/// An inline button: user-visible label plus opaque callback data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
	pub label: String,
	pub data: String,
}

impl Button {
	pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			data: data.into(),
		}
	}
}

/// An outbound message bound to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
	pub chat: ChatId,
	pub reply: Reply,
}
