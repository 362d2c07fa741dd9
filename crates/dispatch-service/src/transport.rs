//! Chat transport boundary.
//!
//! The service is platform-agnostic: a transport feeds it inbound events
//! and accepts outbound messages, and everything about the actual chat
//! protocol stays on the other side of this trait. `ChannelTransport` is
//! the embedding-friendly implementation a platform adapter connects to;
//! `ConsoleTransport` drives the service from a terminal for local
//! exercise.

use async_trait::async_trait;
use dispatch_types::{EventKind, InboundEvent, OutboundMessage, Reply};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, Mutex};

/// Errors from the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("Transport closed")]
	Closed,
}

/// Source of inbound chat events and sink for outbound messages.
#[async_trait]
pub trait ChatTransport: Send + Sync {
	/// Waits for the next inbound event; `None` means the transport shut down.
	async fn next_event(&self) -> Option<InboundEvent>;

	/// Delivers one outbound message.
	async fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// In-process transport backed by bounded channels.
pub struct ChannelTransport {
	inbound: Mutex<mpsc::Receiver<InboundEvent>>,
	outbound: mpsc::Sender<OutboundMessage>,
}

impl ChannelTransport {
	/// Creates a transport plus the adapter-side channel ends.
	pub fn new(
		capacity: usize,
	) -> (
		Self,
		mpsc::Sender<InboundEvent>,
		mpsc::Receiver<OutboundMessage>,
	) {
		let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
		let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
		(
			Self {
				inbound: Mutex::new(inbound_rx),
				outbound: outbound_tx,
			},
			inbound_tx,
			outbound_rx,
		)
	}
}

#[async_trait]
impl ChatTransport for ChannelTransport {
	async fn next_event(&self) -> Option<InboundEvent> {
		self.inbound.lock().await.recv().await
	}

	async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
		self.outbound
			.send(message)
			.await
			.map_err(|_| TransportError::Closed)
	}
}

/// Terminal transport for local exercise.
///
/// Every line becomes a text event from user 1. Three prefixes stand in
/// for platform attachments: `button <data>` presses an inline button,
/// `contact <phone>` shares a contact, `photo <file-id>` sends a photo.
pub struct ConsoleTransport {
	lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleTransport {
	const USER: i64 = 1;

	pub fn new() -> Self {
		Self {
			lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
		}
	}

	fn parse(line: &str) -> EventKind {
		if let Some(data) = line.strip_prefix("button ") {
			EventKind::Button(data.trim().to_string())
		} else if let Some(phone) = line.strip_prefix("contact ") {
			EventKind::Contact {
				phone: phone.trim().to_string(),
			}
		} else if let Some(file_id) = line.strip_prefix("photo ") {
			EventKind::Photo {
				file_id: file_id.trim().to_string(),
			}
		} else {
			EventKind::Text(line.to_string())
		}
	}
}

impl Default for ConsoleTransport {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
	async fn next_event(&self) -> Option<InboundEvent> {
		loop {
			let line = self.lines.lock().await.next_line().await.ok().flatten()?;
			let trimmed = line.trim();
			if trimmed.is_empty() {
				continue;
			}
			return Some(InboundEvent {
				user: Self::USER,
				chat: Self::USER,
				kind: Self::parse(trimmed),
			});
		}
	}

	async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
		match message.reply {
			Reply::Text(text) => println!("{}", text),
			Reply::Menu { text, buttons } => {
				println!("{}", text);
				for button in buttons {
					println!("  [{}] -> button {}", button.label, button.data);
				}
			},
		}
		Ok(())
	}
}
