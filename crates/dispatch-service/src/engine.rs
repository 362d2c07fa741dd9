//! Service event loop.

use crate::transport::ChatTransport;
use dispatch_dialog::{RouteOutcome, Router};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Drives the dialog router from a chat transport until the transport
/// closes.
pub struct DispatchService {
	router: Router,
	transport: Arc<dyn ChatTransport>,
}

impl DispatchService {
	pub fn new(router: Router, transport: Arc<dyn ChatTransport>) -> Self {
		Self { router, transport }
	}

	/// Consumes inbound events one at a time.
	///
	/// A routing failure is logged and the loop continues; one user's bad
	/// turn must not take the service down for everyone else.
	pub async fn run(&self) {
		while let Some(event) = self.transport.next_event().await {
			match self.router.route(&event).await {
				Ok(RouteOutcome::Handled(messages)) => {
					for message in messages {
						if let Err(e) = self.transport.send(message).await {
							warn!(error = %e, "outbound send failed, stopping");
							return;
						}
					}
				},
				Ok(RouteOutcome::NotHandled) => {
					debug!(user = event.user, "event not handled");
				},
				Err(e) => {
					error!(user = event.user, error = %e, "routing failed");
				},
			}
		}
	}
}
