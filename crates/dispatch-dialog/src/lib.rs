//! Conversational order intake.
//!
//! This crate turns raw chat events into order, shop, and courier
//! operations. Each user has at most one active flow (a small state
//! machine accumulating one multi-step conversation); the router decides
//! whether an event starts a flow, runs a standalone action, or continues
//! whatever the user was doing.

pub mod flows;
pub mod router;
pub mod session;

use thiserror::Error;

/// Errors from the dialog layer.
///
/// Almost everything a user can do wrong is a re-prompt, not an error;
/// this surfaces only failures of the services underneath.
#[derive(Debug, Error)]
pub enum DialogError {
	#[error("Service error: {0}")]
	Service(String),
}

pub use flows::courier_register::{CourierRegisterFlow, CourierRegisterHandler};
pub use flows::order_create::{OrderCreateFlow, OrderCreateHandler};
pub use flows::order_edit::{OrderEditFlow, OrderEditHandler};
pub use flows::shop_register::{ShopRegisterFlow, ShopRegisterHandler};
pub use router::{RouteOutcome, Router};
pub use session::{Flow, SessionStore};
