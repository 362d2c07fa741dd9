//! Core domain services for the dispatch system.
//!
//! This crate owns the durable business objects and the rules that move
//! them: order creation and lifecycle, the concurrency-safe courier claim
//! protocol, shop and courier registration, and the chain re-pricing that
//! follows an address edit. The dialog layer drives these services; they in
//! turn drive storage, pricing, and the external gateways.

pub mod courier;
pub mod order;
pub mod shop;
pub mod state;

pub use courier::{CourierService, CourierServiceError};
pub use order::{
	CancelOutcome, ClaimOutcome, DeliveryOutcome, EditOutcome, OrderService, OrderServiceError,
	ProgressOutcome,
};
pub use shop::{ShopService, ShopServiceError};
pub use state::{OrderStateError, OrderStateMachine};
