//! Dialog flow state machines.
//!
//! Each flow is a small finite-state machine: an enumerated step plus the
//! fields accumulated so far. Handlers consume one inbound event, validate
//! it against the current step, and either re-prompt (validation failure
//! never advances or rolls back), advance to the next step, or finish the
//! flow by persisting its aggregate. A finished flow returns `None` state,
//! which the router turns into a cleared session.

pub mod courier_register;
pub mod order_create;
pub mod order_edit;
pub mod shop_register;

/// Number of characters in a trimmed string.
pub(crate) fn char_len(s: &str) -> usize {
	s.trim().chars().count()
}
