//! Webhook delivery for chat-driven order management.
//!
//! This crate connects the pure request/response types in `chatorder-core` to
//! the order backend:
//! - `dispatcher` sends one request with the shared-secret header and retries
//!   transient failures within a bounded deadline
//! - `turn` runs a whole conversational turn, from extracted fields to the
//!   reply shown to the customer
//!
//! The extraction model only translates chat text into fields. Order codes,
//! totals and stock levels in replies always come from the backend.

pub mod dispatcher;
pub mod turn;

pub use dispatcher::{
    Delivered, DispatchError, OrderWebhook, WebhookDispatcher, WEBHOOK_SECRET_HEADER,
};
pub use turn::{OrderTurnHandler, TurnReply, TurnStatus};
