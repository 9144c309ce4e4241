//! Cloud-hosted business API transport: webhook verification/parsing on the
//! inbound side, the Graph-style HTTP send adapter on the outbound side.

pub mod api;
pub mod types;
pub mod webhook;

pub use {
    api::BusinessApiOutbound,
    types::WebhookPayload,
    webhook::{extract_messages, verify_signature, verify_webhook_subscription},
};
