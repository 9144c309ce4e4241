//! Keyword-driven auto-replies over inbound chat text, with a short-lived
//! per-phone session cache for numbered short-hand flows.

pub mod engine;
pub mod session;

pub use {
    engine::AutoReplyEngine,
    session::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, SessionCache},
};
