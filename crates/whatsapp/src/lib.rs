//! Persistent WhatsApp Web session: connection lifecycle, credential
//! persistence, inbound event ingestion and the session send adapter.

pub mod creds;
pub mod events;
pub mod ingest;
pub mod manager;
pub mod outbound;
pub mod socket;

pub use {
    creds::CredentialStore,
    ingest::{IngestOutcome, IngestPipeline, ReplyHook, SkipReason},
    manager::{ConnectionManager, RetryPolicy},
    outbound::SessionOutbound,
    socket::{BridgeSocket, Transport},
};
