//! Core seams of the chat-network integration.
//!
//! This crate holds the shared types and traits the components plug into:
//! the durable message record and its store, the outbound send capability
//! implemented by both transport adapters, event/connection observers, and
//! the external CRM capabilities (leads, officers, products, bookings) the
//! core consumes but does not own.

pub mod directory;
pub mod error;
pub mod message;
pub mod outbound;

pub use {
    directory::{
        Booking, BookingDirectory, Caller, Lead, LeadDirectory, Officer, OfficerDirectory,
        Product, ProductCatalog,
    },
    error::{Error, Result},
    message::{
        Direction, InsertOutcome, Message, MessageFilter, MessageStats, MessageStore, NewMessage,
        Page, ThreadKey, ThreadRow,
    },
    outbound::{
        ConnectionObserver, ConnectionStatus, MessageEvent, MessageEventSink, Outbound,
        SendOutcome, SendPayload,
    },
};
