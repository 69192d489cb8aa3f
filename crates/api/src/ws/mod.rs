//! The realtime surface: one WebSocket connection per participant/pending
//! entry, dispatched through `handler`. `admission` holds the pending-entry
//! promotion logic shared with the HTTP operator routes; `socket` adapts a
//! live Axum WebSocket to the `SocketHandle` capability the core crate
//! depends on.

pub mod admission;
pub mod handler;
pub mod socket;
