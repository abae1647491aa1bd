//! Client-side synchronization for a pairchat conversation.
//!
//! [`ConversationView`] is the pure reconciliation state; [`SyncClient`]
//! drives it from a live server by polling snapshots and holding a push
//! connection.

pub mod client;
pub mod error;
pub mod state;

pub use client::{PushHandle, SyncClient};
pub use error::SyncError;
pub use state::{ConversationView, Update};
