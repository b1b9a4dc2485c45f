//! pollsync-channel: push-channel plumbing for live poll updates.
//!
//! - [`connection::WsConnection`]: the single process-wide WebSocket
//!   connection, reconnecting on its own.
//! - [`session::SessionChannel`]: binds one poll code to that connection
//!   with idempotent join/leave and replay after reconnect.
//! - [`transport::PushTransport`]: the capability seam between the two.

pub mod connection;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::ChannelError;
pub use session::SessionChannel;
pub use transport::{Link, PushTransport};
