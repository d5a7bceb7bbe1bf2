//! Remote-control client for a media player exposing a JSON-RPC plugin.
//!
//! [`rpc::RpcClient`] is the typed call surface.  [`core::RemoteSession`]
//! runs the push-driven side: subscription loops feeding a single-owner
//! event loop that mirrors player state into menus and paginated lists.
pub mod core;
pub mod error;
pub mod list_tracker;
pub mod menu;
pub mod mirror;
pub mod progress;
pub mod rpc;
pub mod subscription;
pub mod transport;

pub use error::{RemoteError, RemoteResult};
pub use rpc::RpcClient;
pub use transport::{CallMode, HttpTransport, Transport};
