//! Wire types, configuration and platform paths shared by the remote client.

pub mod config;
pub mod format;
pub mod platform;
pub mod protocol;
