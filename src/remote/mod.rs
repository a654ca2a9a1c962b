//! Typed client for the remote namenode/datanode HTTP namespace protocol.

pub mod client;
pub mod error;
pub mod model;

pub use client::RemoteClient;
pub use error::RemoteError;
pub use model::{FileKind, RemoteChecksum, RemoteFileStatus};
