//! Mounts a WebHDFS-compatible remote namespace as a local FUSE filesystem.
//!
//! The crate is split along the three concerns described in the design: a
//! typed [`remote`] client for the namenode/datanode HTTP protocol, a
//! [`cache`] that stages one open file's bytes on local disk, and an
//! [`adapter`] that wires both of those into a `fuser::Filesystem`
//! implementation with POSIX permission checks and identity translation.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod identity;
pub mod remote;
