//! Provides the algorithm implementations used by the SSH transport layer.
//!
//! Every algorithm lives behind a cargo feature named after its wire name, so unneeded
//! implementations and their dependencies can be compiled out.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub mod compression;
pub mod encryption;
pub mod host_key;
pub mod key_exchange;
pub mod mac;
