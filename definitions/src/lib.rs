//! Maps the SSH protocol definitions into the Rust type system.
//!
//! This includes
//! - constants defined in the RFCs ([`consts`] module)
//! - parsers and writers for the basic data types in SSH packets ([`parse`] and [`mod@write`]
//!   modules)
//! - the traits describing the pluggable algorithm categories along with their type erased
//!   registry entries ([`algorithms`] module)

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub use message_group::MessageGroup;
pub use parse::{Parse, ParseError, ParsedValue};
pub use write::Compose;

mod message_group;

pub mod algorithms;
pub mod consts;
pub mod parse;
pub mod write;

/// An implementation detail to allow using trait objects that implement `RngCore` and `CryptoRng`.
// TODO: eventually remove this, if https://github.com/rust-random/rand/issues/1143 lands
pub trait CryptoRngCore: rand::RngCore + rand::CryptoRng {}

impl<T: rand::RngCore + rand::CryptoRng> CryptoRngCore for T {}
