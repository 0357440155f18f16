//! Defines the boundary to the host key trust decision.
//!
//! The transport layer verifies that the server holds the private half of the host key
//! it presented (the signature over the exchange hash), but whether that key *belongs*
//! to the server being dialed is a policy question answered outside this crate, by an
//! implementation of [`HostKeyVerifier`] (typically backed by a known-hosts store).

/// The decision of a host key verifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    /// The key is trusted for this peer.
    Accept,
    /// The key is not trusted for this peer.
    ///
    /// The connection is aborted before any derived keys are used.
    Reject,
}

/// Decides whether a host key presented by a peer should be trusted.
pub trait HostKeyVerifier {
    /// Decides whether `key_blob` is trusted for `peer`.
    ///
    /// `peer` is the identity under which the connection was dialed (typically
    /// `host:port`) and `key_blob` is the SSH wire encoding of the presented public key.
    ///
    /// This is invoked once per completed key exchange, including re-keys.
    fn verify(&mut self, peer: &str, key_blob: &[u8]) -> Verdict;

    /// Returns the host key algorithm names already trusted for `peer`.
    ///
    /// These are floated to the front of the local host key preference list during
    /// negotiation, which avoids unnecessary trust prompts for keys the verifier has
    /// never seen.
    fn trusted_algorithms(&mut self, _peer: &str) -> Vec<&'static str> {
        Vec::new()
    }
}

/// A verifier that accepts every key for every peer.
///
/// This provides no protection against man-in-the-middle attacks and should only be
/// used in tests or for deliberately opportunistic connections.
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct AcceptAllVerifier {}

impl AcceptAllVerifier {
    /// Creates a new verifier that accepts every key.
    pub fn new() -> AcceptAllVerifier {
        AcceptAllVerifier {}
    }
}

impl HostKeyVerifier for AcceptAllVerifier {
    fn verify(&mut self, _peer: &str, _key_blob: &[u8]) -> Verdict {
        Verdict::Accept
    }
}
