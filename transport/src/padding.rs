//! Aids with customization of the padding lengths for outgoing packets.

use definitions::CryptoRngCore;
use rand::distributions::Distribution as _;
use rand_distr::Gamma;

use crate::constants::MAX_EXTRA_PADDING_BLOCKS;

/// Defines a padding length distribution.
///
/// It is a function that, given a random number generator, will return the number of
/// additional (non-needed) "blocks" of padding that are to be used.
///
/// A "block" of padding refers to `n` bytes of random padding, where `n` is either the
/// cipher block size or `8`, whichever is larger, as defined in
/// [RFC4253](https://tools.ietf.org/html/rfc4253#section-6).
///
/// Randomizing this number makes it harder for attackers to infer anything about the
/// content by observing the packet lengths.
/// However more random padding also increases the required network capacity.
/// The default random padding distribution tries to balance these two aspects.
///
/// If the returned value would result in a padding that is too large to hold in the
/// `padding_length` field of a packet, it will be cropped to be small enough. Therefore
/// any value returned by these functions is a valid one.
pub type PaddingLengthDistribution = dyn FnMut(&mut dyn CryptoRngCore) -> u8;

/// Returns the distribution for padding lengths to be used by default.
///
/// Roughly 44% of packets get no extra padding, 25% get one extra block, with quickly
/// falling probabilities for longer paddings (99% of packets have at most 11 extra
/// blocks).
pub fn default_distribution() -> Box<PaddingLengthDistribution> {
    let gamma = Gamma::new(0.5, 3.0).expect("distribution parameters are valid");

    Box::new(move |rng| {
        let mut float = gamma.sample(rng);
        while float > MAX_EXTRA_PADDING_BLOCKS as f64 {
            float = gamma.sample(rng);
        }

        // Make sure it's a valid u8
        float.clamp(0.0, 0xff as f64).round() as u8
    })
}

/// Returns the distribution that always results in the minimum padding length.
pub fn zero_distribution() -> Box<PaddingLengthDistribution> {
    Box::new(|_| 0)
}
