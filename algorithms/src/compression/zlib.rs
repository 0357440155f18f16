//! Provides implementations of the "zlib" and "zlib@openssh.com" compression
//! algorithms.
//!
//! Both share the same RFC 1950 stream format and keep their dictionary alive across
//! packets, each packet ending on a partial flush boundary so the receiver can
//! decompress it without seeing the rest of the stream. They differ only in when they
//! become active: plain "zlib" compresses from the first packet after negotiation,
//! while "zlib@openssh.com" stays inert until the authentication layer reports success.
//! That activation is a transport layer concern, so the implementations here are
//! identical apart from their names.

use definitions::algorithms::CompressionAlgorithm;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};
use std::{borrow::Cow, error::Error, fmt};

/// The granularity by which output buffers grow when they run out of space.
const BUF_GROWTH: usize = 4096;

macro_rules! impl_zlib {
    ($name_str:expr, $name:ident) => {
        #[doc = concat!("Implements the `", $name_str, "` compression algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        pub struct $name {
            /// The streaming compressor state for the outgoing direction.
            compress: Compress,
            /// The streaming decompressor state for the incoming direction.
            decompress: Decompress,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` compression algorithm.")]
            pub fn new() -> $name {
                $name {
                    compress: Compress::new(Compression::default(), true),
                    decompress: Decompress::new(true),
                }
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                // The streaming states carry no information worth printing
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl CompressionAlgorithm for $name {
            const NAME: &'static str = $name_str;

            fn compress<'data>(&mut self, data: Cow<'data, [u8]>) -> Cow<'data, [u8]> {
                let mut output = Vec::with_capacity(data.len() + 64);
                let mut consumed = 0;

                // A partial flush ends the packet on a boundary the peer can decode.
                loop {
                    let before = self.compress.total_in() as usize;
                    self.compress
                        .compress_vec(&data[consumed..], &mut output, FlushCompress::Partial)
                        .expect("the compression stream stays consistent");
                    consumed += self.compress.total_in() as usize - before;

                    if consumed == data.len() && output.len() < output.capacity() {
                        break;
                    }

                    output.reserve(BUF_GROWTH);
                }

                Cow::Owned(output)
            }

            fn decompress<'data>(
                &mut self,
                data: Cow<'data, [u8]>,
            ) -> Result<Cow<'data, [u8]>, Box<dyn Error>> {
                let mut output = Vec::with_capacity(data.len() * 2 + 64);
                let mut consumed = 0;

                loop {
                    let before = self.decompress.total_in() as usize;
                    self.decompress
                        .decompress_vec(&data[consumed..], &mut output, FlushDecompress::None)
                        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
                    consumed += self.decompress.total_in() as usize - before;

                    if consumed == data.len() && output.len() < output.capacity() {
                        break;
                    }

                    output.reserve(BUF_GROWTH);
                }

                Ok(Cow::Owned(output))
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(feature = "zlib")]
impl_zlib!("zlib", Zlib);

#[cfg(feature = "zlib_at_openssh_com")]
impl_zlib!("zlib@openssh.com", ZlibOpenSsh);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut sender = Zlib::new();
        let mut receiver = Zlib::new();

        let payload = b"a payload that is long enough to actually benefit from compression \
                        because it repeats itself, repeats itself, repeats itself";

        let compressed = sender.compress(Cow::Borrowed(&payload[..]));
        assert!(compressed.len() < payload.len());

        let decompressed = receiver.decompress(compressed).unwrap();
        assert_eq!(&decompressed[..], &payload[..]);
    }

    /// The dictionary survives between packets, so the second packet must be decodable
    /// only in stream order.
    #[test]
    fn consecutive_packets_share_the_stream() {
        let mut sender = Zlib::new();
        let mut receiver = Zlib::new();

        let first = b"first message with some shared words";
        let second = b"second message with some shared words";

        let compressed_first = sender.compress(Cow::Borrowed(&first[..]));
        let compressed_second = sender.compress(Cow::Borrowed(&second[..]));

        assert_eq!(
            &receiver.decompress(compressed_first).unwrap()[..],
            &first[..]
        );
        assert_eq!(
            &receiver.decompress(compressed_second).unwrap()[..],
            &second[..]
        );
    }

    #[test]
    fn tiny_payload() {
        let mut sender = ZlibOpenSsh::new();
        let mut receiver = ZlibOpenSsh::new();

        let compressed = sender.compress(Cow::Borrowed(&b"\x05"[..]));
        let decompressed = receiver.decompress(compressed).unwrap();

        assert_eq!(&decompressed[..], b"\x05");
    }
}
