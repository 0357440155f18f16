//! Writer functions for the SSH wire primitives and a `Compose` trait to abstract over
//! writable types.
//!
//! The primitive data types are described in
//! [RFC 4251 pages 8-10](https://tools.ietf.org/html/rfc4251#page-8).

use std::io::{self, Write};

// All the primitive writers in this module are `#[inline]`, because they are small and will
// likely be combined and chained frequently in `Compose` implementations.

/// Allows implementors to be written to an output [`std::io::Write`].
pub trait Compose: Sized {
    /// Writes `self` to `output`.
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()>;

    /// Writes `self` to a new `Vec`.
    fn compose_to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::new();

        self.compose(&mut vec).expect("vec writes don't fail");

        vec
    }
}

/// Writes `input.len()` bytes to the output.
#[inline]
pub fn bytes(input: &[u8], output: &mut impl Write) -> io::Result<()> {
    output.write_all(input)
}

/// Writes a single byte to the output.
#[inline]
pub fn byte(input: u8, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&[input][..])
}

/// Writes a boolean to the output.
///
/// A boolean is stored as a single byte, `0` for `false` and `1` for `true`.
#[inline]
pub fn boolean(input: bool, output: &mut impl Write) -> io::Result<()> {
    byte(input.into(), output)
}

/// Writes a uint32 to the output.
///
/// Stored as four bytes in network byte order.
#[inline]
pub fn uint32(input: u32, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&input.to_be_bytes()[..])
}

/// Writes a uint64 to the output.
///
/// Stored as eight bytes in network byte order.
#[inline]
pub fn uint64(input: u64, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&input.to_be_bytes()[..])
}

/// Writes a string to the output.
///
/// An arbitrary length binary string, stored as a uint32 length followed by that many
/// bytes of data.
///
/// # Panics
/// This function will panic for input slices longer than `u32::MAX`, as that is the
/// longest value representable by an SSH string.
#[inline]
pub fn string(input: &[u8], output: &mut impl Write) -> io::Result<()> {
    let len: u32 = input
        .len()
        .try_into()
        .expect("input string fits into an ssh string");

    uint32(len, output)?;
    bytes(input, output)
}

/// Writes an mpint to the output.
///
/// A multiple precision integer in two's complement format, stored as a string, MSB
/// first, without unnecessary leading `0` or `255` bytes. The value zero is stored as an
/// empty string.
#[inline]
pub fn mpint(input: &num_bigint::BigInt, output: &mut impl Write) -> io::Result<()> {
    let vec = if input.sign() == num_bigint::Sign::NoSign {
        Vec::new()
    } else {
        input.to_signed_bytes_be()
    };

    string(&vec[..], output)
}

/// Writes a name-list to the output.
///
/// A string containing a comma-separated list of names.
///
/// # Panics
/// This function will panic if the total list length does not fit into a `u32`.
#[inline]
pub fn name_list<T: AsRef<str>>(input: &[T], output: &mut impl Write) -> io::Result<()> {
    let total_len = input
        .iter()
        .fold(0, |acc: u32, s| {
            acc.checked_add(
                s.as_ref()
                    .len()
                    .try_into()
                    .expect("input fits into a name list"),
            )
            .expect("input fits into a name list")
        })
        .checked_add(
            input
                .len()
                .saturating_sub(1)
                .try_into()
                .expect("input fits into a name list"),
        ) // make room for the commas
        .expect("input fits into a name list");

    uint32(total_len, output)?;
    for (i, s) in input.iter().enumerate() {
        debug_assert_ne!(
            s.as_ref().len(),
            0,
            "zero length name not allowed in ssh name list"
        );
        debug_assert!(
            s.as_ref().chars().all(|c| c.is_ascii() && c != ','),
            "name must be only non-comma ascii characters in ssh name list"
        );

        if i != 0 {
            byte(b',', output)?;
        }
        bytes(s.as_ref().as_bytes(), output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_and_boolean() {
        let mut vec = b"data".to_vec();

        assert!(matches!(byte(0x32, &mut vec), Ok(())));
        assert_eq!(&vec[..], &[b'd', b'a', b't', b'a', 0x32][..]);

        assert!(matches!(boolean(true, &mut vec), Ok(())));
        assert!(matches!(boolean(false, &mut vec), Ok(())));
        assert_eq!(&vec[..], &[b'd', b'a', b't', b'a', 0x32, 0x01, 0x00][..]);
    }

    #[test]
    fn test_uints() {
        let mut vec = Vec::new();

        assert!(matches!(uint32(0x01020304, &mut vec), Ok(())));
        assert_eq!(&vec[..], &[0x01, 0x02, 0x03, 0x04][..]);

        vec.clear();

        assert!(matches!(uint64(0x0102030405060708, &mut vec), Ok(())));
        assert_eq!(&vec[..], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08][..]);
    }

    #[test]
    fn test_string() {
        let mut vec = Vec::new();

        assert!(matches!(string(b"testing", &mut vec), Ok(())));
        assert_eq!(&vec[..], &b"\x00\x00\x00\x07testing"[..]);

        vec.clear();

        assert!(matches!(string(b"", &mut vec), Ok(())));
        assert_eq!(&vec[..], &b"\x00\x00\x00\x00"[..]);
    }

    #[test]
    fn test_mpint() {
        use num_bigint::BigInt;

        let mut vec = Vec::new();

        assert!(matches!(
            mpint(&BigInt::parse_bytes(b"0", 16).unwrap(), &mut vec),
            Ok(())
        ));
        assert_eq!(&vec[..], &[0x00, 0x00, 0x00, 0x00][..]);

        vec.clear();

        assert!(matches!(
            mpint(&BigInt::parse_bytes(b"80", 16).unwrap(), &mut vec),
            Ok(())
        ));
        assert_eq!(&vec[..], &[0x00, 0x00, 0x00, 0x02, 0x00, 0x80][..]);

        vec.clear();

        assert!(matches!(
            mpint(&BigInt::parse_bytes(b"-deadbeef", 16).unwrap(), &mut vec),
            Ok(())
        ));
        assert_eq!(&vec[..], &[0x00, 0x00, 0x00, 0x05, 0xff, 0x21, 0x52, 0x41, 0x11][..]);
    }

    #[test]
    fn test_name_list() {
        let mut vec = Vec::new();

        let empty_list: &[&'static str] = &[];

        assert!(matches!(name_list(empty_list, &mut vec), Ok(())));
        assert_eq!(&vec[..], &b"\x00\x00\x00\x00"[..]);

        vec.clear();

        assert!(matches!(name_list(&["zlib", "none"][..], &mut vec), Ok(())));
        assert_eq!(&vec[..], &b"\x00\x00\x00\x09zlib,none"[..]);
    }

    #[test]
    fn roundtrip_with_parse() {
        use crate::parse;

        let mut vec = Vec::new();
        string(b"some data", &mut vec).unwrap();
        uint32(0x1234, &mut vec).unwrap();
        name_list(&["a", "bc"][..], &mut vec).unwrap();

        let parse::ParsedValue {
            value: s,
            rest_input,
        } = parse::string(&vec).unwrap();
        assert_eq!(s, b"some data");

        let parse::ParsedValue {
            value: n,
            rest_input,
        } = parse::uint32(rest_input).unwrap();
        assert_eq!(n, 0x1234);

        let parse::ParsedValue {
            value: l,
            rest_input,
        } = parse::name_list::<&str>(rest_input).unwrap();
        assert_eq!(l, vec!["a", "bc"]);
        assert!(rest_input.is_empty());
    }
}
