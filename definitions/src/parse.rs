//! Parser functions for the SSH wire primitives and a `Parse` trait to abstract over
//! parsable types.
//!
//! The primitive data types are described in
//! [RFC 4251 pages 8-10](https://tools.ietf.org/html/rfc4251#page-8).

// All the primitive parsers in this module are `#[inline]`, because they are small and will
// likely be combined and chained frequently in `Parse` implementations.

/// Allows implementors to be parsed from a byte slice.
pub trait Parse<'input>: Sized + 'input {
    /// Parses the `Self` type from `input`.
    fn parse(input: &'input [u8]) -> Result<'input, Self>;
}

/// Holds the result of a successful parse.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct ParsedValue<'data, T> {
    /// The value that was parsed.
    pub value: T,
    /// The rest of the input that was not consumed during the parse.
    pub rest_input: &'data [u8],
}

/// Communicates the reason why parsing was not successful.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, thiserror::Error)]
pub enum ParseError {
    /// Not enough data was available to complete the parse.
    #[error("not enough data available to complete the parse")]
    Incomplete,
    /// The input cannot be validly parsed into the expected structure.
    #[error("the parser input did not contain a valid value")]
    Invalid,
}

/// The result type of a parsing operation.
pub type Result<'data, T> = std::result::Result<ParsedValue<'data, T>, ParseError>;

/// Parses `N` bytes from the input.
#[inline]
pub fn bytes_const<const N: usize>(input: &[u8]) -> Result<[u8; N]> {
    bytes(input, N).map(|ParsedValue { value, rest_input }| ParsedValue {
        value: value
            .try_into()
            .expect("parse bytes returned the right number of bytes"),
        rest_input,
    })
}

/// Parses `n` bytes from the input.
#[inline]
pub fn bytes(input: &[u8], n: usize) -> Result<&[u8]> {
    if input.len() < n {
        Err(ParseError::Incomplete)
    } else {
        Ok(ParsedValue {
            value: &input[..n],
            rest_input: &input[n..],
        })
    }
}

/// Parses a single byte from the input.
#[inline]
pub fn byte(input: &[u8]) -> Result<u8> {
    if input.is_empty() {
        Err(ParseError::Incomplete)
    } else {
        Ok(ParsedValue {
            value: input[0],
            rest_input: &input[1..],
        })
    }
}

/// Parses a boolean from the input.
///
/// A boolean is stored as a single byte, where `0` represents `false` and all other
/// values must be interpreted as `true`.
#[inline]
pub fn boolean(input: &[u8]) -> Result<bool> {
    if input.is_empty() {
        Err(ParseError::Incomplete)
    } else {
        Ok(ParsedValue {
            value: input[0] != 0,
            rest_input: &input[1..],
        })
    }
}

/// Parses a uint32 from the input.
///
/// Stored as four bytes in network byte order.
#[inline]
pub fn uint32(input: &[u8]) -> Result<u32> {
    if input.len() < 4 {
        Err(ParseError::Incomplete)
    } else {
        let as_array = input[0..4]
            .try_into()
            .expect("array has the right number of bytes");

        Ok(ParsedValue {
            value: u32::from_be_bytes(as_array),
            rest_input: &input[4..],
        })
    }
}

/// Parses a uint64 from the input.
///
/// Stored as eight bytes in network byte order.
#[inline]
pub fn uint64(input: &[u8]) -> Result<u64> {
    if input.len() < 8 {
        Err(ParseError::Incomplete)
    } else {
        let as_array = input[0..8]
            .try_into()
            .expect("array has the right number of bytes");

        Ok(ParsedValue {
            value: u64::from_be_bytes(as_array),
            rest_input: &input[8..],
        })
    }
}

/// Parses a string from the input.
///
/// An arbitrary length binary string, stored as a uint32 length followed by that many
/// bytes of data.
#[inline]
pub fn string(input: &[u8]) -> Result<&[u8]> {
    let ParsedValue {
        value: len,
        rest_input,
    } = uint32(input)?;

    let ParsedValue { value, rest_input } = bytes(rest_input, len as usize)?;

    Ok(ParsedValue { value, rest_input })
}

/// Parses an mpint from the input.
///
/// A multiple precision integer in two's complement format, stored as a string, MSB
/// first. Unnecessary leading `0` or `255` bytes must not be included, which is checked
/// during the parse.
#[inline]
pub fn mpint(input: &[u8]) -> Result<num_bigint::BigInt> {
    let ParsedValue {
        value: string,
        rest_input,
    } = string(input)?;

    if string.len() > 1 {
        let unnecessary_00_byte = string[0] == 0x00 && (string[1] & 0x80) == 0;
        let unnecessary_ff_byte = string[0] == 0xff && (string[1] & 0x80) > 0;
        if unnecessary_00_byte || unnecessary_ff_byte {
            return Err(ParseError::Invalid);
        }
    }

    Ok(ParsedValue {
        value: num_bigint::BigInt::from_signed_bytes_be(string),
        rest_input,
    })
}

/// Parses a name-list from the input.
///
/// A string containing a comma-separated list of names. Names must be non-empty ascii
/// and must not contain commas, which is checked during the parse.
#[inline]
pub fn name_list<'input, T>(input: &'input [u8]) -> Result<'input, Vec<T>>
where
    &'input str: Into<T>,
{
    let ParsedValue {
        value: string,
        rest_input,
    } = string(input)?;

    if !string.is_empty() && (string[0] == b',' || string[string.len() - 1] == b',') {
        // No empty item should be in the list (i.e. no comma at start or end of list)
        return Err(ParseError::Invalid);
    }

    let mut iter = string.iter().peekable();

    while let Some(c) = iter.next() {
        if !(*c as char).is_ascii() {
            // All characters must be ascii
            return Err(ParseError::Invalid);
        }

        if *c == b',' && iter.peek() == Some(&&b',') {
            // No empty item should be in the list (i.e. no comma should follow a comma)
            return Err(ParseError::Invalid);
        }
    }

    if string.is_empty() {
        Ok(ParsedValue {
            value: vec![],
            rest_input,
        })
    } else {
        let string = std::str::from_utf8(string).expect("ascii string should be valid utf8");

        Ok(ParsedValue {
            value: string.split(',').map(|string| string.into()).collect(),
            rest_input,
        })
    }
}
