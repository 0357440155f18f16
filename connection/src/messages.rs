//! The typed channel and global request messages of the connection protocol.
//!
//! Field layouts follow [RFC 4254](https://tools.ietf.org/html/rfc4254) exactly; remote
//! channel ids are opaque values that are echoed unchanged.

use definitions::{
    consts::{
        SSH_MSG_CHANNEL_CLOSE, SSH_MSG_CHANNEL_DATA, SSH_MSG_CHANNEL_EOF,
        SSH_MSG_CHANNEL_EXTENDED_DATA, SSH_MSG_CHANNEL_FAILURE, SSH_MSG_CHANNEL_OPEN,
        SSH_MSG_CHANNEL_OPEN_CONFIRMATION, SSH_MSG_CHANNEL_OPEN_FAILURE,
        SSH_MSG_CHANNEL_REQUEST, SSH_MSG_CHANNEL_SUCCESS, SSH_MSG_CHANNEL_WINDOW_ADJUST,
        SSH_MSG_GLOBAL_REQUEST, SSH_MSG_REQUEST_FAILURE, SSH_MSG_REQUEST_SUCCESS,
    },
    parse, write, Compose, Parse, ParseError, ParsedValue,
};
use std::borrow::Cow;
use std::io::Write;

/// Checks that the message starts with the expected message number.
fn expect_message_number(input: &[u8], expected: u8) -> Result<&[u8], ParseError> {
    let ParsedValue {
        value: message_number,
        rest_input,
    } = parse::byte(input)?;

    if message_number == expected {
        Ok(rest_input)
    } else {
        Err(ParseError::Invalid)
    }
}

/// A request to open a new channel (`SSH_MSG_CHANNEL_OPEN`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelOpen<'data> {
    /// The type name of the channel, such as `session` or `direct-tcpip`.
    pub channel_type: Cow<'data, [u8]>,
    /// The channel id chosen by the sender.
    pub sender_channel: u32,
    /// The number of bytes the sender is initially willing to receive.
    pub initial_window_size: u32,
    /// The largest packet the sender is willing to receive.
    pub maximum_packet_size: u32,
    /// Additional data specific to the channel type.
    pub type_specific: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelOpen<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_OPEN)?;

        let ParsedValue {
            value: channel_type,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: sender_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: initial_window_size,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: maximum_packet_size,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelOpen {
                channel_type: channel_type.into(),
                sender_channel,
                initial_window_size,
                maximum_packet_size,
                type_specific: rest_input.into(),
            },
            rest_input: &rest_input[rest_input.len()..],
        })
    }
}

impl Compose for ChannelOpen<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_OPEN, output)?;
        write::string(&self.channel_type, output)?;
        write::uint32(self.sender_channel, output)?;
        write::uint32(self.initial_window_size, output)?;
        write::uint32(self.maximum_packet_size, output)?;
        write::bytes(&self.type_specific, output)
    }
}

/// The confirmation of a channel open (`SSH_MSG_CHANNEL_OPEN_CONFIRMATION`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelOpenConfirmation<'data> {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The channel id chosen by the sender of this message.
    pub sender_channel: u32,
    /// The number of bytes the sender is initially willing to receive.
    pub initial_window_size: u32,
    /// The largest packet the sender is willing to receive.
    pub maximum_packet_size: u32,
    /// Additional data specific to the channel type.
    pub type_specific: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelOpenConfirmation<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_OPEN_CONFIRMATION)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: sender_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: initial_window_size,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: maximum_packet_size,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelOpenConfirmation {
                recipient_channel,
                sender_channel,
                initial_window_size,
                maximum_packet_size,
                type_specific: rest_input.into(),
            },
            rest_input: &rest_input[rest_input.len()..],
        })
    }
}

impl Compose for ChannelOpenConfirmation<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_OPEN_CONFIRMATION, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::uint32(self.sender_channel, output)?;
        write::uint32(self.initial_window_size, output)?;
        write::uint32(self.maximum_packet_size, output)?;
        write::bytes(&self.type_specific, output)
    }
}

/// The rejection of a channel open (`SSH_MSG_CHANNEL_OPEN_FAILURE`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelOpenFailure<'data> {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The machine readable reason for the rejection.
    pub reason_code: u32,
    /// The human readable description of the rejection.
    pub description: Cow<'data, [u8]>,
    /// The language tag of the description.
    pub language_tag: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelOpenFailure<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_OPEN_FAILURE)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: reason_code,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: description,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: language_tag,
            rest_input,
        } = parse::string(rest_input)?;

        Ok(ParsedValue {
            value: ChannelOpenFailure {
                recipient_channel,
                reason_code,
                description: description.into(),
                language_tag: language_tag.into(),
            },
            rest_input,
        })
    }
}

impl Compose for ChannelOpenFailure<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_OPEN_FAILURE, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::uint32(self.reason_code, output)?;
        write::string(&self.description, output)?;
        write::string(&self.language_tag, output)
    }
}

/// A window replenishment (`SSH_MSG_CHANNEL_WINDOW_ADJUST`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelWindowAdjust {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The number of bytes by which the window grows.
    pub bytes_to_add: u32,
}

impl<'data> Parse<'data> for ChannelWindowAdjust {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_WINDOW_ADJUST)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: bytes_to_add,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelWindowAdjust {
                recipient_channel,
                bytes_to_add,
            },
            rest_input,
        })
    }
}

impl Compose for ChannelWindowAdjust {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_WINDOW_ADJUST, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::uint32(self.bytes_to_add, output)
    }
}

/// Channel payload data (`SSH_MSG_CHANNEL_DATA`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelData<'data> {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The transferred bytes.
    pub data: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelData<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_DATA)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: data,
            rest_input,
        } = parse::string(rest_input)?;

        Ok(ParsedValue {
            value: ChannelData {
                recipient_channel,
                data: data.into(),
            },
            rest_input,
        })
    }
}

impl Compose for ChannelData<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_DATA, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::string(&self.data, output)
    }
}

/// Channel payload data of a separate stream (`SSH_MSG_CHANNEL_EXTENDED_DATA`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelExtendedData<'data> {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The stream the data belongs to, such as stderr.
    pub data_type_code: u32,
    /// The transferred bytes.
    pub data: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelExtendedData<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_EXTENDED_DATA)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: data_type_code,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: data,
            rest_input,
        } = parse::string(rest_input)?;

        Ok(ParsedValue {
            value: ChannelExtendedData {
                recipient_channel,
                data_type_code,
                data: data.into(),
            },
            rest_input,
        })
    }
}

impl Compose for ChannelExtendedData<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_EXTENDED_DATA, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::uint32(self.data_type_code, output)?;
        write::string(&self.data, output)
    }
}

/// The end of the data stream in one direction (`SSH_MSG_CHANNEL_EOF`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelEof {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
}

impl<'data> Parse<'data> for ChannelEof {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_EOF)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelEof { recipient_channel },
            rest_input,
        })
    }
}

impl Compose for ChannelEof {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_EOF, output)?;
        write::uint32(self.recipient_channel, output)
    }
}

/// The teardown of a channel (`SSH_MSG_CHANNEL_CLOSE`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelClose {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
}

impl<'data> Parse<'data> for ChannelClose {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_CLOSE)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelClose { recipient_channel },
            rest_input,
        })
    }
}

impl Compose for ChannelClose {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_CLOSE, output)?;
        write::uint32(self.recipient_channel, output)
    }
}

/// A channel scoped request such as `exec` or `pty-req` (`SSH_MSG_CHANNEL_REQUEST`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelRequest<'data> {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
    /// The name of the request type.
    pub request_type: Cow<'data, [u8]>,
    /// Whether the sender wants an explicit reply.
    pub want_reply: bool,
    /// Additional data specific to the request type.
    pub payload: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for ChannelRequest<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_REQUEST)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: request_type,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: want_reply,
            rest_input,
        } = parse::boolean(rest_input)?;

        Ok(ParsedValue {
            value: ChannelRequest {
                recipient_channel,
                request_type: request_type.into(),
                want_reply,
                payload: rest_input.into(),
            },
            rest_input: &rest_input[rest_input.len()..],
        })
    }
}

impl Compose for ChannelRequest<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_REQUEST, output)?;
        write::uint32(self.recipient_channel, output)?;
        write::string(&self.request_type, output)?;
        write::boolean(self.want_reply, output)?;
        write::bytes(&self.payload, output)
    }
}

/// The positive reply to a channel request (`SSH_MSG_CHANNEL_SUCCESS`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelSuccess {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
}

impl<'data> Parse<'data> for ChannelSuccess {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_SUCCESS)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelSuccess { recipient_channel },
            rest_input,
        })
    }
}

impl Compose for ChannelSuccess {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_SUCCESS, output)?;
        write::uint32(self.recipient_channel, output)
    }
}

/// The negative reply to a channel request (`SSH_MSG_CHANNEL_FAILURE`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelFailure {
    /// The channel id of the receiver of this message.
    pub recipient_channel: u32,
}

impl<'data> Parse<'data> for ChannelFailure {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_CHANNEL_FAILURE)?;

        let ParsedValue {
            value: recipient_channel,
            rest_input,
        } = parse::uint32(rest_input)?;

        Ok(ParsedValue {
            value: ChannelFailure { recipient_channel },
            rest_input,
        })
    }
}

impl Compose for ChannelFailure {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_CHANNEL_FAILURE, output)?;
        write::uint32(self.recipient_channel, output)
    }
}

/// A request independent of any channel (`SSH_MSG_GLOBAL_REQUEST`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GlobalRequest<'data> {
    /// The name of the request.
    pub request_name: Cow<'data, [u8]>,
    /// Whether the sender wants an explicit reply.
    pub want_reply: bool,
    /// Additional data specific to the request.
    pub payload: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for GlobalRequest<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_GLOBAL_REQUEST)?;

        let ParsedValue {
            value: request_name,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: want_reply,
            rest_input,
        } = parse::boolean(rest_input)?;

        Ok(ParsedValue {
            value: GlobalRequest {
                request_name: request_name.into(),
                want_reply,
                payload: rest_input.into(),
            },
            rest_input: &rest_input[rest_input.len()..],
        })
    }
}

impl Compose for GlobalRequest<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_GLOBAL_REQUEST, output)?;
        write::string(&self.request_name, output)?;
        write::boolean(self.want_reply, output)?;
        write::bytes(&self.payload, output)
    }
}

/// The positive reply to a global request (`SSH_MSG_REQUEST_SUCCESS`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RequestSuccess<'data> {
    /// Additional data specific to the request.
    pub payload: Cow<'data, [u8]>,
}

impl<'data> Parse<'data> for RequestSuccess<'data> {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_REQUEST_SUCCESS)?;

        Ok(ParsedValue {
            value: RequestSuccess {
                payload: rest_input.into(),
            },
            rest_input: &rest_input[rest_input.len()..],
        })
    }
}

impl Compose for RequestSuccess<'_> {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_REQUEST_SUCCESS, output)?;
        write::bytes(&self.payload, output)
    }
}

/// The negative reply to a global request (`SSH_MSG_REQUEST_FAILURE`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RequestFailure;

impl<'data> Parse<'data> for RequestFailure {
    fn parse(input: &'data [u8]) -> parse::Result<'data, Self> {
        let rest_input = expect_message_number(input, SSH_MSG_REQUEST_FAILURE)?;

        Ok(ParsedValue {
            value: RequestFailure,
            rest_input,
        })
    }
}

impl Compose for RequestFailure {
    fn compose(&self, output: &mut impl Write) -> std::io::Result<()> {
        write::byte(SSH_MSG_REQUEST_FAILURE, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_open_roundtrip() {
        let message = ChannelOpen {
            channel_type: Cow::Borrowed(b"session"),
            sender_channel: 3,
            initial_window_size: 0x100000,
            maximum_packet_size: 0x8000,
            type_specific: Cow::Borrowed(b""),
        };

        let encoded = message.compose_to_vec();
        assert_eq!(encoded[0], SSH_MSG_CHANNEL_OPEN);

        let ParsedValue { value, rest_input } = ChannelOpen::parse(&encoded).unwrap();
        assert_eq!(value, message);
        assert!(rest_input.is_empty());
    }

    #[test]
    fn channel_request_roundtrip() {
        let mut payload = Vec::new();
        write::string(b"ls -la", &mut payload).unwrap();

        let message = ChannelRequest {
            recipient_channel: 7,
            request_type: Cow::Borrowed(b"exec"),
            want_reply: true,
            payload: Cow::Owned(payload),
        };

        let encoded = message.compose_to_vec();
        let ParsedValue { value, .. } = ChannelRequest::parse(&encoded).unwrap();
        assert_eq!(value, message);
    }

    #[test]
    fn channel_data_roundtrip() {
        let message = ChannelData {
            recipient_channel: 1,
            data: Cow::Borrowed(b"some bytes"),
        };

        let encoded = message.compose_to_vec();
        let ParsedValue { value, .. } = ChannelData::parse(&encoded).unwrap();
        assert_eq!(value, message);
    }

    #[test]
    fn open_failure_roundtrip() {
        let message = ChannelOpenFailure {
            recipient_channel: 4,
            reason_code: definitions::consts::open_failure_reason::SSH_OPEN_UNKNOWN_CHANNEL_TYPE,
            description: Cow::Borrowed(b"unknown channel type"),
            language_tag: Cow::Borrowed(b""),
        };

        let encoded = message.compose_to_vec();
        let ParsedValue { value, .. } = ChannelOpenFailure::parse(&encoded).unwrap();
        assert_eq!(value, message);
    }

    #[test]
    fn wrong_message_number_is_invalid() {
        let message = ChannelEof {
            recipient_channel: 2,
        };
        let encoded = message.compose_to_vec();

        assert_eq!(ChannelClose::parse(&encoded), Err(ParseError::Invalid));
    }

    #[test]
    fn truncated_message_is_incomplete() {
        let message = ChannelWindowAdjust {
            recipient_channel: 2,
            bytes_to_add: 0x4000,
        };
        let encoded = message.compose_to_vec();

        assert_eq!(
            ChannelWindowAdjust::parse(&encoded[..encoded.len() - 1]),
            Err(ParseError::Incomplete)
        );
    }
}
