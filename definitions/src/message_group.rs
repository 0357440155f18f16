//! Allows classifying messages by the range their message number falls into.

/// Describes the groups of messages that the protocol specifies.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MessageGroup {
    /// The message had `0` as the message number.
    ///
    /// The meaning of this is not specified in the RFC.
    Zero,
    /// The message is generic to the transport layer.
    ///
    /// This means messages such as "disconnect", "ignore" and "debug".
    TransportLayerGeneric,
    /// The message is used for algorithm negotiation.
    AlgorithmNegotiation,
    /// The message is used for the key exchange.
    ///
    /// # Note
    /// Message numbers in this range can have different meanings
    /// depending on the key exchange method used.
    KeyExchangeMethodSpecific,
    /// The message is used for general user authentication.
    UserAuthenticationGeneric,
    /// The message is used for user authentication.
    ///
    /// # Note
    /// Message numbers in this range can have different meanings
    /// depending on the user authentication method used.
    UserAuthenticationMethodSpecific,
    /// The message is used for the connection protocol.
    ConnectionProtocolGeneric,
    /// The message is used in channel based communication.
    ChannelRelated,
    /// The message number is reserved for a future extension.
    Reserved,
    /// The message number is in the private use range.
    LocalExtension,
}

impl MessageGroup {
    /// Returns the message group for the given message number.
    pub fn from_number(message_number: u8) -> MessageGroup {
        match message_number {
            0 => MessageGroup::Zero,
            1..=19 => MessageGroup::TransportLayerGeneric,
            20..=29 => MessageGroup::AlgorithmNegotiation,
            30..=49 => MessageGroup::KeyExchangeMethodSpecific,
            50..=59 => MessageGroup::UserAuthenticationGeneric,
            60..=79 => MessageGroup::UserAuthenticationMethodSpecific,
            80..=89 => MessageGroup::ConnectionProtocolGeneric,
            90..=127 => MessageGroup::ChannelRelated,
            128..=191 => MessageGroup::Reserved,
            192..=255 => MessageGroup::LocalExtension,
        }
    }

    /// Returns the message group for a non-empty message.
    pub fn from_message(message: &[u8]) -> Option<MessageGroup> {
        message.first().map(|num| MessageGroup::from_number(*num))
    }

    /// Returns `true` if messages in this group are handled by the transport layer itself.
    ///
    /// Such messages are never surfaced to users of the transport layer and must not be
    /// sent by them either.
    pub fn is_transport_internal(&self) -> bool {
        matches!(
            self,
            MessageGroup::TransportLayerGeneric
                | MessageGroup::AlgorithmNegotiation
                | MessageGroup::KeyExchangeMethodSpecific
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts;

    #[test]
    fn standard_message_numbers() {
        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_DISCONNECT),
            MessageGroup::TransportLayerGeneric
        );
        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_SERVICE_REQUEST),
            MessageGroup::TransportLayerGeneric
        );

        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_KEXINIT),
            MessageGroup::AlgorithmNegotiation
        );
        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_NEWKEYS),
            MessageGroup::AlgorithmNegotiation
        );

        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_KEXDH_REPLY),
            MessageGroup::KeyExchangeMethodSpecific
        );

        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_GLOBAL_REQUEST),
            MessageGroup::ConnectionProtocolGeneric
        );

        assert_eq!(
            MessageGroup::from_number(consts::SSH_MSG_CHANNEL_DATA),
            MessageGroup::ChannelRelated
        );
    }

    #[test]
    fn transport_internal_groups() {
        assert!(MessageGroup::from_number(consts::SSH_MSG_IGNORE).is_transport_internal());
        assert!(MessageGroup::from_number(consts::SSH_MSG_KEXINIT).is_transport_internal());
        assert!(MessageGroup::from_number(consts::SSH_MSG_KEXDH_INIT).is_transport_internal());

        assert!(!MessageGroup::from_number(consts::SSH_MSG_CHANNEL_OPEN).is_transport_internal());
        assert!(!MessageGroup::from_number(50).is_transport_internal());
        assert!(!MessageGroup::Zero.is_transport_internal());
    }
}
