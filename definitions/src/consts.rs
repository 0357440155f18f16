//! Contains constants for the message numbers and reason codes used in the SSH protocol.

/// This message causes immediate termination of the connection.
pub const SSH_MSG_DISCONNECT: u8 = 1;

/// All implementations must understand and ignore this message at any time.
pub const SSH_MSG_IGNORE: u8 = 2;

/// The response message to an unrecognized message.
pub const SSH_MSG_UNIMPLEMENTED: u8 = 3;

/// The message is used for debugging purposes and may be ignored.
pub const SSH_MSG_DEBUG: u8 = 4;

/// The message is a service request by the client.
pub const SSH_MSG_SERVICE_REQUEST: u8 = 5;

/// The message indicates that the server accepted the service request.
pub const SSH_MSG_SERVICE_ACCEPT: u8 = 6;

/// The message is initializing a key exchange.
pub const SSH_MSG_KEXINIT: u8 = 20;

/// The message indicates successful key exchange and initiates usage of new keys.
pub const SSH_MSG_NEWKEYS: u8 = 21;

/// The message initiates a Diffie-Hellman key exchange.
pub const SSH_MSG_KEXDH_INIT: u8 = 30;

/// The message is the server response in a Diffie-Hellman key exchange.
pub const SSH_MSG_KEXDH_REPLY: u8 = 31;

/// The message requests a Diffie-Hellman group from the server.
pub const SSH_MSG_KEX_DH_GEX_REQUEST: u8 = 34;

/// The message carries the negotiated Diffie-Hellman group parameters.
pub const SSH_MSG_KEX_DH_GEX_GROUP: u8 = 31;

/// The message initiates the exchange in a negotiated-group Diffie-Hellman key exchange.
pub const SSH_MSG_KEX_DH_GEX_INIT: u8 = 32;

/// The message is the server response in a negotiated-group Diffie-Hellman key exchange.
pub const SSH_MSG_KEX_DH_GEX_REPLY: u8 = 33;

/// The message indicates the initialization of an ECDH key exchange.
pub const SSH_MSG_KEX_ECDH_INIT: u8 = 30;

/// The message indicates a response in an ECDH key exchange.
pub const SSH_MSG_KEX_ECDH_REPLY: u8 = 31;

/// The message indicates a request that is independent from channels.
pub const SSH_MSG_GLOBAL_REQUEST: u8 = 80;

/// The message indicates that a global request was successful.
pub const SSH_MSG_REQUEST_SUCCESS: u8 = 81;

/// The message indicates that a global request failed.
pub const SSH_MSG_REQUEST_FAILURE: u8 = 82;

/// The message indicates the request to open a new channel.
pub const SSH_MSG_CHANNEL_OPEN: u8 = 90;

/// The message confirms the opening of a new channel.
pub const SSH_MSG_CHANNEL_OPEN_CONFIRMATION: u8 = 91;

/// The message indicates failure to open a new channel.
pub const SSH_MSG_CHANNEL_OPEN_FAILURE: u8 = 92;

/// The message indicates an adjustment of the window size of a channel.
pub const SSH_MSG_CHANNEL_WINDOW_ADJUST: u8 = 93;

/// The message contains data for the channel.
pub const SSH_MSG_CHANNEL_DATA: u8 = 94;

/// The message contains data of a different type for the channel.
pub const SSH_MSG_CHANNEL_EXTENDED_DATA: u8 = 95;

/// The message indicates no more data will be sent over the channel.
pub const SSH_MSG_CHANNEL_EOF: u8 = 96;

/// The message indicates a wish to close the channel.
pub const SSH_MSG_CHANNEL_CLOSE: u8 = 97;

/// The message indicates a channel specific request.
pub const SSH_MSG_CHANNEL_REQUEST: u8 = 98;

/// The message indicates that a channel specific request was successful.
pub const SSH_MSG_CHANNEL_SUCCESS: u8 = 99;

/// The message indicates that a channel specific request failed.
pub const SSH_MSG_CHANNEL_FAILURE: u8 = 100;

/// The extended data stream number used for stderr output.
pub const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Reason codes sent in `SSH_MSG_DISCONNECT` messages.
pub mod disconnect_reason {
    /// The host is not allowed to connect.
    pub const SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT: u32 = 1;
    /// A protocol error occurred.
    pub const SSH_DISCONNECT_PROTOCOL_ERROR: u32 = 2;
    /// The key exchange failed.
    pub const SSH_DISCONNECT_KEY_EXCHANGE_FAILED: u32 = 3;
    /// A MAC was incorrect.
    pub const SSH_DISCONNECT_MAC_ERROR: u32 = 5;
    /// A packet could not be decompressed.
    pub const SSH_DISCONNECT_COMPRESSION_ERROR: u32 = 6;
    /// The requested service is not available.
    pub const SSH_DISCONNECT_SERVICE_NOT_AVAILABLE: u32 = 7;
    /// The protocol version is not supported.
    pub const SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED: u32 = 8;
    /// The host key could not be verified.
    pub const SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE: u32 = 9;
    /// The connection was lost.
    pub const SSH_DISCONNECT_CONNECTION_LOST: u32 = 10;
    /// The application requested the disconnect.
    pub const SSH_DISCONNECT_BY_APPLICATION: u32 = 11;
}

/// Reason codes sent in `SSH_MSG_CHANNEL_OPEN_FAILURE` messages.
pub mod open_failure_reason {
    /// The channel open was administratively prohibited.
    pub const SSH_OPEN_ADMINISTRATIVELY_PROHIBITED: u32 = 1;
    /// The connection the channel represents could not be established.
    pub const SSH_OPEN_CONNECT_FAILED: u32 = 2;
    /// The channel type is not known to the receiver.
    pub const SSH_OPEN_UNKNOWN_CHANNEL_TYPE: u32 = 3;
    /// The receiver is out of resources for new channels.
    pub const SSH_OPEN_RESOURCE_SHORTAGE: u32 = 4;
}
