use std::net::SocketAddrV4;

use thiserror::Error;

use crate::domain::PxeArch;

/// Errors produced while decoding a DHCP packet from the wire.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("packet too short: expected {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("missing or invalid DHCP magic cookie")]
    InvalidMagicCookie,

    #[error("invalid option at offset {offset}: {message}")]
    InvalidOption { offset: usize, message: String },
}

/// Reasons a datagram is not answered. Logged at INFO and dropped; PXE
/// clients retransmit on their own.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("unsupported DHCP message type: {0}")]
    IgnoredType(String),

    #[error("opcode {0} is not BOOTREQUEST")]
    IgnoredOpcode(u8),

    #[error("not a PXE boot request (missing option 60)")]
    Opt60Missing,

    #[error("not a PXE boot request (option 60 '{0}' does not start with PXEClient or HTTPClient)")]
    InvalidOpt60(String),

    #[error("not a PXE boot request (missing option 93)")]
    Opt93Missing,

    #[error("not a PXE boot request (missing option 94)")]
    Opt94Missing,

    #[error("malformed client GUID (option 97), leading byte must be zero")]
    Opt97LeadingByte,

    #[error("malformed client GUID (option 97), wrong size")]
    Opt97WrongSize,

    #[error("unsupported client system architecture (option 93)")]
    UnknownArch,
}

/// Errors while constructing a reply.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("no bootfile mapped for architecture {0}")]
    ArchNotFound(PxeArch),
}

/// Invalid startup configuration. Fatal: the process exits instead of
/// serving with a half-valid config.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote TFTP address needs a non-zero IP and port, got {0}")]
    InvalidTftpAddr(SocketAddrV4),

    #[error("remote HTTP address needs a non-zero IP and port, got {0}")]
    InvalidHttpAddr(SocketAddrV4),

    #[error("invalid iPXE URL '{url}': {reason}")]
    InvalidIpxeUrl { url: String, reason: String },

    #[error("iPXE script name must not be empty")]
    EmptyScriptName,
}
