//! DHCP packet parser implementation.
//!
//! Parses raw DHCP packets according to RFC 2131.

use std::net::Ipv4Addr;

use macaddr::MacAddr6;

use crate::domain::{DhcpMessageType, DhcpOption, DhcpPacket};
use crate::error::ParseError;

/// DHCP magic cookie: 0x63825363
pub(crate) const DHCP_MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Minimum DHCP packet size: fixed header plus magic cookie
const MIN_DHCP_SIZE: usize = 240;

/// DHCP option codes
pub(crate) mod option_codes {
    pub const PAD: u8 = 0;
    pub const END: u8 = 255;
    pub const VENDOR_SPECIFIC: u8 = 43;
    pub const MESSAGE_TYPE: u8 = 53;
    pub const SERVER_ID: u8 = 54;
    pub const PARAMETER_LIST: u8 = 55;
    pub const VENDOR_CLASS_ID: u8 = 60;
    pub const USER_CLASS: u8 = 77;
    pub const RELAY_AGENT_INFO: u8 = 82;
    pub const CLIENT_ARCH: u8 = 93;
    pub const CLIENT_NDI: u8 = 94;
    pub const CLIENT_UUID: u8 = 97;
}

/// Parser for DHCP packets.
pub struct DhcpParser;

impl DhcpParser {
    /// Create a new DHCP parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a DHCP packet from raw bytes.
    ///
    /// The input should be the UDP payload (not including IP/UDP headers).
    /// Malformed values for known option codes are rejected; unknown codes
    /// are retained verbatim.
    pub fn parse(&self, data: &[u8]) -> Result<DhcpPacket, ParseError> {
        if data.len() < MIN_DHCP_SIZE {
            return Err(ParseError::PacketTooShort {
                expected: MIN_DHCP_SIZE,
                actual: data.len(),
            });
        }

        // Fixed header fields
        let op = data[0];
        let htype = data[1];
        let hlen = data[2];
        let hops = data[3];
        let xid = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let secs = u16::from_be_bytes([data[8], data[9]]);
        let flags = u16::from_be_bytes([data[10], data[11]]);

        let ciaddr = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let yiaddr = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
        let siaddr = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let giaddr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        // Client hardware address (chaddr) - 16 bytes starting at offset 28.
        // The first hlen bytes matter; for Ethernet (htype=1) that is 6.
        let chaddr = MacAddr6::new(data[28], data[29], data[30], data[31], data[32], data[33]);

        // Server name (sname) - 64 bytes starting at offset 44
        let sname = Self::parse_null_terminated_string(&data[44..108]);

        // Boot filename (file) - 128 bytes starting at offset 108
        let file = Self::parse_null_terminated_string(&data[108..236]);

        if data[236..240] != DHCP_MAGIC_COOKIE {
            return Err(ParseError::InvalidMagicCookie);
        }

        // Options start at offset 240
        let options = self.parse_options(&data[240..])?;

        Ok(DhcpPacket {
            op,
            htype,
            hlen,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            sname,
            file,
            options,
        })
    }

    /// Parse a null-terminated string, returning None if empty.
    fn parse_null_terminated_string(data: &[u8]) -> Option<String> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        if end == 0 {
            return None;
        }

        String::from_utf8(data[..end].to_vec()).ok()
    }

    /// Parse DHCP options from the options section.
    fn parse_options(&self, data: &[u8]) -> Result<Vec<DhcpOption>, ParseError> {
        let mut options = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let code = data[offset];

            if code == option_codes::PAD {
                offset += 1;
                continue;
            }

            if code == option_codes::END {
                break;
            }

            // Regular option: code + length + data
            if offset + 1 >= data.len() {
                return Err(ParseError::InvalidOption {
                    offset,
                    message: "option length missing".to_string(),
                });
            }

            let len = data[offset + 1] as usize;

            if offset + 2 + len > data.len() {
                return Err(ParseError::InvalidOption {
                    offset,
                    message: format!(
                        "option data truncated: expected {} bytes, have {}",
                        len,
                        data.len() - offset - 2
                    ),
                });
            }

            let option_data = &data[offset + 2..offset + 2 + len];
            options.push(self.parse_option(code, option_data, offset)?);

            offset += 2 + len;
        }

        Ok(options)
    }

    /// Parse a single DHCP option, rejecting malformed known codes.
    fn parse_option(&self, code: u8, data: &[u8], offset: usize) -> Result<DhcpOption, ParseError> {
        let malformed = |message: &str| ParseError::InvalidOption {
            offset,
            message: message.to_string(),
        };

        match code {
            option_codes::VENDOR_SPECIFIC => Ok(DhcpOption::VendorSpecific(data.to_vec())),

            option_codes::MESSAGE_TYPE => {
                if data.len() != 1 {
                    return Err(malformed("message type must be one byte"));
                }
                DhcpMessageType::from_u8(data[0])
                    .map(DhcpOption::MessageType)
                    .ok_or_else(|| malformed("unknown message type value"))
            }

            option_codes::SERVER_ID => {
                if data.len() != 4 {
                    return Err(malformed("server identifier must be four bytes"));
                }
                Ok(DhcpOption::ServerIdentifier(Ipv4Addr::new(
                    data[0], data[1], data[2], data[3],
                )))
            }

            option_codes::PARAMETER_LIST => Ok(DhcpOption::ParameterRequestList(data.to_vec())),

            option_codes::VENDOR_CLASS_ID => String::from_utf8(data.to_vec())
                .map(DhcpOption::VendorClassId)
                .map_err(|_| malformed("vendor class identifier is not valid UTF-8")),

            option_codes::USER_CLASS => Ok(DhcpOption::UserClassInfo(data.to_vec())),

            option_codes::RELAY_AGENT_INFO => Ok(DhcpOption::RelayAgentInfo(data.to_vec())),

            option_codes::CLIENT_ARCH => {
                if data.is_empty() || data.len() % 2 != 0 {
                    return Err(malformed("client architecture must be 16-bit codes"));
                }
                let codes = data
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Ok(DhcpOption::ClientArch(codes))
            }

            option_codes::CLIENT_NDI => Ok(DhcpOption::ClientNdi(data.to_vec())),

            option_codes::CLIENT_UUID => Ok(DhcpOption::ClientUuid(data.to_vec())),

            _ => Ok(DhcpOption::Unknown(code, data.to_vec())),
        }
    }
}

impl Default for DhcpParser {
    fn default() -> Self {
        Self::new()
    }
}
