//! DHCP packet serialization.
//!
//! Writes a `DhcpPacket` back to RFC 2131 wire format, the mirror image of
//! the parser.

use crate::domain::DhcpPacket;
use crate::parser::dhcp_parser::{option_codes, DHCP_MAGIC_COOKIE};

/// Minimum BOOTP datagram size; shorter replies are zero-padded.
const MIN_PACKET_SIZE: usize = 300;

/// Encoder for DHCP packets.
pub struct DhcpEncoder;

impl DhcpEncoder {
    /// Create a new DHCP encoder.
    pub fn new() -> Self {
        Self
    }

    /// Serialize a packet. The option list is written in order and
    /// terminated with END; no PAD bytes are emitted.
    pub fn encode(&self, packet: &DhcpPacket) -> Vec<u8> {
        let mut buf = vec![0u8; 240];

        buf[0] = packet.op;
        buf[1] = packet.htype;
        buf[2] = packet.hlen;
        buf[3] = packet.hops;
        buf[4..8].copy_from_slice(&packet.xid.to_be_bytes());
        buf[8..10].copy_from_slice(&packet.secs.to_be_bytes());
        buf[10..12].copy_from_slice(&packet.flags.to_be_bytes());

        buf[12..16].copy_from_slice(&packet.ciaddr.octets());
        buf[16..20].copy_from_slice(&packet.yiaddr.octets());
        buf[20..24].copy_from_slice(&packet.siaddr.octets());
        buf[24..28].copy_from_slice(&packet.giaddr.octets());

        // chaddr is 16 bytes; the MAC fills the first 6, the rest stays zero
        buf[28..34].copy_from_slice(packet.chaddr.as_bytes());

        if let Some(ref sname) = packet.sname {
            let bytes = sname.as_bytes();
            let len = bytes.len().min(64);
            buf[44..44 + len].copy_from_slice(&bytes[..len]);
        }

        if let Some(ref file) = packet.file {
            let bytes = file.as_bytes();
            let len = bytes.len().min(128);
            buf[108..108 + len].copy_from_slice(&bytes[..len]);
        }

        buf[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        for option in &packet.options {
            let value = option.to_bytes();
            buf.push(option.code());
            buf.push(value.len() as u8);
            buf.extend_from_slice(&value);
        }
        buf.push(option_codes::END);

        while buf.len() < MIN_PACKET_SIZE {
            buf.push(0);
        }

        buf
    }
}

impl Default for DhcpEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use macaddr::MacAddr6;

    use super::*;
    use crate::domain::{DhcpMessageType, DhcpOption, BOOT_REPLY, FLAG_BROADCAST};
    use crate::parser::DhcpParser;

    fn sample_reply() -> DhcpPacket {
        DhcpPacket {
            op: BOOT_REPLY,
            htype: 1,
            hlen: 6,
            hops: 0,
            xid: 0xdeadbeef,
            secs: 0,
            flags: FLAG_BROADCAST,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::new(192, 168, 2, 5),
            giaddr: Ipv4Addr::new(10, 0, 0, 1),
            chaddr: MacAddr6::new(0x00, 0x01, 0x02, 0x03, 0x04, 0x05),
            sname: Some("192.168.2.5".to_string()),
            file: Some("ipxe.efi".to_string()),
            options: vec![
                DhcpOption::MessageType(DhcpMessageType::Offer),
                DhcpOption::ServerIdentifier(Ipv4Addr::new(192, 168, 2, 5)),
                DhcpOption::VendorClassId("PXEClient".to_string()),
                DhcpOption::ClientUuid(vec![0u8; 17]),
                DhcpOption::Unknown(128, vec![1, 2]),
            ],
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = DhcpEncoder::new().encode(&sample_reply());

        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[4..8], &0xdeadbeefu32.to_be_bytes());
        assert_eq!(&bytes[10..12], &0x8000u16.to_be_bytes());
        assert_eq!(&bytes[20..24], &[192, 168, 2, 5]);
        assert_eq!(&bytes[24..28], &[10, 0, 0, 1]);
        assert_eq!(&bytes[28..34], &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(&bytes[34..44], &[0u8; 10]); // chaddr padding
        assert_eq!(&bytes[44..55], b"192.168.2.5");
        assert_eq!(&bytes[108..116], b"ipxe.efi");
        assert_eq!(&bytes[236..240], &DHCP_MAGIC_COOKIE);
        // First option directly after the cookie
        assert_eq!(bytes[240], 53);
        assert_eq!(bytes[241], 1);
        assert_eq!(bytes[242], DhcpMessageType::Offer.as_u8());
    }

    #[test]
    fn test_encode_pads_to_minimum_size() {
        let mut packet = sample_reply();
        packet.options.clear();
        let bytes = DhcpEncoder::new().encode(&packet);
        assert!(bytes.len() >= MIN_PACKET_SIZE);
    }

    #[test]
    fn test_encode_terminates_options_with_end() {
        let packet = sample_reply();
        let bytes = DhcpEncoder::new().encode(&packet);
        let after_options = bytes[240..]
            .iter()
            .position(|&b| b == option_codes::END)
            .unwrap();
        assert!(after_options > 0);
    }

    #[test]
    fn test_roundtrip() {
        let packet = sample_reply();
        let bytes = DhcpEncoder::new().encode(&packet);
        let decoded = DhcpParser::new().parse(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_roundtrip_with_empty_headers() {
        let mut packet = sample_reply();
        packet.sname = None;
        packet.file = None;
        packet.options = vec![
            DhcpOption::MessageType(DhcpMessageType::Ack),
            DhcpOption::ClientArch(vec![7, 16]),
            DhcpOption::RelayAgentInfo(vec![0x01, 0x04, 0xde, 0xad, 0xbe, 0xef]),
        ];
        let bytes = DhcpEncoder::new().encode(&packet);
        let decoded = DhcpParser::new().parse(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_long_bootfile_truncated_to_field() {
        let mut packet = sample_reply();
        packet.file = Some("x".repeat(200));
        let bytes = DhcpEncoder::new().encode(&packet);
        assert_eq!(&bytes[108..236], "x".repeat(128).as_bytes());
        assert_eq!(&bytes[236..240], &DHCP_MAGIC_COOKIE);
    }
}
