//! DHCP packet domain models.
//!
//! These types represent the logical structure of DHCPv4 packets,
//! independent of wire format parsing.

use std::net::Ipv4Addr;

use macaddr::MacAddr6;

/// BOOTP operation code for client requests.
pub const BOOT_REQUEST: u8 = 1;
/// BOOTP operation code for server replies.
pub const BOOT_REPLY: u8 = 2;

/// Broadcast bit of the `flags` header field.
pub const FLAG_BROADCAST: u16 = 0x8000;

/// DHCP message types as defined in RFC 2131.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl DhcpMessageType {
    /// Parse from the DHCP option 53 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Discover),
            2 => Some(Self::Offer),
            3 => Some(Self::Request),
            4 => Some(Self::Decline),
            5 => Some(Self::Ack),
            6 => Some(Self::Nak),
            7 => Some(Self::Release),
            8 => Some(Self::Inform),
            _ => None,
        }
    }

    /// The option 53 wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Discover => 1,
            Self::Offer => 2,
            Self::Request => 3,
            Self::Decline => 4,
            Self::Ack => 5,
            Self::Nak => 6,
            Self::Release => 7,
            Self::Inform => 8,
        }
    }
}

impl std::fmt::Display for DhcpMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

/// DHCP options this server reads or writes. Unknown codes are retained
/// verbatim so they survive a decode/encode round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    /// Option 43: Vendor-specific information (PXE sub-options)
    VendorSpecific(Vec<u8>),
    /// Option 53: DHCP Message Type
    MessageType(DhcpMessageType),
    /// Option 54: Server Identifier
    ServerIdentifier(Ipv4Addr),
    /// Option 55: Parameter Request List
    ParameterRequestList(Vec<u8>),
    /// Option 60: Vendor Class Identifier (e.g., "PXEClient:...")
    VendorClassId(String),
    /// Option 77: User Class
    UserClassInfo(Vec<u8>),
    /// Option 82: Relay Agent Information
    RelayAgentInfo(Vec<u8>),
    /// Option 93: Client System Architecture (may carry several codes)
    ClientArch(Vec<u16>),
    /// Option 94: Client Network Interface Identifier
    ClientNdi(Vec<u8>),
    /// Option 97: Client Machine Identifier (GUID)
    ClientUuid(Vec<u8>),
    /// Unknown option (code, data)
    Unknown(u8, Vec<u8>),
}

impl DhcpOption {
    /// The option code as it appears on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::VendorSpecific(_) => 43,
            Self::MessageType(_) => 53,
            Self::ServerIdentifier(_) => 54,
            Self::ParameterRequestList(_) => 55,
            Self::VendorClassId(_) => 60,
            Self::UserClassInfo(_) => 77,
            Self::RelayAgentInfo(_) => 82,
            Self::ClientArch(_) => 93,
            Self::ClientNdi(_) => 94,
            Self::ClientUuid(_) => 97,
            Self::Unknown(code, _) => *code,
        }
    }

    /// The option value as it appears on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::VendorSpecific(data) => data.clone(),
            Self::MessageType(msg_type) => vec![msg_type.as_u8()],
            Self::ServerIdentifier(ip) => ip.octets().to_vec(),
            Self::ParameterRequestList(data) => data.clone(),
            Self::VendorClassId(s) => s.as_bytes().to_vec(),
            Self::UserClassInfo(data) => data.clone(),
            Self::RelayAgentInfo(data) => data.clone(),
            Self::ClientArch(codes) => codes.iter().flat_map(|c| c.to_be_bytes()).collect(),
            Self::ClientNdi(data) => data.clone(),
            Self::ClientUuid(data) => data.clone(),
            Self::Unknown(_, data) => data.clone(),
        }
    }
}

/// A parsed DHCP packet with all fields relevant to PXE redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpPacket {
    /// Operation: 1 = BOOTREQUEST, 2 = BOOTREPLY
    pub op: u8,
    /// Hardware type (1 = Ethernet)
    pub htype: u8,
    /// Hardware address length
    pub hlen: u8,
    /// Relay hop count
    pub hops: u8,
    /// Transaction ID
    pub xid: u32,
    /// Seconds elapsed
    pub secs: u16,
    /// Flags; bit 15 is the broadcast bit
    pub flags: u16,
    /// Client IP address (if already known)
    pub ciaddr: Ipv4Addr,
    /// 'Your' IP address (assigned by server)
    pub yiaddr: Ipv4Addr,
    /// Server IP address
    pub siaddr: Ipv4Addr,
    /// Gateway (relay) IP address
    pub giaddr: Ipv4Addr,
    /// Client hardware address (MAC)
    pub chaddr: MacAddr6,
    /// Server hostname (optional)
    pub sname: Option<String>,
    /// Boot filename (optional)
    pub file: Option<String>,
    /// DHCP options, in wire order
    pub options: Vec<DhcpOption>,
}

impl DhcpPacket {
    /// Returns true if this is a client request (BOOTREQUEST).
    pub fn is_request(&self) -> bool {
        self.op == BOOT_REQUEST
    }

    /// Returns true if this is a server reply (BOOTREPLY).
    pub fn is_reply(&self) -> bool {
        self.op == BOOT_REPLY
    }

    /// Whether the broadcast flag is set.
    pub fn is_broadcast(&self) -> bool {
        self.flags & FLAG_BROADCAST != 0
    }

    /// Get the DHCP message type from options.
    pub fn message_type(&self) -> Option<DhcpMessageType> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::MessageType(msg_type) = opt {
                Some(*msg_type)
            } else {
                None
            }
        })
    }

    /// Get the vendor class identifier (Option 60).
    pub fn vendor_class_id(&self) -> Option<&str> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::VendorClassId(ref s) = opt {
                Some(s.as_str())
            } else {
                None
            }
        })
    }

    /// Get the client architecture codes (Option 93).
    pub fn client_arch(&self) -> Option<&[u16]> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::ClientArch(ref codes) = opt {
                Some(codes.as_slice())
            } else {
                None
            }
        })
    }

    /// Get the raw user class (Option 77).
    pub fn user_class(&self) -> Option<&[u8]> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::UserClassInfo(ref data) = opt {
                Some(data.as_slice())
            } else {
                None
            }
        })
    }

    /// Get the client machine identifier (Option 97).
    pub fn client_uuid(&self) -> Option<&[u8]> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::ClientUuid(ref guid) = opt {
                Some(guid.as_slice())
            } else {
                None
            }
        })
    }

    /// Get the relay agent information (Option 82).
    pub fn relay_agent_info(&self) -> Option<&[u8]> {
        self.options.iter().find_map(|opt| {
            if let DhcpOption::RelayAgentInfo(ref data) = opt {
                Some(data.as_slice())
            } else {
                None
            }
        })
    }

    /// Look up an option by wire code.
    pub fn option(&self, code: u8) -> Option<&DhcpOption> {
        self.options.iter().find(|opt| opt.code() == code)
    }

    /// Whether an option with the given code is present.
    pub fn has_option(&self, code: u8) -> bool {
        self.option(code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_options(options: Vec<DhcpOption>) -> DhcpPacket {
        DhcpPacket {
            op: BOOT_REQUEST,
            htype: 1,
            hlen: 6,
            hops: 0,
            xid: 0x12345678,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: MacAddr6::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff),
            sname: None,
            file: None,
            options,
        }
    }

    #[test]
    fn test_message_type_roundtrip() {
        for value in 1..=8 {
            let msg_type = DhcpMessageType::from_u8(value).unwrap();
            assert_eq!(msg_type.as_u8(), value);
        }
        assert_eq!(DhcpMessageType::from_u8(0), None);
        assert_eq!(DhcpMessageType::from_u8(9), None);
    }

    #[test]
    fn test_option_codes() {
        assert_eq!(DhcpOption::VendorSpecific(vec![]).code(), 43);
        assert_eq!(DhcpOption::MessageType(DhcpMessageType::Offer).code(), 53);
        assert_eq!(DhcpOption::ServerIdentifier(Ipv4Addr::LOCALHOST).code(), 54);
        assert_eq!(DhcpOption::VendorClassId(String::new()).code(), 60);
        assert_eq!(DhcpOption::UserClassInfo(vec![]).code(), 77);
        assert_eq!(DhcpOption::RelayAgentInfo(vec![]).code(), 82);
        assert_eq!(DhcpOption::ClientArch(vec![]).code(), 93);
        assert_eq!(DhcpOption::ClientNdi(vec![]).code(), 94);
        assert_eq!(DhcpOption::ClientUuid(vec![]).code(), 97);
        assert_eq!(DhcpOption::Unknown(128, vec![]).code(), 128);
    }

    #[test]
    fn test_client_arch_bytes_are_big_endian() {
        let opt = DhcpOption::ClientArch(vec![7, 16]);
        assert_eq!(opt.to_bytes(), vec![0x00, 0x07, 0x00, 0x10]);
    }

    #[test]
    fn test_server_identifier_bytes() {
        let opt = DhcpOption::ServerIdentifier(Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(opt.to_bytes(), vec![192, 168, 1, 5]);
    }

    #[test]
    fn test_typed_accessors() {
        let packet = packet_with_options(vec![
            DhcpOption::MessageType(DhcpMessageType::Discover),
            DhcpOption::VendorClassId("PXEClient:Arch:00007".to_string()),
            DhcpOption::ClientArch(vec![7]),
            DhcpOption::UserClassInfo(b"iPXE".to_vec()),
            DhcpOption::ClientUuid(vec![0u8; 17]),
            DhcpOption::RelayAgentInfo(vec![1, 2, 3]),
        ]);

        assert_eq!(packet.message_type(), Some(DhcpMessageType::Discover));
        assert_eq!(packet.vendor_class_id(), Some("PXEClient:Arch:00007"));
        assert_eq!(packet.client_arch(), Some(&[7u16][..]));
        assert_eq!(packet.user_class(), Some(&b"iPXE"[..]));
        assert_eq!(packet.client_uuid(), Some(&[0u8; 17][..]));
        assert_eq!(packet.relay_agent_info(), Some(&[1u8, 2, 3][..]));
        assert!(packet.has_option(93));
        assert!(!packet.has_option(55));
    }

    #[test]
    fn test_unknown_option_lookup() {
        let packet = packet_with_options(vec![DhcpOption::Unknown(128, vec![9])]);
        assert!(packet.has_option(128));
        assert_eq!(packet.option(128), Some(&DhcpOption::Unknown(128, vec![9])));
    }

    #[test]
    fn test_broadcast_flag() {
        let mut packet = packet_with_options(vec![]);
        assert!(!packet.is_broadcast());
        packet.flags = FLAG_BROADCAST;
        assert!(packet.is_broadcast());
    }

    #[test]
    fn test_op_predicates() {
        let mut packet = packet_with_options(vec![]);
        assert!(packet.is_request());
        assert!(!packet.is_reply());
        packet.op = BOOT_REPLY;
        assert!(packet.is_reply());
    }
}
