//! PXE boot request classification.
//!
//! Decides whether a DHCP packet is a request this server should answer
//! and, if so, derives the requesting machine's identity.

use tracing::debug;

use crate::domain::{ClientType, DhcpMessageType, DhcpPacket, Machine, PxeArch, UserClass};
use crate::error::ClassifyError;

/// Options 128-135 are listed as required in RFC 4578 §2.4 but many ROMs
/// omit them; their absence is only worth a diagnostic.
const PXE_EXTRA_OPTIONS: std::ops::RangeInclusive<u8> = 128..=135;

/// Classify a packet as a PXE boot request.
///
/// Accepts DISCOVER and REQUEST packets that carry the PXE option set:
/// option 60 prefixed `PXEClient` or `HTTPClient`, options 93 and 94
/// present, and option 97 either absent or a 17-byte GUID with a zero
/// leading byte. Everything else is rejected with the reason.
pub fn classify(packet: &DhcpPacket) -> Result<Machine, ClassifyError> {
    match packet.message_type() {
        Some(DhcpMessageType::Discover) | Some(DhcpMessageType::Request) => {}
        Some(other) => return Err(ClassifyError::IgnoredType(other.to_string())),
        None => return Err(ClassifyError::IgnoredType("none".to_string())),
    }

    if !packet.is_request() {
        return Err(ClassifyError::IgnoredOpcode(packet.op));
    }

    let vendor_class = packet.vendor_class_id().ok_or(ClassifyError::Opt60Missing)?;
    let client_type = ClientType::from_vendor_class(vendor_class)
        .ok_or_else(|| ClassifyError::InvalidOpt60(vendor_class.to_string()))?;

    let arch_codes = packet.client_arch().ok_or(ClassifyError::Opt93Missing)?;

    if !packet.has_option(94) {
        return Err(ClassifyError::Opt94Missing);
    }

    // A missing GUID is invalid according to the spec, however there are
    // PXE ROMs in the wild that omit the GUID and still expect to boot.
    // The only thing we do with the GUID is mirror it back to the client
    // if it's there, so we might as well accept these buggy ROMs.
    if let Some(guid) = packet.client_uuid() {
        match guid.len() {
            0 => {}
            17 if guid[0] == 0 => {}
            17 => return Err(ClassifyError::Opt97LeadingByte),
            _ => return Err(ClassifyError::Opt97WrongSize),
        }
    }

    if !packet.has_option(55) {
        debug!(hwaddr = %packet.chaddr, "missing option 55 (parameter request list)");
    }
    for code in PXE_EXTRA_OPTIONS {
        if !packet.has_option(code) {
            debug!(hwaddr = %packet.chaddr, option = code, "missing PXE option");
        }
    }

    // Option 93 may carry several codes; the first one we know wins.
    let arch = arch_codes
        .iter()
        .copied()
        .find_map(PxeArch::from_u16)
        .ok_or(ClassifyError::UnknownArch)?;

    let user_class = packet.user_class().map(UserClass::from_bytes);

    Ok(Machine {
        mac: packet.chaddr,
        arch,
        user_class,
        client_type,
    })
}
