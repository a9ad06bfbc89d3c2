//! ProxyDHCP reply synthesis.
//!
//! Builds the DHCP reply that steers a classified PXE client to its next
//! boot artifact: headers, options 43/53/54/60/97/82, and the bootfile
//! cascade.

use std::net::Ipv4Addr;

use macaddr::MacAddr6;
use tracing::info;

use crate::config::ProxyConfig;
use crate::domain::{
    self, BootTarget, ClientType, DhcpMessageType, DhcpOption, DhcpPacket, Machine, UserClass,
    BOOT_REPLY, FLAG_BROADCAST,
};
use crate::error::BuildError;

/// PXE sub-option: boot server discovery control.
const PXE_DISCOVERY_CONTROL: u8 = 6;
/// Discovery control value: bypass discovery, boot straight from the filename.
const DISCOVERY_BYPASS: u8 = 8;
/// Terminator of the nested option 43 TLV list.
const PXE_SUBOPTION_END: u8 = 255;

/// Raspberry Pi Foundation OUIs. Pis need extra option 43 sub-options and
/// the MAC prefix is the only way to spot one at this stage.
const RASPBERRY_PI_OUIS: [[u8; 3]; 3] = [
    [0xb8, 0x27, 0xeb],
    [0xdc, 0xa6, 0x32],
    [0xe4, 0x5f, 0x01],
];

/// Sub-option 9 value, hex 00001152617370626572727920506920426f6f74.
const RPI_BOOT_MENU: &[u8] = b"\x00\x00\x11Raspberry Pi Boot";
/// Sub-option 10 value, hex 00505845.
const RPI_MENU_PROMPT: &[u8] = b"\x00PXE";

/// Pick the boot server, sname, and bootfile for a classified machine.
///
/// The server identifier follows the client type: TFTP for `PXEClient`,
/// HTTP for `HTTPClient`. The bootfile cascade is first-match:
/// 1. `Tinkerbell` or the operator's custom user class gets the iPXE
///    script URL, which is what breaks iPXE chainload loops;
/// 2. HTTP clients fetch their binary from the iPXE server host;
/// 3. stock iPXE gets a fully qualified `tftp://` URL, since it runs
///    native drivers and chainloading over UNDI won't work;
/// 4. everyone else gets the bare binary name, served via siaddr/sname.
pub fn boot_target(machine: &Machine, config: &ProxyConfig) -> Result<BootTarget, BuildError> {
    let binary =
        domain::bootfile(machine.arch).ok_or(BuildError::ArchNotFound(machine.arch))?;

    let server_ident = match machine.client_type {
        ClientType::Pxe => *config.tftp_addr.ip(),
        ClientType::Http => *config.http_addr.ip(),
    };

    let user_class = machine.user_class.as_ref();
    let custom_match = !config.user_class.is_empty()
        && user_class.map(UserClass::as_str) == Some(config.user_class.as_str());

    let bootfile = if matches!(user_class, Some(UserClass::Tinkerbell)) || custom_match {
        config.ipxe_url.join(&config.ipxe_script)
    } else if machine.client_type == ClientType::Http {
        format!("{}/{}", config.ipxe_url.origin(), binary)
    } else if matches!(user_class, Some(UserClass::Ipxe)) {
        format!("tftp://{}/{}", config.tftp_addr, binary)
    } else {
        binary.to_string()
    };

    Ok(BootTarget {
        server_ident,
        sname: server_ident.to_string(),
        bootfile,
    })
}

/// Build the full reply for an accepted request.
///
/// DISCOVER is answered with OFFER, REQUEST with ACK. The transaction id,
/// chaddr, and giaddr are copied from the request, the broadcast flag is
/// set, and siaddr carries the server identifier; without it PXE clients
/// broadcast their second-phase request to port 4011 and stall.
pub fn build_reply(
    request: &DhcpPacket,
    machine: &Machine,
    config: &ProxyConfig,
) -> Result<DhcpPacket, BuildError> {
    let target = boot_target(machine, config)?;

    // classify only admits DISCOVER and REQUEST
    let message_type = match request.message_type() {
        Some(DhcpMessageType::Request) => DhcpMessageType::Ack,
        _ => DhcpMessageType::Offer,
    };

    let mut options = vec![
        DhcpOption::MessageType(message_type),
        DhcpOption::ServerIdentifier(target.server_ident),
        DhcpOption::VendorClassId(machine.client_type.as_str().to_string()),
        DhcpOption::VendorSpecific(vendor_options(machine.mac)),
    ];
    if let Some(guid) = request.client_uuid() {
        options.push(DhcpOption::ClientUuid(guid.to_vec()));
    }
    if let Some(info) = request.relay_agent_info() {
        options.push(DhcpOption::RelayAgentInfo(info.to_vec()));
    }

    Ok(DhcpPacket {
        op: BOOT_REPLY,
        htype: request.htype,
        hlen: request.hlen,
        hops: 0,
        xid: request.xid,
        secs: 0,
        flags: FLAG_BROADCAST,
        ciaddr: Ipv4Addr::UNSPECIFIED,
        yiaddr: Ipv4Addr::UNSPECIFIED,
        siaddr: target.server_ident,
        giaddr: request.giaddr,
        chaddr: request.chaddr,
        sname: Some(target.sname),
        file: Some(target.bootfile),
        options,
    })
}

/// Bootfile handed to clients the authorizer rejects. A definite but
/// failing target beats a silent drop when someone has to debug why a
/// machine won't netboot.
pub fn not_allowed_bootfile(mac: MacAddr6) -> String {
    format!("/{mac}/not-allowed")
}

/// Option 43 payload: a nested TLV list with its own END terminator.
///
/// Sub-option 6 tells the client to bypass boot server discovery and load
/// the filename directly. Raspberry Pis additionally need sub-options 9
/// and 10.
fn vendor_options(mac: MacAddr6) -> Vec<u8> {
    let mut buf = vec![PXE_DISCOVERY_CONTROL, 1, DISCOVERY_BYPASS];

    if is_raspberry_pi(mac) {
        info!(hwaddr = %mac, "Raspberry Pi detected, adding option 43 sub-options 9 and 10");
        buf.push(9);
        buf.push(RPI_BOOT_MENU.len() as u8);
        buf.extend_from_slice(RPI_BOOT_MENU);
        buf.push(10);
        buf.push(RPI_MENU_PROMPT.len() as u8);
        buf.extend_from_slice(RPI_MENU_PROMPT);
    }

    buf.push(PXE_SUBOPTION_END);
    buf
}

fn is_raspberry_pi(mac: MacAddr6) -> bool {
    let oui = &mac.as_bytes()[..3];
    RASPBERRY_PI_OUIS.iter().any(|prefix| &prefix[..] == oui)
}
