//! ProxyDHCP server implementation.
//!
//! Two UDP listeners answer PXE boot requests alongside the authoritative
//! DHCP server: port 67 sees the broadcast DISCOVER/REQUEST traffic, port
//! 4011 the directed boot requests from clients that already hold a lease.
//! Address assignment stays the primary server's job.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use macaddr::MacAddr6;
use tracing::{error, info};

use crate::authz::Allower;
use crate::config::ProxyConfig;
use crate::detector::classify;
use crate::parser::{DhcpEncoder, DhcpParser};
use crate::proxydhcp::reply::{build_reply, not_allowed_bootfile};
use crate::proxydhcp::socket::{create_socket, recv_datagram, send_datagram, Datagram};

/// DHCP ports
const DHCP_SERVER_PORT: u16 = 67;
const DHCP_CLIENT_PORT: u16 = 68;

/// ProxyDHCP port (for directed requests)
const PROXY_DHCP_PORT: u16 = 4011;

/// Deadline for a single authorizer call; slower answers suppress the
/// reply and the client retransmits.
const ALLOW_DEADLINE: Duration = Duration::from_secs(2);

/// ProxyDHCP server for PXE boot redirection.
pub struct ProxyDhcpServer {
    config: Arc<ProxyConfig>,
    allower: Arc<dyn Allower>,
    running: Arc<AtomicBool>,
}

impl ProxyDhcpServer {
    /// Create a server over a validated configuration and an authorization
    /// policy.
    pub fn new(config: ProxyConfig, allower: Arc<dyn Allower>) -> Self {
        Self {
            config: Arc::new(config),
            allower,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a handle to stop the server: store `false` and both listeners
    /// drain and exit.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run both listeners until the running flag is cleared.
    pub fn run(&self) -> Result<()> {
        let redirection = create_socket(self.config.bind_ip, DHCP_SERVER_PORT)?;
        let boot = create_socket(self.config.bind_ip, PROXY_DHCP_PORT)?;

        info!(
            "proxyDHCP redirection listener on {}:{}",
            self.config.bind_ip, DHCP_SERVER_PORT
        );
        info!(
            "proxyDHCP boot listener on {}:{}",
            self.config.bind_ip, PROXY_DHCP_PORT
        );
        info!("TFTP endpoint: {}", self.config.tftp_addr);
        info!("HTTP endpoint: {}", self.config.http_addr);
        info!(
            "iPXE script: {}",
            self.config.ipxe_url.join(&self.config.ipxe_script)
        );

        thread::scope(|scope| {
            scope.spawn(|| self.listen(scope, &redirection, "redirection"));
            scope.spawn(|| self.listen(scope, &boot, "boot"));
        });

        info!("proxyDHCP server stopped");
        Ok(())
    }

    /// Listener loop: block briefly for a datagram, hand it to a worker
    /// thread, recheck the running flag.
    fn listen<'scope, 'env>(
        &'env self,
        scope: &'scope thread::Scope<'scope, 'env>,
        socket: &'env UdpSocket,
        listener: &'static str,
    ) {
        while self.running.load(Ordering::SeqCst) {
            match recv_datagram(socket) {
                Ok(Some(datagram)) => {
                    scope.spawn(move || self.handle_datagram(socket, datagram, listener));
                }
                Ok(None) => continue,
                Err(e) => error!("{listener}: receive error: {e:#}"),
            }
        }
    }

    fn handle_datagram(&self, socket: &UdpSocket, datagram: Datagram, listener: &'static str) {
        let Some(reply) = self.handle_payload(&datagram.payload, listener) else {
            return;
        };

        // Clients that don't hold an address yet source from 0.0.0.0; those
        // replies have to go to the broadcast address on the client port.
        let dest = if datagram.peer.ip().is_unspecified() {
            SocketAddrV4::new(Ipv4Addr::BROADCAST, DHCP_CLIENT_PORT)
        } else {
            datagram.peer
        };

        if let Err(e) = send_datagram(socket, &reply, dest, datagram.ifindex) {
            error!("{listener}: failed to send reply to {dest}: {e:#}");
        }
    }

    /// Per-datagram pipeline: decode, classify, authorize, build, encode.
    /// `None` means the datagram is dropped; the client will retry.
    fn handle_payload(&self, payload: &[u8], listener: &'static str) -> Option<Vec<u8>> {
        let packet = match DhcpParser::new().parse(payload) {
            Ok(packet) => packet,
            Err(e) => {
                info!("{listener}: not a DHCP packet: {e}");
                return None;
            }
        };

        let machine = match classify(&packet) {
            Ok(machine) => machine,
            Err(e) => {
                info!("{listener}: ignoring packet from {}: {e}", packet.chaddr);
                return None;
            }
        };

        let mut reply = match build_reply(&packet, &machine, &self.config) {
            Ok(reply) => reply,
            Err(e) => {
                error!("{listener}: failed to build reply for {}: {e}", machine.mac);
                return None;
            }
        };

        match self.authorize(machine.mac) {
            Some(true) => {}
            Some(false) => {
                info!("{listener}: PXE boot not allowed for {}", machine.mac);
                reply.file = Some(not_allowed_bootfile(machine.mac));
            }
            None => {
                info!(
                    "{listener}: authorizer timed out for {}, dropping request",
                    machine.mac
                );
                return None;
            }
        }

        info!(
            "{listener}: answering {} (XID 0x{:08X}, arch {}) -> siaddr {}, bootfile {}",
            machine.mac,
            packet.xid,
            machine.arch,
            reply.siaddr,
            reply.file.as_deref().unwrap_or_default()
        );

        Some(DhcpEncoder::new().encode(&reply))
    }

    /// Run the authorizer with a deadline. `None` means it timed out.
    fn authorize(&self, mac: MacAddr6) -> Option<bool> {
        let (tx, rx) = mpsc::channel();
        let allower = Arc::clone(&self.allower);
        thread::spawn(move || {
            let _ = tx.send(allower.allow(mac));
        });
        rx.recv_timeout(ALLOW_DEADLINE).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowAll;
    use crate::domain::{DhcpMessageType, DhcpOption, DhcpPacket, BOOT_REPLY, BOOT_REQUEST};

    const TFTP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 5);
    const HTTP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 4);

    struct DenyAll;

    impl Allower for DenyAll {
        fn allow(&self, _mac: MacAddr6) -> bool {
            false
        }
    }

    struct StalledAllower;

    impl Allower for StalledAllower {
        fn allow(&self, _mac: MacAddr6) -> bool {
            thread::sleep(ALLOW_DEADLINE + Duration::from_millis(200));
            true
        }
    }

    fn config() -> ProxyConfig {
        ProxyConfig::new(
            Ipv4Addr::UNSPECIFIED,
            SocketAddrV4::new(TFTP_IP, 69),
            SocketAddrV4::new(HTTP_IP, 80),
            "http://192.168.2.3:8080",
            "auto.ipxe",
            "",
        )
        .unwrap()
    }

    fn server_with(allower: Arc<dyn Allower>) -> ProxyDhcpServer {
        ProxyDhcpServer::new(config(), allower)
    }

    fn server() -> ProxyDhcpServer {
        server_with(Arc::new(AllowAll))
    }

    fn request(msg_type: DhcpMessageType, options: Vec<DhcpOption>) -> DhcpPacket {
        let mut all_options = vec![DhcpOption::MessageType(msg_type)];
        all_options.extend(options);
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
            chaddr: MacAddr6::new(0x00, 0x01, 0x02, 0x03, 0x04, 0x05),
            sname: None,
            file: None,
            options: all_options,
        }
    }

    fn pxe_options(vendor_class: &str, arch: u16) -> Vec<DhcpOption> {
        vec![
            DhcpOption::VendorClassId(vendor_class.to_string()),
            DhcpOption::ClientArch(vec![arch]),
            DhcpOption::ClientNdi(vec![1, 2, 1]),
        ]
    }

    fn respond(server: &ProxyDhcpServer, request: &DhcpPacket) -> Option<DhcpPacket> {
        let payload = DhcpEncoder::new().encode(request);
        let reply = server.handle_payload(&payload, "test")?;
        Some(DhcpParser::new().parse(&reply).unwrap())
    }

    #[test]
    fn test_discover_answered_with_offer() {
        // E1: PXEClient discover, EFI x86-64, zeroed 17-byte GUID
        let mut req = request(
            DhcpMessageType::Discover,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );
        req.options.push(DhcpOption::ClientUuid(vec![0u8; 17]));

        let reply = respond(&server(), &req).unwrap();
        assert_eq!(reply.op, BOOT_REPLY);
        assert_eq!(reply.message_type(), Some(DhcpMessageType::Offer));
        assert_eq!(reply.xid, req.xid);
        assert_eq!(reply.chaddr, req.chaddr);
        assert_eq!(reply.siaddr, TFTP_IP);
        assert_eq!(reply.sname.as_deref(), Some("192.168.2.5"));
        assert_eq!(reply.file.as_deref(), Some("ipxe.efi"));
        assert_eq!(reply.vendor_class_id(), Some("PXEClient"));
        assert_eq!(reply.client_uuid(), Some(&[0u8; 17][..]));
        assert!(reply.is_broadcast());
    }

    #[test]
    fn test_ipxe_request_gets_tftp_url() {
        // E2: same machine but chainloaded into stock iPXE
        let mut req = request(
            DhcpMessageType::Request,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );
        req.options.push(DhcpOption::UserClassInfo(b"iPXE".to_vec()));

        let reply = respond(&server(), &req).unwrap();
        assert_eq!(reply.message_type(), Some(DhcpMessageType::Ack));
        assert_eq!(reply.file.as_deref(), Some("tftp://192.168.2.5:69/ipxe.efi"));
    }

    #[test]
    fn test_tinkerbell_request_gets_script() {
        // E3: machine already in our chainloaded iPXE
        let mut req = request(
            DhcpMessageType::Request,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );
        req.options
            .push(DhcpOption::UserClassInfo(b"Tinkerbell".to_vec()));

        let reply = respond(&server(), &req).unwrap();
        assert_eq!(reply.message_type(), Some(DhcpMessageType::Ack));
        assert_eq!(
            reply.file.as_deref(),
            Some("http://192.168.2.3:8080/auto.ipxe")
        );
    }

    #[test]
    fn test_http_client_discover() {
        // E4: HTTPClient without a GUID
        let req = request(
            DhcpMessageType::Discover,
            pxe_options("HTTPClient:Arch:00016:UNDI:003016", 16),
        );

        let reply = respond(&server(), &req).unwrap();
        assert_eq!(reply.message_type(), Some(DhcpMessageType::Offer));
        assert_eq!(reply.vendor_class_id(), Some("HTTPClient"));
        assert_eq!(reply.siaddr, HTTP_IP);
        assert_eq!(
            reply.option(54),
            Some(&DhcpOption::ServerIdentifier(HTTP_IP))
        );
        assert_eq!(
            reply.file.as_deref(),
            Some("http://192.168.2.3:8080/ipxe.efi")
        );
        assert!(reply.client_uuid().is_none());
    }

    #[test]
    fn test_unknown_arch_dropped() {
        // E5: unassigned architecture code 31
        let req = request(
            DhcpMessageType::Discover,
            pxe_options("PXEClient:Arch:00031:UNDI:003016", 31),
        );
        assert!(respond(&server(), &req).is_none());
    }

    #[test]
    fn test_denied_mac_gets_failing_bootfile() {
        // E6: authorizer denies the MAC, everything else unchanged
        let req = request(
            DhcpMessageType::Request,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );

        let reply = respond(&server_with(Arc::new(DenyAll)), &req).unwrap();
        assert_eq!(reply.message_type(), Some(DhcpMessageType::Ack));
        assert_eq!(
            reply.file.as_deref(),
            Some("/00:01:02:03:04:05/not-allowed")
        );
        assert_eq!(reply.siaddr, TFTP_IP);
    }

    #[test]
    fn test_raspberry_pi_gets_extra_suboptions() {
        // E7: Raspberry Pi OUI, EFI ARM64
        let mut req = request(
            DhcpMessageType::Discover,
            pxe_options("PXEClient:Arch:00011:UNDI:003016", 11),
        );
        req.chaddr = MacAddr6::new(0xb8, 0x27, 0xeb, 0xaa, 0xbb, 0xcc);

        let reply = respond(&server(), &req).unwrap();
        let Some(DhcpOption::VendorSpecific(payload)) = reply.option(43) else {
            panic!("option 43 missing");
        };
        // sub-option 6, then 9 and 10 for the Pi
        assert_eq!(&payload[..3], &[6, 1, 8]);
        assert_eq!(payload[3], 9);
        assert_eq!(payload[25], 10);
        assert_eq!(*payload.last().unwrap(), 255);
    }

    #[test]
    fn test_giaddr_and_opt82_echoed() {
        let mut req = request(
            DhcpMessageType::Discover,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );
        req.giaddr = Ipv4Addr::new(10, 0, 0, 1);
        let info = vec![0x01, 0x04, 0xde, 0xad, 0xbe, 0xef];
        req.options.push(DhcpOption::RelayAgentInfo(info.clone()));

        let reply = respond(&server(), &req).unwrap();
        assert_eq!(reply.giaddr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(reply.relay_agent_info(), Some(&info[..]));
    }

    #[test]
    fn test_non_pxe_dhcp_traffic_ignored() {
        // ordinary lease renewal traffic must never be answered
        let req = request(
            DhcpMessageType::Request,
            vec![DhcpOption::VendorClassId("MSFT 5.0".to_string())],
        );
        assert!(respond(&server(), &req).is_none());
    }

    #[test]
    fn test_garbage_payload_ignored() {
        assert!(server().handle_payload(&[0u8; 50], "test").is_none());
    }

    #[test]
    fn test_stalled_authorizer_suppresses_reply() {
        let req = request(
            DhcpMessageType::Request,
            pxe_options("PXEClient:Arch:00007:UNDI:003016", 7),
        );
        assert!(respond(&server_with(Arc::new(StalledAllower)), &req).is_none());
    }

    #[test]
    fn test_running_flag_starts_true() {
        let flag = server().running_flag();
        assert!(flag.load(Ordering::SeqCst));
        flag.store(false, Ordering::SeqCst);
        assert!(!flag.load(Ordering::SeqCst));
    }
}
