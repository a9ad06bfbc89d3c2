//! UDP socket plumbing with per-packet interface affinity.
//!
//! A reply must egress the interface its request arrived on, so sockets
//! are created with `IP_PKTINFO` and datagrams move through
//! `recvmsg`/`sendmsg` carrying `Ipv4PacketInfo` control messages.

use std::io::{IoSlice, IoSliceMut};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::cmsg_space;
use nix::errno::Errno;
use nix::sys::socket::{
    recvmsg, sendmsg, setsockopt, sockopt, ControlMessage, ControlMessageOwned, MsgFlags,
    SockaddrIn,
};
use socket2::{Domain, Protocol, Socket, Type};

/// How long a listener blocks in recvmsg before rechecking its stop flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest datagram we accept; DHCP fits comfortably in one MTU.
const MAX_DATAGRAM: usize = 1500;

/// A received datagram with its source and inbound interface index.
#[derive(Debug)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub peer: SocketAddrV4,
    pub ifindex: i32,
}

/// Create a reusable broadcast UDP socket bound to `ip:port`, with
/// `IP_PKTINFO` enabled and a short read timeout.
pub fn create_socket(ip: Ipv4Addr, port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("failed to create socket")?;

    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(READ_TIMEOUT))?;

    let addr = SocketAddrV4::new(ip, port);
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind to {addr}"))?;

    setsockopt(socket.as_raw_fd(), sockopt::Ipv4PacketInfo, &true)
        .context("failed to enable IP_PKTINFO")?;

    Ok(socket.into())
}

/// Receive one datagram. `Ok(None)` means the read timed out and the
/// caller should check its stop flag.
pub fn recv_datagram(socket: &UdpSocket) -> Result<Option<Datagram>> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut cmsg = cmsg_space!(libc::in_pktinfo);

    let (len, peer, ifindex) = {
        let mut iov = [IoSliceMut::new(&mut buf)];
        let msg = match recvmsg::<SockaddrIn>(
            socket.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg),
            MsgFlags::empty(),
        ) {
            Ok(msg) => msg,
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => return Ok(None),
            Err(e) => return Err(e).context("recvmsg failed"),
        };

        let peer = msg
            .address
            .map(|addr| SocketAddrV4::new(Ipv4Addr::from(addr.ip()), addr.port()))
            .unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        let ifindex = msg
            .cmsgs()
            .find_map(|c| match c {
                ControlMessageOwned::Ipv4PacketInfo(info) => Some(info.ipi_ifindex),
                _ => None,
            })
            .unwrap_or(0);

        (msg.bytes, peer, ifindex)
    };

    buf.truncate(len);
    Ok(Some(Datagram {
        payload: buf,
        peer,
        ifindex,
    }))
}

/// Send a reply out a specific interface via an `Ipv4PacketInfo` control
/// message. An ifindex of 0 lets the kernel route normally.
pub fn send_datagram(
    socket: &UdpSocket,
    payload: &[u8],
    peer: SocketAddrV4,
    ifindex: i32,
) -> Result<()> {
    let iov = [IoSlice::new(payload)];
    let addr = SockaddrIn::from(peer);

    let pktinfo = libc::in_pktinfo {
        ipi_ifindex: ifindex,
        ipi_spec_dst: libc::in_addr { s_addr: 0 },
        ipi_addr: libc::in_addr { s_addr: 0 },
    };
    let cmsgs = [ControlMessage::Ipv4PacketInfo(&pktinfo)];
    let cmsgs = if ifindex > 0 { &cmsgs[..] } else { &[] };

    sendmsg(
        socket.as_raw_fd(),
        &iov,
        cmsgs,
        MsgFlags::empty(),
        Some(&addr),
    )
    .with_context(|| format!("failed to send to {peer}"))?;

    Ok(())
}
