//! Domain models for proxyDHCP boot redirection.
//!
//! This module contains the core domain types that are independent
//! of any infrastructure concerns.

mod dhcp;
mod pxe;

pub use dhcp::{DhcpMessageType, DhcpOption, DhcpPacket, BOOT_REPLY, BOOT_REQUEST, FLAG_BROADCAST};
pub use pxe::{bootfile, transport, BootTarget, ClientType, Machine, PxeArch, Transport, UserClass};
