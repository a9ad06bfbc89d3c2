//! ProxyDHCP server module.
//!
//! Implements a proxyDHCP server that provides PXE boot information
//! without interfering with the main DHCP server's IP allocation.

pub mod reply;
mod server;
mod socket;

pub use server::ProxyDhcpServer;
