//! PXE classification module.
//!
//! This module is responsible for deciding whether a parsed DHCP packet
//! is a PXE boot request this server should answer.

mod pxe_detector;

pub use pxe_detector::classify;
