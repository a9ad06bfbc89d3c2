//! PXE-specific domain models.

use std::fmt;
use std::net::Ipv4Addr;

use macaddr::MacAddr6;

/// PXE client system architecture types as defined in RFC 4578, including
/// the HTTP-boot additions from the IANA processor architecture registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PxeArch {
    IntelX86Pc,
    NecPc98,
    EfiItanium,
    DecAlpha,
    ArcX86,
    IntelLeanClient,
    EfiIa32,
    EfiX8664,
    EfiXscale,
    EfiBc,
    EfiArm32,
    EfiArm64,
    EfiX86Http,
    EfiX8664Http,
    EfiArm32Http,
    EfiArm64Http,
}

impl PxeArch {
    /// Every known architecture, in option-93 code order.
    pub const ALL: [PxeArch; 16] = [
        Self::IntelX86Pc,
        Self::NecPc98,
        Self::EfiItanium,
        Self::DecAlpha,
        Self::ArcX86,
        Self::IntelLeanClient,
        Self::EfiIa32,
        Self::EfiX8664,
        Self::EfiXscale,
        Self::EfiBc,
        Self::EfiArm32,
        Self::EfiArm64,
        Self::EfiX86Http,
        Self::EfiX8664Http,
        Self::EfiArm32Http,
        Self::EfiArm64Http,
    ];

    /// Parse an option-93 code. Unassigned codes yield `None`.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::IntelX86Pc),
            1 => Some(Self::NecPc98),
            2 => Some(Self::EfiItanium),
            3 => Some(Self::DecAlpha),
            4 => Some(Self::ArcX86),
            5 => Some(Self::IntelLeanClient),
            6 => Some(Self::EfiIa32),
            7 => Some(Self::EfiX8664),
            8 => Some(Self::EfiXscale),
            9 => Some(Self::EfiBc),
            10 => Some(Self::EfiArm32),
            11 => Some(Self::EfiArm64),
            15 => Some(Self::EfiX86Http),
            16 => Some(Self::EfiX8664Http),
            18 => Some(Self::EfiArm32Http),
            19 => Some(Self::EfiArm64Http),
            _ => None,
        }
    }

    /// The option-93 wire code.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::IntelX86Pc => 0,
            Self::NecPc98 => 1,
            Self::EfiItanium => 2,
            Self::DecAlpha => 3,
            Self::ArcX86 => 4,
            Self::IntelLeanClient => 5,
            Self::EfiIa32 => 6,
            Self::EfiX8664 => 7,
            Self::EfiXscale => 8,
            Self::EfiBc => 9,
            Self::EfiArm32 => 10,
            Self::EfiArm64 => 11,
            Self::EfiX86Http => 15,
            Self::EfiX8664Http => 16,
            Self::EfiArm32Http => 18,
            Self::EfiArm64Http => 19,
        }
    }
}

impl fmt::Display for PxeArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntelX86Pc => write!(f, "Intel x86PC"),
            Self::NecPc98 => write!(f, "NEC/PC98"),
            Self::EfiItanium => write!(f, "EFI Itanium"),
            Self::DecAlpha => write!(f, "DEC Alpha"),
            Self::ArcX86 => write!(f, "Arc x86"),
            Self::IntelLeanClient => write!(f, "Intel Lean Client"),
            Self::EfiIa32 => write!(f, "EFI IA32"),
            Self::EfiX8664 => write!(f, "EFI x86-64"),
            Self::EfiXscale => write!(f, "EFI Xscale"),
            Self::EfiBc => write!(f, "EFI BC"),
            Self::EfiArm32 => write!(f, "EFI ARM32"),
            Self::EfiArm64 => write!(f, "EFI ARM64"),
            Self::EfiX86Http => write!(f, "EFI x86 HTTP"),
            Self::EfiX8664Http => write!(f, "EFI x86-64 HTTP"),
            Self::EfiArm32Http => write!(f, "EFI ARM32 HTTP"),
            Self::EfiArm64Http => write!(f, "EFI ARM64 HTTP"),
        }
    }
}

/// Transport a client's firmware expects for its default boot binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tftp,
    Http,
}

/// Default iPXE binary and transport per architecture.
const ARCH_TO_BOOTFILE: &[(PxeArch, &str, Transport)] = &[
    (PxeArch::IntelX86Pc, "undionly.kpxe", Transport::Tftp),
    (PxeArch::NecPc98, "undionly.kpxe", Transport::Tftp),
    (PxeArch::EfiItanium, "undionly.kpxe", Transport::Tftp),
    (PxeArch::DecAlpha, "undionly.kpxe", Transport::Tftp),
    (PxeArch::ArcX86, "undionly.kpxe", Transport::Tftp),
    (PxeArch::IntelLeanClient, "undionly.kpxe", Transport::Tftp),
    (PxeArch::EfiIa32, "ipxe.efi", Transport::Tftp),
    (PxeArch::EfiX8664, "ipxe.efi", Transport::Tftp),
    (PxeArch::EfiXscale, "ipxe.efi", Transport::Tftp),
    (PxeArch::EfiBc, "ipxe.efi", Transport::Tftp),
    (PxeArch::EfiArm32, "snp.efi", Transport::Tftp),
    (PxeArch::EfiArm64, "snp.efi", Transport::Tftp),
    (PxeArch::EfiX86Http, "ipxe.efi", Transport::Http),
    (PxeArch::EfiX8664Http, "ipxe.efi", Transport::Http),
    (PxeArch::EfiArm32Http, "snp.efi", Transport::Http),
    (PxeArch::EfiArm64Http, "snp.efi", Transport::Http),
];

/// Look up the default boot binary for an architecture.
pub fn bootfile(arch: PxeArch) -> Option<&'static str> {
    ARCH_TO_BOOTFILE
        .iter()
        .find(|(a, _, _)| *a == arch)
        .map(|(_, bin, _)| *bin)
}

/// Look up the transport class for an architecture.
pub fn transport(arch: PxeArch) -> Option<Transport> {
    ARCH_TO_BOOTFILE
        .iter()
        .find(|(a, _, _)| *a == arch)
        .map(|(_, _, t)| *t)
}

/// Client type from the DHCP option 60 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Pxe,
    Http,
}

impl ClientType {
    /// Derive the client type from a vendor class identifier.
    pub fn from_vendor_class(vendor_class: &str) -> Option<Self> {
        if vendor_class.starts_with(Self::Pxe.as_str()) {
            Some(Self::Pxe)
        } else if vendor_class.starts_with(Self::Http.as_str()) {
            Some(Self::Http)
        } else {
            None
        }
    }

    /// The identifier the PXE spec expects in reply option 60.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pxe => "PXEClient",
            Self::Http => "HTTPClient",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DHCP option 77 user class (RFC 3004).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserClass {
    /// The client has iPXE burned into its ROM (or is a VM using iPXE as
    /// its PXE ROM). It runs native drivers, so chainloading to a UNDI
    /// stack won't work.
    Ipxe,
    /// The client already runs the full-featured iPXE we chainloaded it
    /// into. Distinguished so we don't loop on the chainload step.
    Tinkerbell,
    /// Anything else, kept verbatim for matching the operator's custom class.
    Other(String),
}

impl UserClass {
    /// Interpret the option 77 bytes as a user class string.
    pub fn from_bytes(raw: &[u8]) -> Self {
        match String::from_utf8_lossy(raw).as_ref() {
            "iPXE" => Self::Ipxe,
            "Tinkerbell" => Self::Tinkerbell,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ipxe => "iPXE",
            Self::Tinkerbell => "Tinkerbell",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for UserClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device requesting a network boot, derived from a classified packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub mac: MacAddr6,
    pub arch: PxeArch,
    pub user_class: Option<UserClass>,
    pub client_type: ClientType,
}

/// Where a classified machine is steered next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootTarget {
    /// Server identifier carried in option 54 and the siaddr header.
    pub server_ident: Ipv4Addr,
    /// Server hostname header; the dotted quad of `server_ident`.
    pub sname: String,
    /// Boot filename header: a bare binary name or a full URL.
    pub bootfile: String,
}
