//! Validated server configuration.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use crate::error::ConfigError;

/// Process-wide proxyDHCP configuration, immutable after construction.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// IP to bind both listeners to.
    pub bind_ip: Ipv4Addr,
    /// TFTP server handing out iPXE binaries.
    pub tftp_addr: SocketAddrV4,
    /// HTTP server handing out iPXE binaries.
    pub http_addr: SocketAddrV4,
    /// Base URL where the iPXE script is served.
    pub ipxe_url: IpxeUrl,
    /// Leaf name of the iPXE script.
    pub ipxe_script: String,
    /// Custom user class that pivots a client to the iPXE script.
    /// Empty disables the custom match; `Tinkerbell` always matches.
    pub user_class: String,
}

impl ProxyConfig {
    /// Build a validated configuration. Endpoints must have a non-zero IP
    /// and port and the script name must not be empty.
    pub fn new(
        bind_ip: Ipv4Addr,
        tftp_addr: SocketAddrV4,
        http_addr: SocketAddrV4,
        ipxe_url: &str,
        ipxe_script: impl Into<String>,
        user_class: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if tftp_addr.ip().is_unspecified() || tftp_addr.port() == 0 {
            return Err(ConfigError::InvalidTftpAddr(tftp_addr));
        }
        if http_addr.ip().is_unspecified() || http_addr.port() == 0 {
            return Err(ConfigError::InvalidHttpAddr(http_addr));
        }

        let ipxe_url = ipxe_url.parse()?;

        let ipxe_script = ipxe_script.into();
        if ipxe_script.is_empty() {
            return Err(ConfigError::EmptyScriptName);
        }

        Ok(Self {
            bind_ip,
            tftp_addr,
            http_addr,
            ipxe_url,
            ipxe_script,
            user_class: user_class.into(),
        })
    }
}

/// An absolute http(s) URL pointing at the iPXE script server, with the
/// pieces needed for bootfile construction split out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpxeUrl {
    scheme: String,
    /// host or host:port
    authority: String,
    /// empty or starts with '/'; never ends with '/'
    path: String,
}

impl IpxeUrl {
    /// Scheme and host only, e.g. `http://192.168.2.4`.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// The full URL with `leaf` appended, e.g. `http://192.168.2.3:8080/auto.ipxe`.
    pub fn join(&self, leaf: &str) -> String {
        format!("{}://{}{}/{}", self.scheme, self.authority, self.path, leaf)
    }
}

impl FromStr for IpxeUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidIpxeUrl {
            url: s.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = s.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if scheme != "http" && scheme != "https" {
            return Err(invalid("scheme must be http or https"));
        }

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], rest[i..].trim_end_matches('/')),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for IpxeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)
    }
}
