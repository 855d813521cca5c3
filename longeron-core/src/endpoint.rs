//! Endpoint addressing for client and server sockets.
//!
//! An [`Endpoint`] pairs a host with a port and an address family. The
//! family drives resolution: an IPv4 endpoint only ever resolves to a V4
//! socket address, an IPv6 endpoint only to a V6 one.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use thiserror::Error;

/// The address families supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    /// IPv4 in dot notation, or a name resolving to one.
    #[default]
    Ipv4,
    /// IPv6, displayed enclosed in brackets.
    Ipv6,
}

/// Errors raised when parsing or resolving an [`Endpoint`].
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The textual form could not be split into host and port.
    #[error("invalid endpoint: {0}")]
    Invalid(String),

    /// Resolution produced no address of the requested family.
    #[error("cannot resolve {endpoint} as {family:?}: {reason}")]
    Unresolvable {
        endpoint: String,
        family: AddressFamily,
        reason: String,
    },
}

/// A host/port/family triple identifying one side of a TCP connection.
///
/// # Examples
///
/// ```
/// use longeron_core::endpoint::{AddressFamily, Endpoint};
///
/// let ep = Endpoint::new("127.0.0.1", 8080, AddressFamily::Ipv4);
/// assert_eq!(ep.to_string(), "127.0.0.1:8080");
///
/// let ep: Endpoint = "localhost:9000".parse().unwrap();
/// assert_eq!(ep.port(), 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    family: AddressFamily,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    pub fn new(host: impl Into<String>, port: u16, family: AddressFamily) -> Self {
        Self {
            host: host.into(),
            port,
            family,
        }
    }

    /// The host name or literal address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The address family resolution is constrained to.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    /// Resolve to a socket address of this endpoint's family.
    ///
    /// # Errors
    ///
    /// [`EndpointError::Unresolvable`] when resolution fails or yields no
    /// address of the requested family.
    pub fn resolve(&self) -> Result<SocketAddr, EndpointError> {
        let unresolvable = |reason: String| EndpointError::Unresolvable {
            endpoint: self.to_string(),
            family: self.family,
            reason,
        };

        let candidates = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| unresolvable(e.to_string()))?;

        candidates
            .into_iter()
            .find(|addr| match self.family {
                AddressFamily::Ipv4 => addr.is_ipv4(),
                AddressFamily::Ipv6 => addr.is_ipv6(),
            })
            .ok_or_else(|| unresolvable("no address of the requested family".into()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            AddressFamily::Ipv4 => write!(f, "{}:{}", self.host, self.port),
            AddressFamily::Ipv6 => write!(f, "[{}]:{}", self.host, self.port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parse `host:port` or `[host]:port`; the bracketed form selects IPv6.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EndpointError::Invalid(s.to_string());

        if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest.split_once("]:").ok_or_else(invalid)?;
            let port = port.parse().map_err(|_| invalid())?;
            return Ok(Self::new(host, port, AddressFamily::Ipv6));
        }

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port, AddressFamily::Ipv4))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        let family = if addr.is_ipv4() {
            AddressFamily::Ipv4
        } else {
            AddressFamily::Ipv6
        };
        Self::new(addr.ip().to_string(), addr.port(), family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_v4() {
        let ep = Endpoint::new("10.0.0.1", 8080, AddressFamily::Ipv4);
        assert_eq!(ep.to_string(), "10.0.0.1:8080");
    }

    #[test]
    fn test_display_v6_brackets() {
        let ep = Endpoint::new("::1", 8080, AddressFamily::Ipv6);
        assert_eq!(ep.to_string(), "[::1]:8080");
    }

    #[test]
    fn test_parse_v4() {
        let ep: Endpoint = "localhost:9000".parse().unwrap();
        assert_eq!(ep.host(), "localhost");
        assert_eq!(ep.port(), 9000);
        assert_eq!(ep.family(), AddressFamily::Ipv4);
    }

    #[test]
    fn test_parse_v6() {
        let ep: Endpoint = "[::1]:9000".parse().unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.family(), AddressFamily::Ipv6);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":1234".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_resolve_loopback_v4() {
        let ep = Endpoint::new("127.0.0.1", 4242, AddressFamily::Ipv4);
        let addr = ep.resolve().unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 4242);
    }

    #[test]
    fn test_resolve_family_mismatch() {
        let ep = Endpoint::new("127.0.0.1", 4242, AddressFamily::Ipv6);
        assert!(ep.resolve().is_err());
    }

    #[test]
    fn test_from_socket_addr() {
        let ep: Endpoint = "127.0.0.1:80".parse::<SocketAddr>().unwrap().into();
        assert_eq!(ep.family(), AddressFamily::Ipv4);
        assert_eq!(ep.port(), 80);
    }
}
