//! Controllable process endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::ToggleError;

/// An addressable process that can be told to start or stop profiling.
///
/// The address is the endpoint's identity: it is used both to dial the
/// process and to derive its artifact label, so two endpoints compare equal
/// exactly when they share an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Human-readable label, `<ip>.<port>`, or `<ip>%<scope>.<port>` for
    /// scoped IPv6 addresses
    pub fn label(&self) -> String {
        match self.addr {
            SocketAddr::V6(v6) if v6.scope_id() != 0 => {
                format!("{}%{}.{}", v6.ip(), v6.scope_id(), v6.port())
            }
            addr => format!("{}.{}", addr.ip(), addr.port()),
        }
    }

    /// URI used by the gRPC transport
    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl FromStr for Endpoint {
    type Err = ToggleError;

    /// Accepts `ip:port` literally, otherwise resolves `host:port` and keeps
    /// the first address. Resolution blocks; async callers should look host
    /// names up through the runtime instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Self::new(addr));
        }

        s.to_socket_addrs()
            .map_err(|e| ToggleError::Config(format!("invalid endpoint '{}': {}", s, e)))?
            .next()
            .map(Self::new)
            .ok_or_else(|| ToggleError::Config(format!("endpoint '{}' resolved to nothing", s)))
    }
}
