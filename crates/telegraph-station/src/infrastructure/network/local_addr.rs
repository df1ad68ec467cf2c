//! Discovers the address this station is reachable on.
//!
//! The operator tells the peer this address, and role negotiation compares
//! it with the peer's.  "Connecting" a UDP socket sends nothing; it only asks
//! the OS which local interface it would route through, which is the
//! non-loopback address we want.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Well-known public address used only for the routing lookup.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// Returns the local IP address of the default route.
///
/// # Errors
///
/// Returns the I/O error if the host has no usable route.
pub fn discover_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(ROUTE_PROBE)?;
    Ok(socket.local_addr()?.ip())
}

/// Like [`discover_local_ip`], falling back to loopback when offline.
pub fn local_ip_or_loopback() -> IpAddr {
    match discover_local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!("could not determine local address ({e}); using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
