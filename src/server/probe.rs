//! Network interface probe
//!
//! The discovery beacon identifies this endpoint by the MAC and IPv4
//! address of one named interface. Resolution walks the OS interface list;
//! on early boot the interface may not be up yet, so the lifecycle retries
//! at 1 Hz for up to a minute before declaring the startup fatal.

use crate::error::{Error, Result};
use nix::ifaddrs::getifaddrs;
use std::thread;
use std::time::Duration;

/// Resolve the MAC and IPv4 address of `interface`.
///
/// The IPv4 address is returned as its four network-order octets, which is
/// the form the discovery header carries.
pub fn probe(interface: &str) -> Result<([u8; 6], [u8; 4])> {
    let addrs =
        getifaddrs().map_err(|e| Error::Probe(format!("Failed to list interfaces: {}", e)))?;

    let mut mac: Option<[u8; 6]> = None;
    let mut ip: Option<[u8; 4]> = None;

    // Link-layer and IPv4 addresses arrive as separate entries for the
    // same interface name.
    for ifaddr in addrs {
        if ifaddr.interface_name != interface {
            continue;
        }
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(link) = address.as_link_addr() {
            if let Some(bytes) = link.addr() {
                mac = Some(bytes);
            }
        } else if let Some(sin) = address.as_sockaddr_in() {
            ip = Some(sin.ip().octets());
        }
    }

    match (mac, ip) {
        (Some(mac), Some(ip)) => Ok((mac, ip)),
        (None, _) => Err(Error::Probe(format!(
            "no link-layer address on interface {}",
            interface
        ))),
        (_, None) => Err(Error::Probe(format!(
            "no IPv4 address on interface {}",
            interface
        ))),
    }
}

/// [`probe`] with up to `attempts` tries, one second apart.
pub fn probe_with_retry(interface: &str, attempts: u32) -> Result<([u8; 6], [u8; 4])> {
    for attempt in 1..=attempts {
        match probe(interface) {
            Ok(resolved) => return Ok(resolved),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "Interface probe failed (attempt {}/{}): {}",
                    attempt,
                    attempts,
                    e
                );
                thread::sleep(Duration::from_secs(1));
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::Probe(format!(
        "interface {} could not be resolved",
        interface
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interface_is_an_error() {
        let result = probe("no-such-interface0");
        assert!(matches!(result, Err(Error::Probe(_))));
    }

    #[test]
    fn test_retry_exhaustion_returns_last_error() {
        // Two quick failures; the second one must surface.
        let result = probe_with_retry("no-such-interface0", 2);
        assert!(matches!(result, Err(Error::Probe(_))));
    }
}
