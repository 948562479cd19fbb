//! Identity of the scanning machine.

use std::cmp::Reverse;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs, UdpSocket};
#[cfg(target_os = "linux")]
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use omnifile_core::FileRecord;

const UNKNOWN: &str = "unknown";

/// Hostname, IPv4 address and MAC address stamped on every record.
///
/// Detected once per run and reused for every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostIdentity {
    pub hostname: String,
    pub ip: String,
    pub mac: String,
}

impl HostIdentity {
    /// Create an identity from known values.
    pub fn new(
        hostname: impl Into<String>,
        ip: impl Into<String>,
        mac: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            mac: mac.into(),
        }
    }

    /// Detect the identity of this machine. Values that cannot be
    /// determined are reported as `unknown`.
    ///
    /// The IP is the source address of the default route, and the MAC is
    /// taken from the interface carrying that route. When no route exists
    /// the IP comes from resolving the hostname and the MAC from the first
    /// interface that is up.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string());

        let routed = routed_ipv4();
        let ip = routed
            .or_else(|| resolved_ipv4(&hostname))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let mac = routed
            .and_then(|_| route_interface(ROUTE_TARGET))
            .and_then(|iface| interface_mac(&iface))
            .or_else(first_up_mac)
            .unwrap_or_else(|| UNKNOWN.to_string());

        debug!(hostname = %hostname, ip = %ip, mac = %mac, "Detected host identity");
        Self { hostname, ip, mac }
    }

    /// Stamp this identity onto a record.
    pub fn apply(&self, record: &mut FileRecord) {
        record.host = Some(self.hostname.clone());
        record.ip = Some(self.ip.clone());
        record.mac = Some(self.mac.clone());
    }
}

// Documentation address; connecting a UDP socket to it sends nothing.
const ROUTE_TARGET: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

/// Source address the routing table picks for outbound traffic.
fn routed_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((ROUTE_TARGET, 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if usable(ip) => Some(ip),
        _ => None,
    }
}

fn resolved_ipv4(hostname: &str) -> Option<Ipv4Addr> {
    (hostname, 0)
        .to_socket_addrs()
        .ok()?
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) if usable(ip) => Some(ip),
            _ => None,
        })
        .next()
}

fn usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

/// Interface of the most specific route to `target` in a
/// `/proc/net/route` table; ties go to the lowest metric.
///
/// Addresses in the table are the raw network-order words printed as hex.
fn select_route(table: &str, target: Ipv4Addr) -> Option<String> {
    let target = u32::from_ne_bytes(target.octets());
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let iface = *fields.first()?;
            let destination = u32::from_str_radix(fields.get(1)?, 16).ok()?;
            let flags = u32::from_str_radix(fields.get(3)?, 16).ok()?;
            let metric: u32 = fields.get(6)?.parse().ok()?;
            let mask = u32::from_str_radix(fields.get(7)?, 16).ok()?;
            (flags & RTF_UP != 0 && target & mask == destination)
                .then(|| (mask.count_ones(), Reverse(metric), iface.to_string()))
        })
        .max_by_key(|(bits, metric, _)| (*bits, *metric))
        .map(|(_, _, iface)| iface)
}

const RTF_UP: u32 = 0x1;

#[cfg(target_os = "linux")]
fn route_interface(target: Ipv4Addr) -> Option<String> {
    select_route(&std::fs::read_to_string("/proc/net/route").ok()?, target)
}

#[cfg(not(target_os = "linux"))]
fn route_interface(_target: Ipv4Addr) -> Option<String> {
    None
}

#[cfg(target_os = "linux")]
fn interface_mac(iface: &str) -> Option<String> {
    let mac = std::fs::read_to_string(Path::new("/sys/class/net").join(iface).join("address")).ok()?;
    let mac = mac.trim();
    (!mac.is_empty() && mac != "00:00:00:00:00:00").then(|| mac.to_string())
}

#[cfg(not(target_os = "linux"))]
fn interface_mac(_iface: &str) -> Option<String> {
    None
}

/// MAC address of the first operational interface, by name.
#[cfg(target_os = "linux")]
fn first_up_mac() -> Option<String> {
    let mut interfaces: Vec<String> = std::fs::read_dir("/sys/class/net")
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    interfaces.sort();

    interfaces.into_iter().find_map(|iface| {
        let state = std::fs::read_to_string(Path::new("/sys/class/net").join(&iface).join("operstate")).ok()?;
        if state.trim() != "up" {
            return None;
        }
        interface_mac(&iface)
    })
}

#[cfg(not(target_os = "linux"))]
fn first_up_mac() -> Option<String> {
    None
}
