use std::net::Ipv4Addr;

/// Election priority of a node: the host bits of its address under the
/// netmask, read as an unsigned big-endian integer. Higher wins.
pub fn priority(address: Ipv4Addr, netmask: Ipv4Addr) -> u32 {
    u32::from(address) & !u32::from(netmask)
}

/// Directed broadcast address for the subnet the node lives on.
pub fn broadcast_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) | !u32::from(netmask))
}

/// Four dotted octets in 0..=255, nothing else.
pub fn is_valid_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}
