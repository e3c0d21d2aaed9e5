// ── Address text handling ──
//
// Addresses live in the state document and in generated commands as text,
// in fully zero-padded form for IPv6 so that string comparison is address
// comparison. These helpers do all of the formatting; nothing else in the
// engine slices address strings.

/// Whether the string is an IPv6 address (or prefix).
pub fn is_ipv6(addr: &str) -> bool {
    addr.contains(':')
}

/// Whether the string is an IPv4 address (or prefix).
pub fn is_ipv4(addr: &str) -> bool {
    addr.contains('.') && !addr.chars().any(|c| c.is_alphabetic())
}

pub fn is_ip_address(addr: &str) -> bool {
    is_ipv4(addr) || is_ipv6(addr)
}

/// Names with dots are reserved for DNS; node and network ids must not
/// look like them.
pub fn is_domain_name(name: &str) -> bool {
    name.contains('.') && !is_ipv4(name)
}

/// Split `addr/mask`, defaulting the mask to 64 (IPv6) or 24 (IPv4).
/// IPv6 addresses come back fully padded.
pub fn split_address_mask(ipmask: &str) -> (String, u8) {
    let (addr, mask) = match ipmask.split_once('/') {
        Some((addr, mask)) => (addr.to_owned(), mask.parse().unwrap_or(0)),
        None => {
            let default_mask = if is_ipv6(ipmask) { 64 } else { 24 };
            (ipmask.to_owned(), default_mask)
        }
    };
    let addr = if is_ipv6(&addr) { padding_zeros(&addr) } else { addr };
    (addr, mask)
}

/// Expand `::` and zero-pad every group to 4 digits. A `/mask` suffix is
/// preserved. Non-IPv6 input passes through untouched.
pub fn padding_zeros(addr_mask: &str) -> String {
    if !is_ipv6(addr_mask) {
        return addr_mask.to_owned();
    }

    let (addr, mask) = match addr_mask.split_once('/') {
        Some((addr, mask)) => (addr.to_owned(), Some(mask)),
        None => (addr_mask.to_owned(), None),
    };

    let expanded = if let Some((head, tail)) = addr.split_once("::") {
        let missing = 8_usize.saturating_sub(addr.matches(':').count());
        let zeros = vec!["0000"; missing].join(":");
        if tail.is_empty() {
            format!("{head}:{zeros}:0000")
        } else {
            format!("{head}:{zeros}:{tail}")
        }
    } else {
        addr
    };

    let padded: Vec<String> = expanded
        .split(':')
        .map(|group| format!("{group:0>4}"))
        .collect();
    let mut result = padded.join(":");

    if let Some(mask) = mask {
        result.push('/');
        result.push_str(mask);
    }
    result
}

/// Strip trailing all-zero groups (the inverse presentation of a prefix).
pub fn drop_zeros(addr: &str) -> String {
    let mut groups: Vec<&str> = addr.split(':').collect();
    while groups.last() == Some(&"0000") {
        groups.pop();
    }
    groups.join(":")
}

/// Textual prefix match: does `addr` start with `prefix` (mask ignored)?
pub fn prefix_match(prefix: Option<&str>, addr: &str) -> bool {
    let Some(prefix) = prefix else { return false };
    let (prefix_addr, _mask) = split_address_mask(prefix);
    let prefix_addr = drop_zeros(&prefix_addr);
    if prefix_addr.len() > addr.len() {
        return false;
    }
    addr[..prefix_addr.len()] == prefix_addr
}

/// The prefix part of an address under `mask` (16-bit groups for IPv6,
/// octets for IPv4).
pub fn get_prefix(addr: &str, mask: u8) -> String {
    if let Some((head, _)) = addr.split_once("::") {
        return head.to_owned();
    }
    if is_ipv6(addr) {
        let groups: Vec<&str> = addr.split(':').take(usize::from(mask) / 16).collect();
        return groups.join(":");
    }
    let octets: Vec<&str> = addr.split('.').take(usize::from(mask) / 8).collect();
    octets.join(".")
}

/// MAC-48 -> EUI-64 by inserting ff:fe in the middle, dash-separated.
pub fn mac48_to_eui64(mac: &str) -> Option<String> {
    let mut parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    parts.insert(3, "fe");
    parts.insert(3, "ff");
    Some(parts.join("-"))
}

/// EUI-64 (dash-separated) -> IPv6 interface identifier (colon-separated,
/// universal/local bit flipped).
pub fn eui64_to_iid(eui: &str) -> Option<String> {
    let mut value: u64 = 0;
    let mut octets = 0;
    for part in eui.split('-') {
        value = (value << 8) | u64::from(u8::from_str_radix(part, 16).ok()?);
        octets += 1;
    }
    if octets != 8 {
        return None;
    }
    if value >= 65536 {
        value |= 1 << 57;
    }

    let hex = format!("{value:016x}");
    let groups: Vec<&str> = vec![&hex[0..4], &hex[4..8], &hex[8..12], &hex[12..16]];
    Some(groups.join(":"))
}

/// Pad a user-supplied MAC to full 6-octet colon form ("5" -> "00:...:05").
pub fn fix_hw_addr(addr: &str) -> String {
    let mut parts: Vec<String> = addr
        .split(':')
        .map(|part| format!("{part:0>2}"))
        .collect();
    while parts.len() < 6 {
        parts.insert(0, "00".into());
    }
    parts.join(":")
}

/// An IPv6 address on `prefix_addr` with interface identifier `iid`.
pub fn ipv6_address_on_prefix(prefix_addr: &str, iid: &str) -> String {
    let mut addr = format!("{prefix_addr}::{iid}");
    if addr.matches(':').count() == 8 {
        addr = addr.replace("::", ":");
    }
    padding_zeros(&addr)
}

/// An IPv4 address on `prefix_addr`/`mask` with host id `host`.
pub fn ipv4_address_on_prefix(prefix_addr: &str, mask: u8, host: u32) -> String {
    let mut octets: Vec<String> = prefix_addr
        .split('.')
        .take(usize::from(mask) / 8)
        .map(str::to_owned)
        .collect();
    octets.push((host % 255).to_string());
    octets.join(".")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn padding_expands_double_colon() {
        assert_eq!(
            padding_zeros("fd00::1"),
            "fd00:0000:0000:0000:0000:0000:0000:0001"
        );
        assert_eq!(
            padding_zeros("fd00:1:2:3::"),
            "fd00:0001:0002:0003:0000:0000:0000:0000"
        );
        assert_eq!(padding_zeros("10.0.1.2"), "10.0.1.2");
    }

    #[test]
    fn padding_keeps_mask() {
        assert_eq!(
            padding_zeros("fd00::/64"),
            "fd00:0000:0000:0000:0000:0000:0000:0000/64"
        );
    }

    #[test]
    fn split_defaults_masks_by_family() {
        assert_eq!(split_address_mask("10.0.1.0").1, 24);
        assert_eq!(split_address_mask("fd00::").1, 64);
        assert_eq!(split_address_mask("10.0.1.0/16").1, 16);
    }

    #[test]
    fn prefix_matching_is_textual() {
        assert!(prefix_match(
            Some("fd00:0000:0000:0001::/64"),
            "fd00:0000:0000:0001:0000:0000:0000:0002"
        ));
        assert!(!prefix_match(Some("fd01::/64"), "fd00:0000:0000:0000:0000:0000:0000:0002"));
        assert!(prefix_match(Some("10.0.1"), "10.0.1.5"));
        assert!(!prefix_match(None, "10.0.1.5"));
    }

    #[test]
    fn eui64_round_trip_from_mac() {
        let eui = mac48_to_eui64("02:01:02:03:04:05").expect("valid mac");
        assert_eq!(eui, "02-01-02-ff-fe-03-04-05");
        let iid = eui64_to_iid(&eui).expect("valid eui");
        assert_eq!(iid, "0201:02ff:fe03:0405");
    }

    #[test]
    fn hw_addr_padding() {
        assert_eq!(fix_hw_addr("5"), "00:00:00:00:00:05");
        assert_eq!(fix_hw_addr("a:b:c:d:e:f"), "0a:0b:0c:0d:0e:0f");
    }

    #[test]
    fn addresses_on_prefixes() {
        assert_eq!(ipv4_address_on_prefix("10.0.1", 24, 2), "10.0.1.2");
        assert_eq!(
            ipv6_address_on_prefix("fd00:0:1:1", "0201:02ff:fe03:0405"),
            "fd00:0000:0001:0001:0201:02ff:fe03:0405"
        );
    }
}
