//! Line/field parsers for existence checks.
//!
//! The engine only ever scans command output for names -- these helpers are
//! the entire extent of output interpretation, kept out of the core crate.

/// Interface names from `ip link show` output.
///
/// Lines look like `2: eth0@if3: <BROADCAST,...> mtu ...`; the name is the
/// second field with the trailing colon and any `@peer` suffix removed.
pub fn interface_names(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else { continue };
        if !first.ends_with(':') || first.trim_end_matches(':').parse::<u32>().is_err() {
            continue;
        }
        let Some(second) = fields.next() else { continue };
        let name = second.trim_end_matches(':');
        let name = name.split('@').next().unwrap_or(name);
        if !name.is_empty() {
            names.push(name.to_owned());
        }
    }
    names
}

/// Bridge names from `brctl show` output (first field, header skipped).
pub fn bridge_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|first| *first != "bridge")
        .map(str::to_owned)
        .collect()
}

/// Namespace names from `ip netns list` output.
///
/// Modern iproute2 prints `name (id: 0)`; only the first token matters.
pub fn namespace_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_owned)
        .collect()
}

/// Addresses (without mask) from `ip addr show` output.
pub fn addresses(output: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 || !fields[0].starts_with("inet") {
            continue;
        }
        let addr = fields[1].split('/').next().unwrap_or(fields[1]);
        found.push(addr.to_owned());
    }
    found
}

/// Hardware address from `ip addr show` output (first `link/...` line).
pub fn hw_address(output: &str) -> Option<String> {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 2 && fields[0].starts_with("link/") {
            return Some(fields[1].to_owned());
        }
    }
    None
}

/// The interface carrying the default route, from `ip route` output.
pub fn default_route_interface(output: &str) -> Option<String> {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 5 && fields[0] == "default" {
            return Some(fields[4].to_owned());
        }
    }
    None
}

/// Whether any address in `ip addr show tentative` output is still in
/// duplicate-address detection.
pub fn has_tentative(output: &str) -> bool {
    output.contains("tentative")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const IP_LINK: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT
    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff
3: net000wifi0net@if4: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DEFAULT
";

    #[test]
    fn interface_names_strips_colon_and_peer() {
        assert_eq!(
            interface_names(IP_LINK),
            vec!["lo", "eth0", "net000wifi0net"]
        );
    }

    #[test]
    fn bridge_names_skips_header() {
        let out = "bridge name\tbridge id\t\tSTP enabled\tinterfaces\n\
                   net001\t\t8000.000000000000\tno\n";
        assert_eq!(bridge_names(out), vec!["net001"]);
    }

    #[test]
    fn namespace_names_drops_ids() {
        let out = "net000 (id: 0)\nnet001\n";
        assert_eq!(namespace_names(out), vec!["net000", "net001"]);
    }

    #[test]
    fn addresses_from_ip_addr_show() {
        let out = "\
2: wlan0: <BROADCAST> mtu 1500
    inet 10.0.1.2/24 scope global wlan0
    inet6 fd00:0000:0000:0001:0000:0000:0000:0002/64 scope global
";
        assert_eq!(
            addresses(out),
            vec!["10.0.1.2", "fd00:0000:0000:0001:0000:0000:0000:0002"]
        );
    }

    #[test]
    fn default_route_interface_found() {
        let out = "default via 192.168.1.1 dev enp3s0 proto dhcp metric 100\n\
                   192.168.1.0/24 dev enp3s0 proto kernel scope link\n";
        assert_eq!(default_route_interface(out).as_deref(), Some("enp3s0"));
    }

    #[test]
    fn default_route_interface_absent() {
        assert_eq!(default_route_interface("10.0.0.0/8 dev tun0\n"), None);
    }
}
