// ── Typed accessors over the state document ──
//
// The relationship queries mirror how the document cross-references by id:
// nodes reach links through their interfaces, networks hold attached link
// ids, and links point weakly back at both. All listings come out sorted so
// command output is reproducible run to run.

use crate::addr;
use crate::model::{
    Interface, Link, Network, Node, RouteRecord, StateDocument,
};

impl StateDocument {
    // ── Id listings (sorted) ─────────────────────────────────────────

    pub fn node_ids(&self) -> Vec<String> {
        self.node.keys().cloned().collect()
    }

    pub fn network_ids(&self) -> Vec<String> {
        self.network.keys().cloned().collect()
    }

    pub fn link_ids(&self) -> Vec<String> {
        self.link.keys().cloned().collect()
    }

    // ── Entity getters ───────────────────────────────────────────────

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.node.get(node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.node.get_mut(node_id)
    }

    pub fn network(&self, network_id: &str) -> Option<&Network> {
        self.network.get(network_id)
    }

    pub fn network_mut(&mut self, network_id: &str) -> Option<&mut Network> {
        self.network.get_mut(network_id)
    }

    pub fn link(&self, link_id: &str) -> Option<&Link> {
        self.link.get(link_id)
    }

    pub fn is_local_node(&self, node_id: &str) -> bool {
        self.node(node_id)
            .is_some_and(|node| node.node_type.is_local())
    }

    // ── Relationship traversals ──────────────────────────────────────

    /// Link ids attached to this node's interfaces, sorted.
    pub fn node_link_ids(&self, node_id: &str) -> Vec<String> {
        self.node(node_id).map(Node::link_ids).unwrap_or_default()
    }

    /// Link ids attached to this network's bridge, sorted.
    pub fn network_link_ids(&self, network_id: &str) -> Vec<String> {
        self.network(network_id)
            .map(Network::link_ids)
            .unwrap_or_default()
    }

    /// Networks this node is joined to, through its links, sorted.
    pub fn node_network_ids(&self, node_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .node_link_ids(node_id)
            .iter()
            .filter_map(|link_id| self.link(link_id))
            .filter_map(|link| link.network.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Nodes joined to this network, through its links, sorted.
    pub fn network_node_ids(&self, network_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .network_link_ids(network_id)
            .iter()
            .filter_map(|link_id| self.link(link_id))
            .filter_map(|link| link.node.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The node-side interface name carrying `link_id`, if any.
    pub fn node_interface_for_link(&self, node_id: &str, link_id: &str) -> Option<String> {
        self.node(node_id)?
            .interface
            .iter()
            .find(|(_, iface)| iface.link.as_deref() == Some(link_id))
            .map(|(name, _)| name.clone())
    }

    /// Interface names this node has on `network_id`.
    pub fn node_interfaces_on_network(&self, node_id: &str, network_id: &str) -> Vec<String> {
        let network_links = self.network_link_ids(network_id);
        let Some(node) = self.node(node_id) else {
            return Vec::new();
        };
        node.interface
            .iter()
            .filter(|(_, iface)| {
                iface
                    .link
                    .as_ref()
                    .is_some_and(|link| network_links.contains(link))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Links shared by a node and a network (the ones Leave removes).
    pub fn shared_link_ids(&self, node_id: &str, network_id: &str) -> Vec<String> {
        let network_links = self.network_link_ids(network_id);
        self.node_link_ids(node_id)
            .into_iter()
            .filter(|link_id| network_links.contains(link_id))
            .collect()
    }

    // ── Addresses ────────────────────────────────────────────────────

    pub fn node_interface_addresses(&self, node_id: &str, interface_id: &str) -> Vec<String> {
        self.node(node_id)
            .and_then(|node| node.interface.get(interface_id))
            .map(|iface| iface.ip.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn node_addresses(&self, node_id: &str) -> Vec<String> {
        self.node(node_id)
            .map(|node| {
                node.interface
                    .values()
                    .flat_map(|iface| iface.ip.keys().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Addresses the node holds on interfaces attached to `network_id`,
    /// longest first.
    pub fn node_addresses_on_network(&self, node_id: &str, network_id: &str) -> Vec<String> {
        let mut addrs: Vec<String> = self
            .node_interfaces_on_network(node_id, network_id)
            .iter()
            .flat_map(|iface| self.node_interface_addresses(node_id, iface))
            .collect();
        addrs.sort_by_key(|a| std::cmp::Reverse(a.len()));
        addrs
    }

    pub fn node_addresses_on_prefix(&self, node_id: &str, prefix: &str) -> Vec<String> {
        self.node_addresses(node_id)
            .into_iter()
            .filter(|address| addr::prefix_match(Some(prefix), address))
            .collect()
    }

    pub fn node_addresses_on_network_on_prefix(
        &self,
        node_id: &str,
        network_id: &str,
        prefix: &str,
    ) -> Vec<String> {
        self.node_addresses_on_network(node_id, network_id)
            .into_iter()
            .filter(|address| addr::prefix_match(Some(prefix), address))
            .collect()
    }

    /// Prefixes covered by the addresses on one node interface.
    pub fn node_interface_prefixes(&self, node_id: &str, interface_id: &str) -> Vec<String> {
        let Some(iface) = self
            .node(node_id)
            .and_then(|node| node.interface.get(interface_id))
        else {
            return Vec::new();
        };
        iface
            .ip
            .iter()
            .map(|(address, record)| addr::get_prefix(address, record.mask))
            .collect()
    }

    /// Next free IPv4 host id on `prefix` within a network. Starts at 2
    /// (gateways take .1) and grows past the highest id in use.
    pub fn next_ipv4_host_id(&self, network_id: &str, prefix: &str) -> u32 {
        let network_links = self.network_link_ids(network_id);
        let mut host_ids: Vec<u32> = Vec::new();

        for node_id in self.node_ids() {
            for link_id in self.node_link_ids(&node_id) {
                if !network_links.contains(&link_id) {
                    continue;
                }
                let Some(iface) = self.node_interface_for_link(&node_id, &link_id) else {
                    continue;
                };
                for address in self.node_interface_addresses(&node_id, &iface) {
                    if addr::is_ipv6(&address) || !addr::prefix_match(Some(prefix), &address) {
                        continue;
                    }
                    if let Some(last) = address.split('.').next_back() {
                        if let Ok(id) = last.parse() {
                            host_ids.push(id);
                        }
                    }
                }
            }
        }

        host_ids.iter().max().map_or(2, |max| max + 1)
    }

    /// Whether any of the node's links is a tap link. Tap nodes carry an
    /// LwIP-style stack on the other side of the bridge, so addresses and
    /// routes are not configured through the kernel.
    pub fn is_tap_node(&self, node_id: &str) -> bool {
        self.node_link_ids(node_id)
            .iter()
            .any(|link_id| self.link(link_id).is_some_and(|link| link.tap))
    }

    // ── Mutators (in-memory only; `save` persists) ───────────────────

    pub fn set_node_interface(&mut self, node_id: &str, name: &str, iface: Interface) {
        if let Some(node) = self.node_mut(node_id) {
            node.interface.insert(name.to_owned(), iface);
        }
    }

    pub fn remove_node_interface(&mut self, node_id: &str, name: &str) {
        if let Some(node) = self.node_mut(node_id) {
            node.interface.remove(name);
        }
    }

    pub fn set_node_ip_address(&mut self, node_id: &str, interface_id: &str, address: &str, mask: u8) {
        if let Some(iface) = self
            .node_mut(node_id)
            .and_then(|node| node.interface.get_mut(interface_id))
        {
            iface
                .ip
                .insert(address.to_owned(), crate::model::AddressRecord { mask });
        }
    }

    pub fn remove_node_ip_address(&mut self, node_id: &str, interface_id: &str, address: &str) {
        if let Some(iface) = self
            .node_mut(node_id)
            .and_then(|node| node.interface.get_mut(interface_id))
        {
            iface.ip.remove(address);
        }
    }

    /// Record a route on a node, keyed by destination with a `_v4`/`_v6`
    /// suffix derived from the gateway family.
    pub fn set_node_route(&mut self, node_id: &str, to: &str, record: RouteRecord) {
        let key = route_key(to, &record);
        if let Some(node) = self.node_mut(node_id) {
            node.route.insert(key, record);
        }
    }

    pub fn remove_node_route(&mut self, node_id: &str, to: &str) {
        if let Some(node) = self.node_mut(node_id) {
            node.route.retain(|key, _| key != to && key.trim_end_matches("_v4").trim_end_matches("_v6") != to);
        }
    }

    pub fn set_network_route(&mut self, network_id: &str, to: &str, record: RouteRecord) {
        let key = route_key(to, &record);
        if let Some(network) = self.network_mut(network_id) {
            network.route.insert(key, record);
        }
    }

    pub fn remove_network_route(&mut self, network_id: &str, to: &str) {
        if let Some(network) = self.network_mut(network_id) {
            network
                .route
                .retain(|key, _| key != to && key.trim_end_matches("_v4").trim_end_matches("_v6") != to);
        }
    }

    pub fn set_network_prefix(&mut self, network_id: &str, prefix: &str, mask: u8) {
        if let Some(network) = self.network_mut(network_id) {
            network
                .prefix
                .insert(prefix.to_owned(), crate::model::PrefixRecord { mask });
        }
    }

    pub fn remove_network_prefix(&mut self, network_id: &str, prefix: &str) {
        if let Some(network) = self.network_mut(network_id) {
            network.prefix.remove(prefix);
        }
    }

    /// Clear every reference to `link_id` from nodes and networks, then
    /// drop the link record itself. Dangling-reference cleanup is the
    /// delete orchestrator's responsibility, not an automatic cascade.
    pub fn purge_link(&mut self, link_id: &str) {
        for node in self.node.values_mut() {
            node.interface
                .retain(|_, iface| iface.link.as_deref() != Some(link_id));
        }
        for network in self.network.values_mut() {
            network.interface.remove(link_id);
        }
        self.link.remove(link_id);
    }
}

fn route_key(to: &str, record: &RouteRecord) -> String {
    let is_v6 = record.via.as_deref().is_some_and(addr::is_ipv6)
        || record.prefix.as_deref().is_some_and(addr::is_ipv6);
    if is_v6 {
        format!("{to}_v6")
    } else {
        format!("{to}_v4")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::model::{
        Interface, Link, MemberRecord, Network, NetworkType, Node, NodeType, StateDocument,
    };

    fn joined_doc() -> StateDocument {
        let mut doc = StateDocument::default();
        doc.node.insert("n1".into(), Node::new(NodeType::Plain));
        doc.network
            .insert("net1".into(), Network::new(NetworkType::Wifi));

        doc.link.insert(
            "wifi0".into(),
            Link {
                link_type: NetworkType::Wifi,
                number: 0,
                node: Some("n1".into()),
                network: Some("net1".into()),
                node_end: "net000wifi0node".into(),
                network_end: "net000wifi0net".into(),
                tap: false,
                fix_hw_addr: None,
            },
        );
        doc.network
            .get_mut("net1")
            .expect("net1")
            .interface
            .insert("wifi0".into(), MemberRecord::default());
        doc.set_node_interface(
            "n1",
            "wlan0",
            Interface {
                link: Some("wifi0".into()),
                link_type: NetworkType::Wifi,
                ip: std::collections::BTreeMap::new(),
                customized_eui64: None,
            },
        );
        doc
    }

    #[test]
    fn traversals_cross_reference_by_id() {
        let doc = joined_doc();
        assert_eq!(doc.node_network_ids("n1"), vec!["net1"]);
        assert_eq!(doc.network_node_ids("net1"), vec!["n1"]);
        assert_eq!(doc.shared_link_ids("n1", "net1"), vec!["wifi0"]);
        assert_eq!(
            doc.node_interface_for_link("n1", "wifi0").as_deref(),
            Some("wlan0")
        );
    }

    #[test]
    fn purge_link_clears_both_sides() {
        let mut doc = joined_doc();
        doc.purge_link("wifi0");
        assert!(doc.link.is_empty());
        assert!(doc.node_link_ids("n1").is_empty());
        assert!(doc.network_link_ids("net1").is_empty());
    }

    #[test]
    fn ipv4_host_ids_start_at_two_and_extend() {
        let mut doc = joined_doc();
        assert_eq!(doc.next_ipv4_host_id("net1", "10.0.1"), 2);
        doc.set_node_ip_address("n1", "wlan0", "10.0.1.7", 24);
        assert_eq!(doc.next_ipv4_host_id("net1", "10.0.1"), 8);
    }
}
