//! In-memory executor simulating the host's network objects.
//!
//! Interprets the same `ip`/`brctl`/`ifconfig` vocabulary the engine
//! issues, against a model of namespaces, interfaces, bridges, and
//! addresses. Post-checks that scan real command output behave identically
//! against this model, so orchestrators can be exercised end-to-end in
//! tests without privileges.
//!
//! Filesystem commands (`mkdir -p`, `touch`, `rm`) are applied literally so
//! tests can point nsroot-style paths at a temp directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use crate::{CommandOutput, DaemonHandle, ExecError, Executor};

const HOST: &str = "";

#[derive(Default)]
struct SimState {
    namespaces: BTreeSet<String>,
    /// scope ("" = host) -> interface name -> up?
    links: BTreeMap<String, BTreeMap<String, bool>>,
    /// scope -> bridge names (bridges are also interfaces in `links`)
    bridges: BTreeMap<String, BTreeSet<String>>,
    /// (scope, interface) -> addr/mask entries
    addresses: BTreeMap<(String, String), BTreeSet<String>>,
    /// scope -> route lines
    routes: BTreeMap<String, Vec<String>>,
    /// veth peer pairs, by interface name (names are host-unique)
    peers: BTreeMap<String, String>,
    log: Vec<String>,
    spawned: u32,
}

/// Deleting one end of a veth pair takes the peer with it, wherever the
/// peer currently lives.
fn remove_everywhere(state: &mut SimState, name: &str) {
    for links in state.links.values_mut() {
        links.remove(name);
    }
    let scopes: Vec<String> = state.addresses.keys().map(|(s, _)| s.clone()).collect();
    for scope in scopes {
        state.addresses.remove(&(scope, name.to_owned()));
    }
    for bridges in state.bridges.values_mut() {
        bridges.remove(name);
    }
}

/// Scriptable stand-in for the host OS.
pub struct SimulatedExecutor {
    state: Mutex<SimState>,
    /// Commands containing any of these substrings report failure.
    fail_on: Mutex<Vec<String>>,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        let mut state = SimState::default();
        let host_links = state.links.entry(HOST.into()).or_default();
        host_links.insert("lo".into(), true);
        host_links.insert("eth0".into(), true);
        Self {
            state: Mutex::new(state),
            fail_on: Mutex::new(Vec::new()),
        }
    }

    /// Force every command containing `pattern` to exit non-zero.
    pub fn fail_commands_containing(&self, pattern: &str) {
        self.fail_on.lock().expect("sim lock").push(pattern.into());
    }

    /// Every command line issued so far, in order.
    pub fn issued(&self) -> Vec<String> {
        self.state.lock().expect("sim lock").log.clone()
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.state
            .lock()
            .expect("sim lock")
            .namespaces
            .contains(name)
    }

    pub fn interface_exists(&self, scope: &str, name: &str) -> bool {
        self.state
            .lock()
            .expect("sim lock")
            .links
            .get(scope)
            .is_some_and(|links| links.contains_key(name))
    }

    fn eval(state: &mut SimState, scope: &str, tokens: &[&str]) -> CommandOutput {
        let mut tokens = strip_sudo(tokens);
        // Address-family selectors don't change what the model tracks.
        if tokens.first() == Some(&"ip")
            && matches!(tokens.get(1), Some(&"-4" | &"-6"))
        {
            tokens.remove(1);
        }
        match tokens.as_slice() {
            ["ip", "netns", "add", name] => {
                state.namespaces.insert((*name).to_owned());
                state
                    .links
                    .entry((*name).to_owned())
                    .or_default()
                    .insert("lo".into(), false);
                CommandOutput::ok("")
            }
            ["ip", "netns", "del" | "delete", name] => {
                if state.namespaces.remove(*name) {
                    state.links.remove(*name);
                    state.bridges.remove(*name);
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1)
                }
            }
            ["ip", "netns", "list"] => {
                let listing: String = state
                    .namespaces
                    .iter()
                    .map(|ns| format!("{ns} (id: 0)\n"))
                    .collect();
                CommandOutput::ok(listing)
            }
            ["ip", "netns", "exec", ns, rest @ ..] => Self::eval(state, ns, rest),

            ["brctl", "addbr", name] => {
                state
                    .bridges
                    .entry(scope.to_owned())
                    .or_default()
                    .insert((*name).to_owned());
                state
                    .links
                    .entry(scope.to_owned())
                    .or_default()
                    .insert((*name).to_owned(), false);
                CommandOutput::ok("")
            }
            ["brctl", "delbr", name] => {
                let present = state
                    .bridges
                    .get_mut(scope)
                    .is_some_and(|set| set.remove(*name));
                if present {
                    if let Some(links) = state.links.get_mut(scope) {
                        links.remove(*name);
                    }
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1)
                }
            }
            ["brctl", "show"] => {
                let mut out = String::from("bridge name\tbridge id\t\tSTP enabled\tinterfaces\n");
                if let Some(set) = state.bridges.get(scope) {
                    for bridge in set {
                        out.push_str(bridge);
                        out.push_str("\t\t8000.000000000000\tno\n");
                    }
                }
                CommandOutput::ok(out)
            }
            ["brctl", "addif" | "delif" | "setageing", ..] => CommandOutput::ok(""),

            ["ip", "tuntap", "add", name, "mode", "tap", ..] => {
                state
                    .links
                    .entry(scope.to_owned())
                    .or_default()
                    .insert((*name).to_owned(), false);
                CommandOutput::ok("")
            }
            ["ip", "link", "add", "name", a, "type", "veth", "peer", "name", b] => {
                let links = state.links.entry(scope.to_owned()).or_default();
                links.insert((*a).to_owned(), false);
                links.insert((*b).to_owned(), false);
                state.peers.insert((*a).to_owned(), (*b).to_owned());
                state.peers.insert((*b).to_owned(), (*a).to_owned());
                CommandOutput::ok("")
            }
            ["ip", "link", "add", name, "type", "bridge"] => {
                state
                    .links
                    .entry(scope.to_owned())
                    .or_default()
                    .insert((*name).to_owned(), false);
                state
                    .bridges
                    .entry(scope.to_owned())
                    .or_default()
                    .insert((*name).to_owned());
                CommandOutput::ok("")
            }
            ["ip", "link", "delete" | "del", name] => {
                let removed = state
                    .links
                    .get_mut(scope)
                    .is_some_and(|links| links.remove(*name).is_some());
                if removed {
                    state.addresses.remove(&(scope.to_owned(), (*name).to_owned()));
                    if let Some(peer) = state.peers.remove(*name) {
                        state.peers.remove(&peer);
                        remove_everywhere(state, &peer);
                    }
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed(1)
                }
            }
            ["ip", "link", "set", name, "netns", ns] => {
                let taken = state
                    .links
                    .get_mut(scope)
                    .and_then(|links| links.remove(*name));
                match taken {
                    Some(up) => {
                        state
                            .links
                            .entry((*ns).to_owned())
                            .or_default()
                            .insert((*name).to_owned(), up);
                        CommandOutput::ok("")
                    }
                    None => CommandOutput::failed(1),
                }
            }
            ["ip", "link", "set", old, "name", new, rest @ ..] => {
                let taken = state
                    .links
                    .get_mut(scope)
                    .and_then(|links| links.remove(*old));
                let _ = rest; // optional `address <mac>` tail
                match taken {
                    Some(up) => {
                        state
                            .links
                            .entry(scope.to_owned())
                            .or_default()
                            .insert((*new).to_owned(), up);
                        if let Some(peer) = state.peers.remove(*old) {
                            state.peers.insert((*new).to_owned(), peer.clone());
                            state.peers.insert(peer, (*new).to_owned());
                        }
                        CommandOutput::ok("")
                    }
                    None => CommandOutput::failed(1),
                }
            }
            ["ip", "link", "set", rest @ ..] | ["ifconfig", rest @ ..] => {
                Self::set_link_state(state, scope, rest)
            }
            ["ip", "link", "show"] => CommandOutput::ok(Self::render_links(state, scope, None)),
            ["ip", "link", "show", name] => {
                if state
                    .links
                    .get(scope)
                    .is_some_and(|links| links.contains_key(*name))
                {
                    CommandOutput::ok(Self::render_links(state, scope, Some(name)))
                } else {
                    CommandOutput {
                        status: 1,
                        stdout: String::new(),
                        stderr: format!("Device \"{name}\" does not exist.\n"),
                    }
                }
            }

            ["ip", "addr" | "address", "add", addr, "dev", iface] => {
                state
                    .addresses
                    .entry((scope.to_owned(), (*iface).to_owned()))
                    .or_default()
                    .insert((*addr).to_owned());
                CommandOutput::ok("")
            }
            ["ip", "addr" | "address", "del", addr, "dev", iface] => {
                state
                    .addresses
                    .get_mut(&(scope.to_owned(), (*iface).to_owned()))
                    .map_or(CommandOutput::failed(2), |set| {
                        set.remove(*addr);
                        CommandOutput::ok("")
                    })
            }
            ["ip", "addr", "show", "tentative"] => CommandOutput::ok(""),
            ["ip", "addr", "show"] => CommandOutput::ok(Self::render_addrs(state, scope, None)),
            ["ip", "addr", "show", iface] => {
                CommandOutput::ok(Self::render_addrs(state, scope, Some(iface)))
            }
            ["ip", "route"] => {
                let mut out = String::new();
                if scope == HOST {
                    out.push_str("default via 192.168.1.1 dev eth0 proto dhcp\n");
                }
                for line in state.routes.get(scope).into_iter().flatten() {
                    out.push_str(line);
                    out.push('\n');
                }
                CommandOutput::ok(out)
            }
            ["ip", "route", "add", rest @ ..] => {
                state
                    .routes
                    .entry(scope.to_owned())
                    .or_default()
                    .push(rest.join(" "));
                CommandOutput::ok("")
            }
            ["ip", "route", "delete" | "del", rest @ ..] => {
                let needle = rest.join(" ");
                if let Some(routes) = state.routes.get_mut(scope) {
                    routes.retain(|line| !line.starts_with(&needle));
                }
                CommandOutput::ok("")
            }

            ["sysctl", ..] => CommandOutput::ok("1\n"),
            ["iptables", ..] | ["nmcli", ..] | ["kill", ..] => CommandOutput::ok(""),

            ["mkdir", "-p", path] => {
                let _ = std::fs::create_dir_all(path);
                CommandOutput::ok("")
            }
            ["touch", path] => {
                let _ = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path);
                CommandOutput::ok("")
            }
            ["chmod", ..] => CommandOutput::ok(""),
            ["rm", "-r", path] => {
                let _ = std::fs::remove_dir_all(path);
                CommandOutput::ok("")
            }
            ["rm", path] => {
                let _ = std::fs::remove_file(path);
                CommandOutput::ok("")
            }

            _ => CommandOutput::ok(""),
        }
    }

    fn set_link_state(state: &mut SimState, scope: &str, rest: &[&str]) -> CommandOutput {
        // `ip link set [dev] X up|down` and `ifconfig X up|down`
        let rest: Vec<&str> = rest.iter().filter(|t| **t != "dev").copied().collect();
        if let [name, updown] = rest.as_slice() {
            let up = match *updown {
                "up" => true,
                "down" => false,
                _ => return CommandOutput::ok(""),
            };
            if let Some(entry) = state
                .links
                .get_mut(scope)
                .and_then(|links| links.get_mut(*name))
            {
                *entry = up;
                return CommandOutput::ok("");
            }
            return CommandOutput::failed(1);
        }
        // `ip link set X master B` and friends
        CommandOutput::ok("")
    }

    fn render_links(state: &SimState, scope: &str, only: Option<&str>) -> String {
        let mut out = String::new();
        let Some(links) = state.links.get(scope) else {
            return out;
        };
        for (index, (name, up)) in links.iter().enumerate() {
            if only.is_some_and(|wanted| wanted != name) {
                continue;
            }
            let flags = if *up {
                "<BROADCAST,MULTICAST,UP,LOWER_UP>"
            } else {
                "<BROADCAST,MULTICAST>"
            };
            let link_state = if *up { "UP" } else { "DOWN" };
            out.push_str(&format!(
                "{}: {name}: {flags} mtu 1500 qdisc noqueue state {link_state} mode DEFAULT\n",
                index + 1
            ));
            out.push_str("    link/ether 02:00:00:00:00:01 brd ff:ff:ff:ff:ff:ff\n");
        }
        out
    }

    fn render_addrs(state: &SimState, scope: &str, only: Option<&str>) -> String {
        let mut out = String::new();
        let Some(links) = state.links.get(scope) else {
            return out;
        };
        for (index, (name, _)) in links.iter().enumerate() {
            if only.is_some_and(|wanted| wanted != name) {
                continue;
            }
            out.push_str(&format!("{}: {name}: <BROADCAST> mtu 1500\n", index + 1));
            let key = (scope.to_owned(), name.clone());
            for addr in state.addresses.get(&key).into_iter().flatten() {
                let family = if addr.contains(':') { "inet6" } else { "inet" };
                out.push_str(&format!("    {family} {addr} scope global {name}\n"));
            }
        }
        out
    }
}

fn strip_sudo<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut tokens = tokens.to_vec();
    while tokens.first() == Some(&"sudo") {
        tokens.remove(0);
        if tokens.first() == Some(&"-u") && tokens.len() >= 2 {
            tokens.drain(0..2);
        }
    }
    tokens
}

impl Executor for SimulatedExecutor {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.run_with_env(cmd, &[])
    }

    fn run_with_env(
        &self,
        cmd: &str,
        _env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        let mut state = self.state.lock().expect("sim lock");
        state.log.push(cmd.to_owned());

        let forced_failure = self
            .fail_on
            .lock()
            .expect("sim lock")
            .iter()
            .any(|pattern| cmd.contains(pattern));
        if forced_failure {
            return Ok(CommandOutput::failed(1));
        }

        let tokens: Vec<&str> = cmd.split_whitespace().collect();
        Ok(Self::eval(&mut state, HOST, &tokens))
    }

    fn spawn_daemon(
        &self,
        cmd: &str,
        _env: &[(String, String)],
        _output: &Path,
    ) -> Result<DaemonHandle, ExecError> {
        let mut state = self.state.lock().expect("sim lock");
        state.log.push(format!("spawn {cmd}"));
        state.spawned += 1;
        // PIDs far above any real pid_max so liveness probes report dead.
        Ok(DaemonHandle {
            pid: 900_000_000 + i32::try_from(state.spawned).unwrap_or(0),
            create_time: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn namespace_lifecycle() {
        let sim = SimulatedExecutor::new();
        sim.run("sudo ip netns add net000").expect("run");
        assert!(sim.namespace_exists("net000"));

        let out = sim.run("ip netns list").expect("run");
        assert_eq!(parse::namespace_names(&out.stdout), vec!["net000"]);

        sim.run("sudo ip netns del net000").expect("run");
        assert!(!sim.namespace_exists("net000"));
    }

    #[test]
    fn veth_pair_and_move() {
        let sim = SimulatedExecutor::new();
        sim.run("ip link add name a0 type veth peer name b0")
            .expect("run");
        assert!(sim.interface_exists("", "a0"));
        assert!(sim.interface_exists("", "b0"));

        sim.run("ip netns add ns0").expect("run");
        sim.run("ip link set b0 netns ns0").expect("run");
        assert!(!sim.interface_exists("", "b0"));
        assert!(sim.interface_exists("ns0", "b0"));
    }

    #[test]
    fn bridge_listing_inside_namespace() {
        let sim = SimulatedExecutor::new();
        sim.run("ip netns add ns0").expect("run");
        sim.run("ip netns exec ns0 brctl addbr ns0").expect("run");
        let out = sim.run("ip netns exec ns0 brctl show").expect("run");
        assert_eq!(parse::bridge_names(&out.stdout), vec!["ns0"]);
    }

    #[test]
    fn link_state_renders_in_show() {
        let sim = SimulatedExecutor::new();
        sim.run("ip netns add ns0").expect("run");
        sim.run("ip netns exec ns0 brctl addbr br0").expect("run");
        sim.run("ip netns exec ns0 ifconfig br0 up").expect("run");
        let out = sim.run("ip netns exec ns0 ip link show br0").expect("run");
        let fields: Vec<&str> = out.stdout.split_whitespace().collect();
        assert_eq!(fields[8], "UP");
    }

    #[test]
    fn deleting_one_veth_end_removes_peer() {
        let sim = SimulatedExecutor::new();
        sim.run("ip link add name a0 type veth peer name b0")
            .expect("run");
        sim.run("ip netns add ns0").expect("run");
        sim.run("ip link set b0 netns ns0").expect("run");
        sim.run("ip netns exec ns0 ip link set b0 name wlan0")
            .expect("run");

        sim.run("ip link delete a0").expect("run");
        assert!(!sim.interface_exists("", "a0"));
        assert!(!sim.interface_exists("ns0", "wlan0"));
    }

    #[test]
    fn forced_failure() {
        let sim = SimulatedExecutor::new();
        sim.fail_commands_containing("netns add");
        let out = sim.run("sudo ip netns add net000").expect("run");
        assert!(!out.success());
        assert!(!sim.namespace_exists("net000"));
    }
}
