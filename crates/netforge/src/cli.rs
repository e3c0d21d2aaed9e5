//! Clap derive structures for the `netforge` CLI.
//!
//! Defines the complete command tree, global flags, and the parsers that
//! turn type names into core enums.

use clap::{Args, Parser, Subcommand};

use netforge_core::{NetworkType, NodeType};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netforge -- virtual network topologies for protocol testing
#[derive(Debug, Parser)]
#[command(
    name = "netforge",
    version,
    about = "Build and tear down virtual network topologies on one Linux host",
    long_about = "Nodes are network namespaces, links are veth/tap pairs, and\n\
        networks are bridges. Commands are independent short-lived invocations\n\
        cooperating on one shared, persisted topology description.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Topology state id (prefixes every OS object)
    #[arg(long, short = 's', env = "NETFORGE_STATE_ID", global = true)]
    pub state_id: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage virtual nodes (network namespaces)
    Node(NodeArgs),
    /// Manage virtual networks (bridges)
    Network(NetworkArgs),
    /// Manage virtual links (veth/tap pairs)
    Link(LinkArgs),
    /// Connect nodes to the Internet through a simulated ISP
    Internet(InternetArgs),
    /// Manage DNS nameservers handed to nodes
    Dns(DnsArgs),
    /// Manage daemons running inside nodes
    Process(ProcessArgs),
    /// Inspect or delete the whole topology state
    State(StateArgs),
    /// Inspect or initialize the netforge configuration
    Config(ConfigArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init,
}

#[derive(Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// Create a node
    Add {
        node_id: String,
        /// Node role: ap, service, local, or none
        #[arg(long = "type", default_value = "none", value_parser = parse_node_type)]
        node_type: NodeType,
    },
    /// Delete a node and everything it owns
    Delete { node_id: String },
    /// List node ids
    List,
    /// Show one node's record
    Status { node_id: String },
    /// Join a node to a network
    Join {
        node_id: String,
        network_id: String,
        /// Configure the link as an L2 TAP device with a bridge
        #[arg(long, short = 'p')]
        tap: bool,
        /// Fixed MAC hardware address for the interface
        #[arg(long = "mac", short = 'm')]
        fix_hw_addr: Option<String>,
        /// Fixed EUI-64 for the interface
        #[arg(long = "eui64", short = 'c')]
        customized_eui64: Option<String>,
    },
    /// Remove a node from one network, or from all of them
    Leave {
        node_id: String,
        network_id: Option<String>,
    },
    /// Add or remove an IP address on a node interface
    Address {
        node_id: String,
        interface: String,
        /// Address, optionally with /mask
        address: String,
        #[arg(long, short = 'd')]
        delete: bool,
    },
    /// Add or remove a route inside a node
    Route {
        node_id: String,
        /// Destination address or 'default'
        #[arg(long, short = 't')]
        to: String,
        /// Gateway: address, node id, or interface name
        #[arg(long, short = 'g')]
        via: String,
        /// Disambiguating gateway prefix
        #[arg(long, short = 'p')]
        prefix: Option<String>,
        #[arg(long, short = 'd')]
        delete: bool,
    },
}

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Create a network
    Add {
        network_id: String,
        /// Medium: thread, wifi, wan, cellular, or out-of-band
        #[arg(long = "type", short = 't', value_parser = parse_network_type)]
        network_type: NetworkType,
    },
    /// Delete a network and its attached links
    Delete { network_id: String },
    /// List network ids
    List,
    /// Show one network's record
    Status { network_id: String },
    /// Bring the network's bridge up
    Up { network_id: String },
    /// Bring the network's bridge down
    Down { network_id: String },
    /// Assign or remove a prefix on the network
    Address {
        network_id: String,
        /// Prefix, optionally with /mask
        address: String,
        #[arg(long, short = 'd')]
        delete: bool,
    },
    /// Set or remove a route on the network and its members
    Route {
        network_id: String,
        /// Destination address or 'default'
        #[arg(long, short = 't', default_value = "default")]
        to: String,
        /// Gateway: address, node id, or interface name
        #[arg(long, short = 'g')]
        via: String,
        /// Disambiguating gateway prefix
        #[arg(long, short = 'p')]
        prefix: Option<String>,
        #[arg(long, short = 'd')]
        delete: bool,
    },
}

#[derive(Debug, Args)]
pub struct LinkArgs {
    #[command(subcommand)]
    pub command: LinkCommand,
}

#[derive(Debug, Subcommand)]
pub enum LinkCommand {
    /// Create an unattached link
    Add {
        /// Medium: thread, wifi, wan, cellular, or out-of-band
        #[arg(long = "type", short = 't', value_parser = parse_network_type)]
        link_type: NetworkType,
        /// Configure as an L2 TAP device with a bridge
        #[arg(long, short = 'p')]
        tap: bool,
    },
    /// Delete a link
    Delete { link_id: String },
    /// List link ids
    List,
}

#[derive(Debug, Args)]
pub struct InternetArgs {
    #[command(subcommand)]
    pub command: InternetCommand,
}

#[derive(Debug, Subcommand)]
pub enum InternetCommand {
    /// Connect a node to the Internet through the shared uplink
    Connect {
        node_id: String,
        /// ISP name (scopes the pool and the uplink bridge)
        #[arg(long, default_value = "isp")]
        isp: String,
        /// Host prefix seed: addresses come from 172.16.<seed>.0/24
        #[arg(long, short = 'e')]
        seed: u8,
        /// Host interface with real connectivity (default-route interface
        /// when omitted)
        #[arg(long, short = 'f')]
        iface: Option<String>,
    },
    /// Disconnect the node recorded for this ISP
    Disconnect {
        #[arg(long, default_value = "isp")]
        isp: String,
        #[arg(long, short = 'e')]
        seed: u8,
    },
}

#[derive(Debug, Args)]
pub struct DnsArgs {
    #[command(subcommand)]
    pub command: DnsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DnsCommand {
    /// Set nameservers on one node or the whole topology
    Set {
        /// Nameserver IPv4 addresses
        servers: Vec<String>,
        /// Target one node instead of all
        #[arg(long, short = 'i')]
        node: Option<String>,
    },
    /// Remove nameserver configuration
    Clear {
        #[arg(long, short = 'i')]
        node: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(subcommand)]
    pub command: ProcessCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProcessCommand {
    /// Start a daemon inside a node
    Start {
        node_id: String,
        /// Daemon name, unique per node
        tag: String,
        /// The command to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Stop a daemon (escalating signal sequence)
    Stop { node_id: String, tag: String },
    /// Block until a daemon exits
    Wait {
        node_id: String,
        tag: String,
        /// Give up (and terminate the daemon) after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Debug, Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    /// Print the state document
    Show,
    /// Tear down every node, network, and link, and remove the state file
    Delete,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_node_type(value: &str) -> Result<NodeType, String> {
    value
        .parse()
        .map_err(|_| format!("expected one of: ap, service, local, none (got '{value}')"))
}

fn parse_network_type(value: &str) -> Result<NetworkType, String> {
    value.parse().map_err(|_| {
        format!(
            "expected one of: thread, wifi, wan, cellular, internet, tun, out-of-band (got '{value}')"
        )
    })
}
