//! Command handlers: thin translation from clap args to orchestrator
//! option structs. All topology logic lives in netforge-core.

pub mod config_cmd;

mod dns;
mod internet;
mod link;
mod network;
mod node;
mod process;
mod state;

use netforge_core::Context;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub fn dispatch(command: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        Command::Node(args) => node::handle(ctx, args, global),
        Command::Network(args) => network::handle(ctx, args, global),
        Command::Link(args) => link::handle(ctx, args, global),
        Command::Internet(args) => internet::handle(ctx, args, global),
        Command::Dns(args) => dns::handle(ctx, args, global),
        Command::Process(args) => process::handle(ctx, args, global),
        Command::State(args) => state::handle(ctx, args, global),
        // Handled before a context is built; nothing to do here.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Print a short confirmation unless `--quiet` was given.
pub(crate) fn confirm(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}
