//! DNS command handlers.

use netforge_core::{Context, ops};

use crate::cli::{DnsArgs, DnsCommand, GlobalOpts};
use crate::commands::confirm;
use crate::error::CliError;

pub fn handle(ctx: &Context, args: DnsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DnsCommand::Set { servers, node } => {
            ops::dns(
                ctx,
                &ops::DnsOptions {
                    node_id: node,
                    servers,
                    delete: false,
                },
            )?;
            confirm(global, "DNS nameservers set");
            Ok(())
        }

        DnsCommand::Clear { node } => {
            ops::dns(
                ctx,
                &ops::DnsOptions {
                    node_id: node,
                    servers: Vec::new(),
                    delete: true,
                },
            )?;
            confirm(global, "DNS nameservers cleared");
            Ok(())
        }
    }
}
