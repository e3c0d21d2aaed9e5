//! Node command handlers.

use tabled::Tabled;

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, NodeArgs, NodeCommand};
use crate::commands::confirm;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    id: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "Interfaces")]
    interfaces: usize,
    #[tabled(rename = "Networks")]
    networks: String,
}

pub fn handle(ctx: &Context, args: NodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        NodeCommand::Add { node_id, node_type } => {
            ops::node_add(ctx, &ops::NodeAddOptions::new(&node_id, node_type))?;
            confirm(global, &format!("Node '{node_id}' created"));
            Ok(())
        }

        NodeCommand::Delete { node_id } => {
            ops::node_delete(ctx, &node_id)?;
            confirm(global, &format!("Node '{node_id}' deleted"));
            Ok(())
        }

        NodeCommand::List => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            let rows: Vec<NodeRow> = doc
                .node_ids()
                .into_iter()
                .map(|id| NodeRow {
                    node_type: doc
                        .node(&id)
                        .map(|node| node.node_type.to_string())
                        .unwrap_or_default(),
                    interfaces: doc.node(&id).map_or(0, |node| node.interface.len()),
                    networks: doc.node_network_ids(&id).join(", "),
                    id,
                })
                .collect();
            output::print_table(rows, "no nodes");
            Ok(())
        }

        NodeCommand::Status { node_id } => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            match doc.node(&node_id) {
                Some(node) => Ok(output::print_json(node)?),
                None => Err(CliError::NotFound {
                    entity: "node".into(),
                    id: node_id,
                }),
            }
        }

        NodeCommand::Join {
            node_id,
            network_id,
            tap,
            fix_hw_addr,
            customized_eui64,
        } => {
            ops::node_join(
                ctx,
                &ops::NodeJoinOptions {
                    node_id: node_id.clone(),
                    network_id: network_id.clone(),
                    tap,
                    fix_hw_addr,
                    customized_eui64,
                },
            )?;
            confirm(global, &format!("Node '{node_id}' joined '{network_id}'"));
            Ok(())
        }

        NodeCommand::Leave {
            node_id,
            network_id,
        } => {
            ops::node_leave(ctx, &node_id, network_id.as_deref())?;
            confirm(global, &format!("Node '{node_id}' left"));
            Ok(())
        }

        NodeCommand::Address {
            node_id,
            interface,
            address,
            delete,
        } => {
            ops::node_address(
                ctx,
                &ops::NodeAddressOptions {
                    node_id,
                    interface,
                    address,
                    delete,
                },
            )?;
            confirm(global, if delete { "Address removed" } else { "Address added" });
            Ok(())
        }

        NodeCommand::Route {
            node_id,
            to,
            via,
            prefix,
            delete,
        } => {
            ops::node_route(
                ctx,
                &ops::NodeRouteOptions {
                    node_id,
                    to,
                    via,
                    prefix,
                    delete,
                    record: true,
                },
            )?;
            confirm(global, if delete { "Route removed" } else { "Route added" });
            Ok(())
        }
    }
}
