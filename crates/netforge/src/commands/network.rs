//! Network command handlers.

use tabled::Tabled;

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::commands::confirm;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Network")]
    id: String,
    #[tabled(rename = "Type")]
    network_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Prefixes")]
    prefixes: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
}

pub fn handle(ctx: &Context, args: NetworkArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        NetworkCommand::Add {
            network_id,
            network_type,
        } => {
            ops::network_add(ctx, &ops::NetworkAddOptions::new(&network_id, network_type))?;
            confirm(global, &format!("Network '{network_id}' created"));
            Ok(())
        }

        NetworkCommand::Delete { network_id } => {
            ops::network_delete(ctx, &network_id)?;
            confirm(global, &format!("Network '{network_id}' deleted"));
            Ok(())
        }

        NetworkCommand::List => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            let rows: Vec<NetworkRow> = doc
                .network_ids()
                .into_iter()
                .map(|id| {
                    let network = doc.network(&id);
                    NetworkRow {
                        network_type: network
                            .map(|n| n.network_type.to_string())
                            .unwrap_or_default(),
                        state: network.map(|n| n.state.to_string()).unwrap_or_default(),
                        prefixes: network
                            .map(|n| n.prefix.keys().cloned().collect::<Vec<_>>().join(", "))
                            .unwrap_or_default(),
                        nodes: doc.network_node_ids(&id).join(", "),
                        id,
                    }
                })
                .collect();
            output::print_table(rows, "no networks");
            Ok(())
        }

        NetworkCommand::Status { network_id } => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            match doc.network(&network_id) {
                Some(network) => Ok(output::print_json(network)?),
                None => Err(CliError::NotFound {
                    entity: "network".into(),
                    id: network_id,
                }),
            }
        }

        NetworkCommand::Up { network_id } => {
            ops::network_state(ctx, &network_id, true)?;
            confirm(global, &format!("Network '{network_id}' up"));
            Ok(())
        }

        NetworkCommand::Down { network_id } => {
            ops::network_state(ctx, &network_id, false)?;
            confirm(global, &format!("Network '{network_id}' down"));
            Ok(())
        }

        NetworkCommand::Address {
            network_id,
            address,
            delete,
        } => {
            ops::network_address(
                ctx,
                &ops::NetworkAddressOptions {
                    network_id,
                    address,
                    delete,
                },
            )?;
            confirm(global, if delete { "Prefix removed" } else { "Prefix assigned" });
            Ok(())
        }

        NetworkCommand::Route {
            network_id,
            to,
            via,
            prefix,
            delete,
        } => {
            ops::network_route(
                ctx,
                &ops::NetworkRouteOptions {
                    network_id,
                    to,
                    via,
                    prefix,
                    delete,
                },
            )?;
            confirm(global, if delete { "Route removed" } else { "Route set" });
            Ok(())
        }
    }
}
