//! Link command handlers.

use tabled::Tabled;

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, LinkArgs, LinkCommand};
use crate::commands::confirm;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Link")]
    id: String,
    #[tabled(rename = "Type")]
    link_type: String,
    #[tabled(rename = "Tap")]
    tap: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Network")]
    network: String,
}

pub fn handle(ctx: &Context, args: LinkArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        LinkCommand::Add { link_type, tap } => {
            let result = ops::link_add(ctx, &ops::LinkAddOptions { link_type, tap })?;
            let link_id = result.data.unwrap_or_default();
            confirm(global, &format!("Link '{link_id}' created"));
            // The allocated id on stdout is what a driving harness reads.
            println!("{link_id}");
            Ok(())
        }

        LinkCommand::Delete { link_id } => {
            ops::link_delete(ctx, &link_id)?;
            confirm(global, &format!("Link '{link_id}' deleted"));
            Ok(())
        }

        LinkCommand::List => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            let rows: Vec<LinkRow> = doc
                .link_ids()
                .into_iter()
                .filter_map(|id| doc.link(&id).map(|link| (id, link)))
                .map(|(id, link)| LinkRow {
                    id,
                    link_type: link.link_type.to_string(),
                    tap: if link.tap { "yes" } else { "no" }.into(),
                    node: link.node.clone().unwrap_or_default(),
                    network: link.network.clone().unwrap_or_default(),
                })
                .collect();
            output::print_table(rows, "no links");
            Ok(())
        }
    }
}
