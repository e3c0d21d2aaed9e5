//! Internet / ISP command handlers.

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, InternetArgs, InternetCommand};
use crate::commands::confirm;
use crate::error::CliError;

pub fn handle(ctx: &Context, args: InternetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        InternetCommand::Connect {
            node_id,
            isp,
            seed,
            iface,
        } => {
            let result = ops::internet_connect(
                ctx,
                &ops::InternetOptions {
                    node_id: Some(node_id.clone()),
                    isp_id: isp,
                    seed,
                    iface,
                },
            )?;
            let addr = result.data.unwrap_or_default();
            confirm(
                global,
                &format!("Node '{node_id}' connected to the Internet as {addr}"),
            );
            Ok(())
        }

        InternetCommand::Disconnect { isp, seed } => {
            ops::internet_disconnect(
                ctx,
                &ops::InternetOptions {
                    node_id: None,
                    isp_id: isp.clone(),
                    seed,
                    iface: None,
                },
            )?;
            confirm(global, &format!("Disconnected from ISP '{isp}'"));
            Ok(())
        }
    }
}
