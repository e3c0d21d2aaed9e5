//! Process command handlers.

use std::time::Duration;

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, ProcessArgs, ProcessCommand};
use crate::commands::confirm;
use crate::error::CliError;

pub fn handle(ctx: &Context, args: ProcessArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ProcessCommand::Start {
            node_id,
            tag,
            command,
        } => {
            let result = ops::process_start(
                ctx,
                &ops::ProcessStartOptions {
                    node_id: node_id.clone(),
                    tag: tag.clone(),
                    command: command.join(" "),
                    env: Vec::new(),
                },
            )?;
            let pid = result.data.unwrap_or_default();
            confirm(
                global,
                &format!("Process '{tag}' started on '{node_id}' (pid {pid})"),
            );
            Ok(())
        }

        ProcessCommand::Stop { node_id, tag } => {
            ops::process_stop(ctx, &node_id, &tag)?;
            confirm(global, &format!("Process '{tag}' stopped"));
            Ok(())
        }

        ProcessCommand::Wait {
            node_id,
            tag,
            timeout,
        } => {
            ops::process_wait(
                ctx,
                &ops::ProcessWaitOptions {
                    node_id,
                    tag: tag.clone(),
                    timeout: timeout.map(Duration::from_secs),
                },
            )?;
            confirm(global, &format!("Process '{tag}' completed"));
            Ok(())
        }
    }
}
