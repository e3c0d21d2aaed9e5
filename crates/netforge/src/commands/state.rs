//! Whole-topology state commands.

use netforge_core::{Context, ops};

use crate::cli::{GlobalOpts, StateArgs, StateCommand};
use crate::commands::confirm;
use crate::error::CliError;
use crate::output;

pub fn handle(ctx: &Context, args: StateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        StateCommand::Show => {
            let doc = ctx.store().load().map_err(CliError::from)?;
            output::print_json(&doc)?;
            Ok(())
        }

        StateCommand::Delete => {
            ops::state_delete(ctx)?;
            confirm(global, "Topology state deleted");
            Ok(())
        }
    }
}
