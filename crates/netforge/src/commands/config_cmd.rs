//! Configuration inspection commands. These never need a topology
//! context; they run before one is built.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::confirm;
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let config = netforge_config::load_config_or_default();
            println!("{}", render(&config));
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", netforge_config::config_path().display());
            Ok(())
        }

        ConfigCommand::Init => {
            let path = netforge_config::config_path();
            if path.exists() {
                return Err(CliError::Conflict {
                    entity: "config file".into(),
                    id: path.display().to_string(),
                });
            }
            netforge_config::save_config(&netforge_config::Config::default())?;
            confirm(global, &format!("Wrote {}", path.display()));
            Ok(())
        }
    }
}

// JSON rendering keeps serde_json the only serializer this binary links
// for output.
fn render(config: &netforge_config::Config) -> String {
    serde_json::to_string_pretty(config).unwrap_or_default()
}
