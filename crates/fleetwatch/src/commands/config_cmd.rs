//! Config subcommand handlers.

use std::fmt::Write;

use fleetwatch_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Effective config as TOML, with the resolved paths appended as comments.
fn format_config(cfg: &Config) -> Result<String, CliError> {
    let mut out = toml::to_string_pretty(cfg)?;
    let _ = writeln!(out);
    let _ = writeln!(out, "# data dir:       {}", cfg.data_dir().display());
    let _ = writeln!(out, "# inventory file: {}", cfg.inventory_path().display());
    Ok(out)
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = fleetwatch_config::load_config()?;
            let out = match global.output {
                OutputFormat::Table => format_config(&cfg)?,
                _ => output::render_single(
                    &global.output,
                    &cfg,
                    |_| String::new(),
                    |c| c.inventory_path().display().to_string(),
                ),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = fleetwatch_config::config_path();
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}
