// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Offline subcommands: settings scaffolding, parameter resolution and import planning.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackpilot")]
#[command(about = "Deployment orchestration for stack-based infrastructure provisioning")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stackpilot.yml settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Resolve the parameters a deployment would send
    Params {
        /// Template to deploy (JSON or YAML)
        #[arg(short, long)]
        template: PathBuf,

        /// Parameter values of the deployed stack (JSON or YAML map)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Parameter override, repeatable
        #[arg(short = 'p', long = "parameter", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        parameters: Vec<(String, String)>,

        /// Do not reuse values of the deployed stack
        #[arg(long)]
        no_previous_parameters: bool,
    },

    /// Plan a resource import from two templates and an identifier mapping
    ImportPlan {
        /// Template currently deployed
        #[arg(long)]
        deployed: PathBuf,

        /// Template to be deployed
        #[arg(long)]
        desired: PathBuf,

        /// JSON file mapping logical ids to identifier properties
        #[arg(long)]
        mapping: PathBuf,

        /// Ignore updated or deleted resources
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_split_on_first_equals() {
        assert_eq!(
            parse_key_val("Url=a=b").unwrap(),
            ("Url".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_val("Empty=").unwrap().1, "");
        assert!(parse_key_val("=x").is_err());
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
