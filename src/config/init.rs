// ABOUTME: Settings scaffolding for new projects.
// ABOUTME: Writes a commented stackpilot.yml listing every setting with its default.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_TOOLKIT_STACK_NAME, Settings};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, generate_template_yaml())?;

    Ok(())
}

fn generate_template_yaml() -> String {
    let defaults = Settings::default();
    format!(
        r#"# Name of the bootstrap stack holding the asset bucket and version outputs.
toolkit_stack_name: {toolkit}

polling:
  stabilize_interval: {stabilize}
  monitor_interval: {monitor}
  change_set_interval: {change_set}

rollback:
  # Upper bound on rollback calls per invocation.
  max_iterations: {max_iterations}

assets:
  concurrency: {concurrency}

account_cache:
  # path: ~/.stackpilot/cache/accounts_partitions.json
  max_entries: {max_entries}

deployment:
  # direct or change-set
  method: change-set
  rollback: true
  use_previous_parameters: true
"#,
        toolkit = DEFAULT_TOOLKIT_STACK_NAME,
        stabilize = secs(defaults.polling.stabilize_interval),
        monitor = secs(defaults.polling.monitor_interval),
        change_set = secs(defaults.polling.change_set_interval),
        max_iterations = defaults.rollback.max_iterations,
        concurrency = defaults.assets.concurrency,
        max_entries = defaults.account_cache.max_entries,
    )
}

fn secs(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}
