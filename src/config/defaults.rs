// ABOUTME: Deployment defaults applied when a command does not say otherwise.
// ABOUTME: Method, rollback behaviour and previous-parameter reuse.

use serde::Deserialize;

/// How a deployment submits its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodSetting {
    Direct,
    #[default]
    ChangeSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentDefaults {
    #[serde(default)]
    pub method: MethodSetting,

    /// Let the service roll back a failed deployment.
    #[serde(default = "default_true")]
    pub rollback: bool,

    /// Reuse previous values for parameters without an override.
    #[serde(default = "default_true")]
    pub use_previous_parameters: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DeploymentDefaults {
    fn default() -> Self {
        Self {
            method: MethodSetting::default(),
            rollback: true,
            use_previous_parameters: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_kebab_case() {
        let defaults: DeploymentDefaults =
            serde_yaml::from_str("method: direct\nrollback: false\n").unwrap();
        assert_eq!(defaults.method, MethodSetting::Direct);
        assert!(!defaults.rollback);
        assert!(defaults.use_previous_parameters);
    }
}
