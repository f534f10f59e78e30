// ABOUTME: Params command: resolve a template's parameters the way a deployment would.
// ABOUTME: Prints the value, source and change flag of every parameter.

use serde_json::{Value, json};
use stackpilot::config::Settings;
use stackpilot::deploy::{ParameterSource, ResolvedParameters, TemplateParameters};
use stackpilot::diagnostics::{Diagnostics, Warning};
use stackpilot::error::{Error, Result};
use stackpilot::output::Output;
use stackpilot::stack::load_template;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::{Path, PathBuf};

pub struct ParamsRequest {
    pub template: PathBuf,
    pub previous: Option<PathBuf>,
    pub overrides: BTreeMap<String, String>,
    pub use_previous_parameters: bool,
}

pub async fn params(request: ParamsRequest, output: &Output) -> Result<()> {
    let settings = Settings::discover_or_default(&env::current_dir()?)?;
    let use_previous =
        request.use_previous_parameters && settings.deployment.use_previous_parameters;

    let template = load_template(&request.template)?;
    let declared = TemplateParameters::from_template(&template);
    declared.precheck(&request.overrides, &BTreeSet::new(), use_previous)?;

    let mut diag = Diagnostics::default();
    for name in request.overrides.keys() {
        if declared.get(name).is_none() {
            diag.warn(Warning::undeclared_parameter(name));
        }
    }

    let previous = match &request.previous {
        Some(path) => Some(load_values(path)?),
        None => None,
    };
    let resolved = match previous.as_ref() {
        Some(previous) if use_previous => declared.update_existing(&request.overrides, previous)?,
        _ => declared.supply_all(&request.overrides)?,
    };

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    let summary = summarize(
        &declared,
        &resolved,
        previous.as_ref().unwrap_or(&BTreeMap::new()),
    );
    output.data(
        &format!("{} parameter(s) resolved", resolved.iter().count()),
        &summary,
    );
    Ok(())
}

/// A flat name -> value map from a JSON or YAML document.
fn load_values(path: &Path) -> Result<BTreeMap<String, String>> {
    let document = load_template(path)?;
    let Value::Object(entries) = document else {
        return Err(Error::InvalidArgument(format!(
            "{}: expected a map of parameter values",
            path.display()
        )));
    };
    Ok(entries
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name, s)),
            Value::Number(n) => Some((name, n.to_string())),
            Value::Bool(b) => Some((name, b.to_string())),
            _ => None,
        })
        .collect())
}

fn summarize(
    declared: &TemplateParameters,
    resolved: &ResolvedParameters,
    previous: &BTreeMap<String, String>,
) -> Value {
    let values = resolved.values(previous);
    let parameters: serde_json::Map<String, Value> = resolved
        .iter()
        .map(|(name, parameter)| {
            let source = match parameter.source {
                ParameterSource::Override => "override",
                ParameterSource::Previous => "previous",
                ParameterSource::Default => "default",
                ParameterSource::Undeclared => "undeclared",
            };
            // Defaults are applied by the service; show what it will use.
            let value = values.get(name).cloned().or_else(|| {
                declared
                    .get(name)
                    .and_then(|decl| decl.default.clone())
            });
            let entry = json!({
                "source": source,
                "value": value,
                "changed": parameter.changed,
            });
            (name.to_string(), entry)
        })
        .collect();
    json!({
        "parameters": parameters,
        "changes": format!("{:?}", resolved.changes()).to_lowercase(),
    })
}
