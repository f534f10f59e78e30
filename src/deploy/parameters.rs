// ABOUTME: Template parameter resolution against overrides, previous values and defaults.
// ABOUTME: Tracks per-parameter change flags used by the skip-deploy check.

use std::collections::{BTreeMap, BTreeSet};

use nonempty::NonEmpty;
use serde_json::Value;

use crate::provider::ApiParameter;

/// Marker in a parameter description that stops store-backed values from
/// forcing a redeploy when unchanged.
pub const SKIP_INVALIDATE_MARKER: &str = "[skip-invalidate]";

/// Prefix of parameter types whose value lives in the remote parameter store.
const STORE_PARAMETER_TYPE_PREFIX: &str = "AWS::SSM::Parameter::";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("The following parameters are missing a value: {}", join(.0))]
    Missing(NonEmpty<String>),
}

fn join(names: &NonEmpty<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// A parameter declared in a template's `Parameters` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameter {
    pub parameter_type: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

impl TemplateParameter {
    /// Whether the value is read from the remote parameter store at deploy time.
    pub fn is_store_backed(&self) -> bool {
        self.parameter_type.starts_with(STORE_PARAMETER_TYPE_PREFIX)
    }

    fn skips_invalidation(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| d.contains(SKIP_INVALIDATE_MARKER))
    }

    /// Store-backed without the skip-invalidate marker.
    fn always_invalidates(&self) -> bool {
        self.is_store_backed() && !self.skips_invalidation()
    }
}

/// Where a resolved parameter got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSource {
    Override,
    Previous,
    Default,
    Undeclared,
}

/// A resolved parameter and whether it counts as changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    /// Value sent to the service; `None` when the service keeps the previous
    /// value or applies the template default.
    pub value: Option<String>,
    pub source: ParameterSource,
    pub changed: bool,
}

/// Whether a parameter set requires redeployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterChanges {
    Unchanged,
    Changed,
    /// Some values come from the parameter store and may have changed remotely.
    Store,
}

impl ParameterChanges {
    pub fn is_changed(self) -> bool {
        self != ParameterChanges::Unchanged
    }
}

/// Declared template parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParameters {
    declared: BTreeMap<String, TemplateParameter>,
}

impl TemplateParameters {
    /// Read the `Parameters` section of a template. Missing or malformed
    /// sections yield no parameters.
    pub fn from_template(template: &Value) -> Self {
        let declared = template
            .get("Parameters")
            .and_then(Value::as_object)
            .map(|params| {
                params
                    .iter()
                    .map(|(name, decl)| (name.clone(), parse_declaration(decl)))
                    .collect()
            })
            .unwrap_or_default();
        Self { declared }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateParameter> {
        self.declared.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Check that every declared parameter can get a value before any remote
    /// call is made.
    ///
    /// `supplied_later` names parameters that will be filled in after this
    /// check, such as asset locations. When previous values may be reused the
    /// check cannot fail, because the deployed stack may supply them.
    pub fn precheck(
        &self,
        overrides: &BTreeMap<String, String>,
        supplied_later: &BTreeSet<String>,
        use_previous: bool,
    ) -> Result<(), ParameterError> {
        if use_previous {
            return Ok(());
        }
        let missing = self
            .declared
            .iter()
            .filter(|(name, decl)| {
                decl.default.is_none()
                    && !overrides.contains_key(*name)
                    && !supplied_later.contains(*name)
            })
            .map(|(name, _)| name.clone());
        match NonEmpty::collect(missing) {
            Some(names) => Err(ParameterError::Missing(names)),
            None => Ok(()),
        }
    }

    /// Resolve values for a fresh stack or when previous values must not be reused.
    pub fn supply_all(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<ResolvedParameters, ParameterError> {
        self.resolve(overrides, None)
    }

    /// Resolve values for an existing stack, reusing previous values where
    /// no override is given.
    pub fn update_existing(
        &self,
        overrides: &BTreeMap<String, String>,
        previous: &BTreeMap<String, String>,
    ) -> Result<ResolvedParameters, ParameterError> {
        self.resolve(overrides, Some(previous))
    }

    fn resolve(
        &self,
        overrides: &BTreeMap<String, String>,
        previous: Option<&BTreeMap<String, String>>,
    ) -> Result<ResolvedParameters, ParameterError> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for (name, decl) in &self.declared {
            let previous_value = previous.and_then(|p| p.get(name));
            let parameter = if let Some(value) = overrides.get(name) {
                let changed = !(decl.is_store_backed()
                    && decl.skips_invalidation()
                    && previous_value == Some(value));
                ResolvedParameter {
                    value: Some(value.clone()),
                    source: ParameterSource::Override,
                    changed,
                }
            } else if previous_value.is_some() {
                ResolvedParameter {
                    value: None,
                    source: ParameterSource::Previous,
                    changed: decl.always_invalidates(),
                }
            } else if decl.default.is_some() {
                ResolvedParameter {
                    value: None,
                    source: ParameterSource::Default,
                    changed: true,
                }
            } else {
                missing.push(name.clone());
                continue;
            };
            resolved.insert(name.clone(), parameter);
        }

        if let Some(names) = NonEmpty::from_vec(missing) {
            return Err(ParameterError::Missing(names));
        }

        for (name, value) in overrides {
            if !self.declared.contains_key(name) && !value.is_empty() {
                resolved.insert(
                    name.clone(),
                    ResolvedParameter {
                        value: Some(value.clone()),
                        source: ParameterSource::Undeclared,
                        changed: true,
                    },
                );
            }
        }

        let store_backed = self.declared.values().any(TemplateParameter::always_invalidates);
        Ok(ResolvedParameters {
            parameters: resolved,
            store_backed,
        })
    }
}

fn parse_declaration(decl: &Value) -> TemplateParameter {
    let text = |key: &str| {
        decl.get(key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    };
    TemplateParameter {
        parameter_type: text("Type").unwrap_or_else(|| "String".to_string()),
        default: text("Default"),
        description: text("Description"),
    }
}

/// The outcome of parameter resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParameters {
    parameters: BTreeMap<String, ResolvedParameter>,
    store_backed: bool,
}

impl ResolvedParameters {
    pub fn get(&self, name: &str) -> Option<&ResolvedParameter> {
        self.parameters.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedParameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameters for the service call. Defaults are omitted so the service
    /// applies them; reused values are sent as use-previous markers.
    pub fn api_parameters(&self) -> Vec<ApiParameter> {
        self.parameters
            .iter()
            .filter_map(|(name, p)| match (p.source, &p.value) {
                (ParameterSource::Default, _) => None,
                (ParameterSource::Previous, _) => Some(ApiParameter::use_previous(name)),
                (_, Some(value)) => Some(ApiParameter::value(name, value)),
                (_, None) => None,
            })
            .collect()
    }

    /// Concrete values, with previous values filled in from the deployed stack.
    pub fn values(&self, previous: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.parameters
            .iter()
            .filter_map(|(name, p)| {
                let value = match p.source {
                    ParameterSource::Previous => previous.get(name).cloned(),
                    _ => p.value.clone(),
                };
                value.map(|v| (name.clone(), v))
            })
            .collect()
    }

    /// Summarise the per-parameter flags for the skip-deploy check.
    pub fn changes(&self) -> ParameterChanges {
        if self.store_backed {
            ParameterChanges::Store
        } else if self.parameters.values().any(|p| p.changed) {
            ParameterChanges::Changed
        } else {
            ParameterChanges::Unchanged
        }
    }
}
