// ABOUTME: Generic stack deployment struct parameterized by state marker.
// ABOUTME: Construction runs the local parameter check before any remote call.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::stack::StackArtifact;

use super::DeployError;
use super::options::{DeployStackOptions, DeploymentMethod};
use super::parameters::TemplateParameters;
use super::state::Initialized;

/// Capabilities acknowledged on every submission.
pub(crate) const CAPABILITIES: [&str; 3] = [
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// A deployment of one stack, parameterized by its current state.
///
/// The state type parameter `St` carries what earlier steps learned (the
/// deployed stack, resolved parameters, submission time), so later steps
/// cannot run before the data they need exists.
#[derive(Debug)]
pub struct StackDeployment<St> {
    pub(crate) artifact: StackArtifact,
    pub(crate) options: DeployStackOptions,
    pub(crate) template: Value,
    pub(crate) role_arn: Option<String>,
    /// Shared by every client token of this deployment.
    pub(crate) execution_id: String,
    pub(crate) state: St,
}

impl StackDeployment<Initialized> {
    /// Start a deployment.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::MissingParameterValue` when a declared parameter
    /// cannot get a value from overrides, asset locations or defaults and
    /// previous values may not be reused, and
    /// `DeployError::InvalidConfiguration` when resources are imported with
    /// direct deployment.
    pub fn new(artifact: StackArtifact, options: DeployStackOptions) -> Result<Self, DeployError> {
        if options.method == DeploymentMethod::Direct && !options.resources_to_import.is_empty() {
            return Err(DeployError::InvalidConfiguration(
                "Importing resources requires a changeset deployment".to_string(),
            ));
        }

        let template = options
            .override_template
            .clone()
            .unwrap_or_else(|| artifact.template.clone());

        TemplateParameters::from_template(&template)
            .precheck(
                &options.parameters,
                &asset_parameter_names(&artifact),
                options.use_previous_parameters,
            )
            .map_err(|source| DeployError::MissingParameterValue {
                stack: artifact.name().to_string(),
                source,
            })?;

        Ok(StackDeployment {
            artifact,
            options,
            template,
            role_arn: None,
            execution_id: uuid::Uuid::new_v4().to_string(),
            state: Initialized,
        })
    }

    /// Set the execution role, with placeholders already resolved.
    pub fn with_execution_role(mut self, role_arn: Option<String>) -> Self {
        self.role_arn = role_arn;
        self
    }
}

impl<St> StackDeployment<St> {
    pub fn stack_name(&self) -> &str {
        self.artifact.name()
    }

    pub fn artifact(&self) -> &StackArtifact {
        &self.artifact
    }

    pub fn options(&self) -> &DeployStackOptions {
        &self.options
    }

    /// The template that will be submitted.
    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn state(&self) -> &St {
        &self.state
    }

    /// Tags to apply: explicit options win over the artifact's own.
    pub(crate) fn tags(&self) -> BTreeMap<String, String> {
        self.options
            .tags
            .clone()
            .unwrap_or_else(|| self.artifact.tags.clone())
    }

    pub(crate) fn transition<T>(self, state: T) -> StackDeployment<T> {
        StackDeployment {
            artifact: self.artifact,
            options: self.options,
            template: self.template,
            role_arn: self.role_arn,
            execution_id: self.execution_id,
            state,
        }
    }
}

/// Parameters that asset publishing fills in.
fn asset_parameter_names(artifact: &StackArtifact) -> BTreeSet<String> {
    artifact
        .assets
        .iter()
        .flat_map(|asset| {
            [
                asset.s3_bucket_parameter.clone(),
                asset.s3_key_parameter.clone(),
                asset.artifact_hash_parameter.clone(),
                asset.image_name_parameter.clone(),
            ]
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployErrorKind;
    use crate::provider::ResourceToImport;
    use crate::stack::{AssetMetadata, Environment};
    use crate::types::StackName;
    use serde_json::json;

    fn artifact(template: Value) -> StackArtifact {
        StackArtifact::new(
            StackName::new("Orders").unwrap(),
            template,
            Environment::new("123456789012", "eu-west-1"),
        )
    }

    #[test]
    fn missing_parameter_fails_before_remote_calls() {
        let options = DeployStackOptions {
            use_previous_parameters: false,
            ..DeployStackOptions::default()
        };
        let err = StackDeployment::new(
            artifact(json!({"Parameters": {"Stage": {"Type": "String"}}})),
            options,
        )
        .unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::MissingParameterValue);
        assert_eq!(
            err.to_string(),
            "Orders: The following parameters are missing a value: Stage"
        );
    }

    #[test]
    fn asset_parameters_satisfy_the_precheck() {
        let mut stack = artifact(json!({
            "Parameters": {
                "AssetParametersabcS3Bucket": {"Type": "String"},
                "AssetParametersabcS3VersionKey": {"Type": "String"},
                "AssetParametersabcArtifactHash": {"Type": "String"}
            }
        }));
        stack.assets.push(AssetMetadata::file("abc", "abc", "asset.abc", "zip"));
        let options = DeployStackOptions {
            use_previous_parameters: false,
            ..DeployStackOptions::default()
        };
        assert!(StackDeployment::new(stack, options).is_ok());
    }

    #[test]
    fn import_requires_change_set() {
        let options = DeployStackOptions {
            method: DeploymentMethod::Direct,
            resources_to_import: vec![ResourceToImport {
                logical_resource_id: "Bucket".to_string(),
                resource_type: "AWS::S3::Bucket".to_string(),
                resource_identifier: BTreeMap::new(),
            }],
            ..DeployStackOptions::default()
        };
        let err = StackDeployment::new(artifact(json!({})), options).unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::InvalidConfiguration);
    }

    #[test]
    fn override_template_replaces_artifact_template() {
        let options = DeployStackOptions {
            override_template: Some(json!({"Resources": {"Q": {"Type": "AWS::SQS::Queue"}}})),
            ..DeployStackOptions::default()
        };
        let deployment = StackDeployment::new(artifact(json!({})), options).unwrap();
        assert!(deployment.template()["Resources"]["Q"].is_object());
    }

    #[test]
    fn explicit_tags_win() {
        let mut stack = artifact(json!({}));
        stack.tags.insert("team".to_string(), "a".to_string());
        let options = DeployStackOptions {
            tags: Some(BTreeMap::from([("team".to_string(), "b".to_string())])),
            ..DeployStackOptions::default()
        };
        let deployment = StackDeployment::new(stack, options).unwrap();
        assert_eq!(deployment.tags()["team"], "b");
    }
}
