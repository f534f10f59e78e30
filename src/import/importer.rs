// ABOUTME: Brings existing resources under a stack through an import change set.
// ABOUTME: Candidates come from a template diff; identifiers from prompts or a mapping file.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::assets::PublisherFactory;
use crate::coordinator::DeploymentCoordinator;
use crate::deploy::{DeployError, DeployStackOptions, DeployStackResult, DeploymentMethod};
use crate::io::{IoHost, IoHostExt};
use crate::provider::{ResourceToImport, SdkProvider};
use crate::stack::{StackArtifact, resources};

use super::diff::{
    Discovery, ImportMap, ImportableResource, ResourceIdentifier, classify_changes,
    describe_resource, format_identifier, map_resource_identifiers,
};

/// Identifier property sets per resource type. Any one complete set identifies a resource.
pub type ResourceIdentifiers = BTreeMap<String, Vec<Vec<String>>>;

/// Imports existing resources into one stack.
pub struct ResourceImporter<'a, P: SdkProvider, F: PublisherFactory> {
    coordinator: &'a DeploymentCoordinator<P, F>,
    artifact: &'a StackArtifact,
    current_template: OnceCell<Value>,
    identifiers: OnceCell<ResourceIdentifiers>,
}

impl<'a, P, F> ResourceImporter<'a, P, F>
where
    P: SdkProvider,
    F: PublisherFactory,
{
    pub fn new(coordinator: &'a DeploymentCoordinator<P, F>, artifact: &'a StackArtifact) -> Self {
        Self {
            coordinator,
            artifact,
            current_template: OnceCell::new(),
            identifiers: OnceCell::new(),
        }
    }

    fn io(&self) -> &dyn IoHost {
        self.coordinator.io().as_ref()
    }

    /// Resources the desired template adds relative to the deployed one.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::InvalidConfiguration` when the desired template
    /// also updates or deletes resources and `allow_non_additions` is false.
    pub async fn discover_importable_resources(
        &self,
        allow_non_additions: bool,
    ) -> Result<Discovery, DeployError> {
        let current = self.current_template().await?;
        let discovery = classify_changes(current, &self.artifact.template);

        if discovery.has_non_additions() {
            let offending = discovery.non_additions.join(", ");
            if !allow_non_additions {
                return Err(DeployError::InvalidConfiguration(format!(
                    "No resource updates or deletes are allowed on import operation. Make sure to resolve pending changes to existing resources, before attempting an import. Updated/deleted resources: {offending} (--force to override)"
                )));
            }
            self.io()
                .warn(format!(
                    "Ignoring updated/deleted resources (--force): {offending}"
                ))
                .await;
        }
        Ok(discovery)
    }

    /// Resolve identifiers for each candidate by asking the host.
    ///
    /// Unsupported types and skipped resources are left out of the map.
    pub async fn ask_for_resource_identifiers(
        &self,
        available: &[ImportableResource],
    ) -> Result<ImportMap, DeployError> {
        let identifiers = self.resource_identifiers().await?;
        let mut import_map = ImportMap::default();
        for resource in available {
            let name = describe_resource(&self.artifact.template, &resource.logical_id);
            if let Some(identifier) =
                ask_for_resource_identifier(self.io(), identifiers, resource, &name).await
            {
                import_map.insert(resource.clone(), identifier);
            }
        }
        Ok(import_map)
    }

    /// Resolve identifiers from a JSON mapping file.
    pub async fn load_resource_identifiers(
        &self,
        available: &[ImportableResource],
        path: &Path,
    ) -> Result<ImportMap, DeployError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let contents: Value = serde_json::from_str(&contents).map_err(|e| {
            DeployError::InvalidConfiguration(format!(
                "{}: invalid resource mapping: {e}",
                path.display()
            ))
        })?;

        let mapped = map_resource_identifiers(available, &contents);
        for logical_id in &mapped.skipped {
            self.io().info(format!("{logical_id}: skipping")).await;
        }
        for (logical_id, identifier) in &mapped.import_map.resource_map {
            self.io()
                .debug(format!(
                    "{logical_id}: importing using {}",
                    format_identifier(identifier)
                ))
                .await;
        }
        if !mapped.unrecognized.is_empty() {
            self.io()
                .warn(format!(
                    "Unrecognized resource identifiers in mapping file: {}",
                    mapped.unrecognized.join(", ")
                ))
                .await;
        }
        Ok(mapped.import_map)
    }

    /// Submit an import change set for the mapped resources.
    ///
    /// The submitted template is the deployed one plus the imported
    /// definitions, so no other change rides along with the import.
    pub async fn import_resources_from_map(
        &self,
        import_map: ImportMap,
        options: DeployStackOptions,
    ) -> Result<DeployStackResult, DeployError> {
        let identifiers = self.resource_identifiers().await?;
        let ImportMap {
            import_resources,
            mut resource_map,
        } = import_map;

        let mut resources_to_import = Vec::with_capacity(import_resources.len());
        for resource in &import_resources {
            if !identifiers.contains_key(&resource.resource_type) {
                return Err(DeployError::UnsupportedResourceType {
                    logical_id: resource.logical_id.clone(),
                    resource_type: resource.resource_type.clone(),
                });
            }
            resources_to_import.push(ResourceToImport {
                logical_resource_id: resource.logical_id.clone(),
                resource_type: resource.resource_type.clone(),
                resource_identifier: resource_map
                    .remove(&resource.logical_id)
                    .unwrap_or_default(),
            });
        }

        let template = self.current_template_with_additions(&import_resources).await?;
        let method = match options.method {
            DeploymentMethod::ChangeSet { .. } => options.method,
            DeploymentMethod::Direct => DeploymentMethod::default(),
        };
        let options = DeployStackOptions {
            method,
            override_template: Some(template),
            resources_to_import,
            ..options
        };

        let stack = self.artifact.name();
        match self.coordinator.import_stack(self.artifact, options).await {
            Ok(result) => {
                let suffix = if result.is_no_op() { " (no changes)" } else { "" };
                self.io().result(format!("{stack}{suffix}")).await;
                Ok(result)
            }
            Err(e) => {
                self.io().error(format!("{stack} failed: {e}")).await;
                Err(e)
            }
        }
    }

    async fn current_template(&self) -> Result<&Value, DeployError> {
        self.current_template
            .get_or_try_init(|| self.coordinator.read_current_template(self.artifact))
            .await
    }

    async fn current_template_with_additions(
        &self,
        additions: &[ImportableResource],
    ) -> Result<Value, DeployError> {
        let mut template = self.current_template().await?.clone();
        if !template.is_object() {
            template = Value::Object(Default::default());
        }
        if resources(&template).is_none() {
            template["Resources"] = Value::Object(Default::default());
        }
        for addition in additions {
            template["Resources"][&addition.logical_id] = addition.resource_definition.clone();
        }
        Ok(template)
    }

    async fn resource_identifiers(&self) -> Result<&ResourceIdentifiers, DeployError> {
        self.identifiers
            .get_or_try_init(|| async {
                let summaries = self
                    .coordinator
                    .resource_identifier_summaries(self.artifact)
                    .await?;
                Ok::<_, DeployError>(
                    summaries
                        .into_iter()
                        .filter(|s| !s.resource_identifiers.is_empty())
                        .map(|s| (s.resource_type, vec![s.resource_identifiers]))
                        .collect(),
                )
            })
            .await
    }
}

/// Resolve one resource's identifier interactively.
///
/// Complete identifier sets from the template are offered for confirmation;
/// rejecting all of them skips the resource. Otherwise each set is prompted
/// property by property, template values and earlier answers as defaults,
/// until one set is complete. An empty answer moves on to the next set.
pub async fn ask_for_resource_identifier(
    io: &dyn IoHost,
    identifiers: &ResourceIdentifiers,
    resource: &ImportableResource,
    name: &str,
) -> Option<ResourceIdentifier> {
    let resource_type = &resource.resource_type;
    let Some(property_sets) = identifiers.get(resource_type) else {
        io.warn(format!(
            "{name}: unsupported resource type {resource_type}, skipping import."
        ))
        .await;
        return None;
    };

    let mut properties = resource.literal_properties();
    let satisfied: Vec<&Vec<String>> = property_sets
        .iter()
        .filter(|set| set.iter().all(|p| properties.get(p).is_some_and(|v| !v.is_empty())))
        .collect();

    for set in &satisfied {
        let candidate: ResourceIdentifier = set
            .iter()
            .filter_map(|p| properties.get(p).map(|v| (p.clone(), v.clone())))
            .collect();
        let question = format!(
            "{name} ({resource_type}): import with {} (yes/no) [default: yes]?",
            format_identifier(&candidate)
        );
        if io.confirm(question, true).await {
            return Some(candidate);
        }
    }

    if !satisfied.is_empty() {
        io.info(format!("Skipping import of {name}")).await;
        return None;
    }

    let prefix = format!("{name} ({resource_type})");
    if property_sets.len() > 1 {
        let choices = property_sets
            .iter()
            .map(|set| set.join("+"))
            .collect::<Vec<_>>()
            .join(", ");
        io.info(format!(
            "{prefix}: enter one of {choices} to import (all empty to skip)"
        ))
        .await;
    }

    for set in property_sets {
        let mut input = ResourceIdentifier::new();
        for property in set {
            let default = properties.get(property).cloned().unwrap_or_default();
            let hint = if default.is_empty() {
                "(empty to skip)".to_string()
            } else {
                format!("[{default}]")
            };
            let answer = io
                .ask(format!("{prefix}: enter {property} {hint}:"), default)
                .await;
            if answer.is_empty() {
                break;
            }
            properties.insert(property.clone(), answer.clone());
            input.insert(property.clone(), answer);
        }
        if input.len() == set.len() {
            return Some(input);
        }
    }

    io.info(format!("Skipping import of {name}")).await;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IoMessage, IoRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedIo {
        answers: Mutex<VecDeque<String>>,
        questions: Mutex<Vec<String>>,
        messages: Mutex<Vec<String>>,
    }

    impl ScriptedIo {
        fn answering(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl IoHost for ScriptedIo {
        async fn notify(&self, message: IoMessage) {
            self.messages.lock().push(message.message);
        }

        async fn request_response(&self, request: IoRequest) -> String {
            self.questions.lock().push(request.message);
            self.answers
                .lock()
                .pop_front()
                .unwrap_or(request.default_response)
        }
    }

    fn bucket(properties: Value) -> ImportableResource {
        ImportableResource {
            logical_id: "Bucket".to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
            resource_definition: json!({"Type": "AWS::S3::Bucket", "Properties": properties}),
        }
    }

    fn identifiers(sets: &[&[&str]]) -> ResourceIdentifiers {
        BTreeMap::from([(
            "AWS::S3::Bucket".to_string(),
            sets.iter()
                .map(|set| set.iter().map(|p| p.to_string()).collect())
                .collect(),
        )])
    }

    #[tokio::test]
    async fn confirms_identifier_found_in_template() {
        let io = ScriptedIo::answering(&["y"]);
        let identifier = ask_for_resource_identifier(
            &io,
            &identifiers(&[&["BucketName"]]),
            &bucket(json!({"BucketName": "logs"})),
            "Bucket",
        )
        .await
        .unwrap();
        assert_eq!(identifier["BucketName"], "logs");
        assert!(io.questions.lock()[0].contains("import with BucketName=logs"));
    }

    #[tokio::test]
    async fn rejecting_template_identifier_skips_resource() {
        let io = ScriptedIo::answering(&["n"]);
        let identifier = ask_for_resource_identifier(
            &io,
            &identifiers(&[&["BucketName"]]),
            &bucket(json!({"BucketName": "logs"})),
            "Bucket",
        )
        .await;
        assert!(identifier.is_none());
        assert!(io.messages.lock().contains(&"Skipping import of Bucket".to_string()));
    }

    #[tokio::test]
    async fn prompts_for_missing_properties() {
        let io = ScriptedIo::answering(&["archive"]);
        let identifier = ask_for_resource_identifier(
            &io,
            &identifiers(&[&["BucketName"]]),
            &bucket(json!({"BucketName": {"Ref": "Name"}})),
            "Bucket",
        )
        .await
        .unwrap();
        assert_eq!(identifier["BucketName"], "archive");
        assert_eq!(
            io.questions.lock()[0],
            "Bucket (AWS::S3::Bucket): enter BucketName (empty to skip):"
        );
    }

    #[tokio::test]
    async fn earlier_answers_become_defaults_for_later_sets() {
        // The first set is abandoned after its first property; its answer
        // carries over as the default for the second set.
        let io = ScriptedIo::answering(&["arn:bucket", ""]);
        let identifier = ask_for_resource_identifier(
            &io,
            &identifiers(&[&["Arn", "Region"], &["Arn"]]),
            &bucket(json!({})),
            "Bucket",
        )
        .await
        .unwrap();
        assert_eq!(identifier, BTreeMap::from([("Arn".to_string(), "arn:bucket".to_string())]));
        let questions = io.questions.lock();
        assert_eq!(questions.len(), 3);
        assert!(questions[2].ends_with("enter Arn [arn:bucket]:"));
    }

    #[tokio::test]
    async fn unsupported_type_is_skipped_with_warning() {
        let io = ScriptedIo::default();
        let resource = ImportableResource {
            logical_id: "Widget".to_string(),
            resource_type: "Custom::Widget".to_string(),
            resource_definition: json!({"Type": "Custom::Widget"}),
        };
        let identifier =
            ask_for_resource_identifier(&io, &identifiers(&[&["BucketName"]]), &resource, "Widget")
                .await;
        assert!(identifier.is_none());
        assert!(io.questions.lock().is_empty());
        assert_eq!(
            io.messages.lock()[0],
            "Widget: unsupported resource type Custom::Widget, skipping import."
        );
    }
}
