// ABOUTME: Resource-level differences between a deployed and a desired template.
// ABOUTME: Classifies additions as import candidates and maps identifier files onto them.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::stack::resources;

/// Logical id of the metadata resource every synthesized template carries.
const METADATA_RESOURCE: &str = "CDKMetadata";

/// Metadata key holding a resource's construct path.
const PATH_METADATA_KEY: &str = "aws:cdk:path";

/// Identifier properties for one resource, e.g. `{"BucketName": "my-bucket"}`.
pub type ResourceIdentifier = BTreeMap<String, String>;

/// How one resource differs between two templates.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDifference {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    /// Top-level keys (`Type`, `Properties`, `DeletionPolicy`, ...) whose values differ.
    pub changed_keys: BTreeSet<String>,
}

impl ResourceDifference {
    pub fn is_addition(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_none()
    }

    pub fn new_resource_type(&self) -> Option<&str> {
        self.new_value
            .as_ref()
            .and_then(|v| v.get("Type"))
            .and_then(Value::as_str)
    }
}

/// Differing resources between two templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDiff {
    pub resources: BTreeMap<String, ResourceDifference>,
}

impl TemplateDiff {
    /// Compare the `Resources` sections of two templates.
    pub fn between(current: &Value, desired: &Value) -> Self {
        let empty = Map::new();
        let old = resources(current).unwrap_or(&empty);
        let new = resources(desired).unwrap_or(&empty);

        let ids: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let resources = ids
            .into_iter()
            .filter_map(|id| {
                let old_value = old.get(id);
                let new_value = new.get(id);
                if old_value == new_value {
                    return None;
                }
                let difference = ResourceDifference {
                    old_value: old_value.cloned(),
                    new_value: new_value.cloned(),
                    changed_keys: changed_keys(old_value, new_value),
                };
                Some((id.clone(), difference))
            })
            .collect();
        Self { resources }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn changed_keys(old: Option<&Value>, new: Option<&Value>) -> BTreeSet<String> {
    let keys_of = |v: Option<&Value>| {
        v.and_then(Value::as_object)
            .map(|o| o.keys().cloned().collect::<BTreeSet<_>>())
            .unwrap_or_default()
    };
    keys_of(old)
        .union(&keys_of(new))
        .filter(|key| {
            old.and_then(|v| v.get(key.as_str())) != new.and_then(|v| v.get(key.as_str()))
        })
        .cloned()
        .collect()
}

/// A resource that can be brought under management by an import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportableResource {
    pub logical_id: String,
    pub resource_type: String,
    /// Desired definition, with a `Retain` deletion policy unless one is set.
    pub resource_definition: Value,
}

impl ImportableResource {
    /// String-valued properties of the definition. Intrinsics are dropped.
    pub fn literal_properties(&self) -> BTreeMap<String, String> {
        self.resource_definition
            .get("Properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Import candidates and the changes that block a pure import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub additions: Vec<ImportableResource>,
    /// Described names of updated or deleted resources.
    pub non_additions: Vec<String>,
}

impl Discovery {
    pub fn has_non_additions(&self) -> bool {
        !self.non_additions.is_empty()
    }
}

/// Classify the resource changes from `current` to `desired`.
///
/// The metadata resource is ignored. Additions become import candidates.
pub fn classify_changes(current: &Value, desired: &Value) -> Discovery {
    let diff = TemplateDiff::between(current, desired);
    let mut discovery = Discovery::default();
    for (logical_id, difference) in diff.resources {
        if logical_id == METADATA_RESOURCE {
            continue;
        }
        if difference.is_addition() {
            let resource_type = difference.new_resource_type().unwrap_or_default().to_string();
            let definition = difference.new_value.unwrap_or(Value::Null);
            discovery.additions.push(ImportableResource {
                logical_id,
                resource_type,
                resource_definition: with_default_deletion_policy(definition),
            });
        } else {
            let template = if difference.is_removal() { current } else { desired };
            discovery
                .non_additions
                .push(describe_resource(template, &logical_id));
        }
    }
    discovery
}

/// The construct path of a resource when known, else its logical id.
pub fn describe_resource(template: &Value, logical_id: &str) -> String {
    resources(template)
        .and_then(|r| r.get(logical_id))
        .and_then(|r| r.get("Metadata"))
        .and_then(|m| m.get(PATH_METADATA_KEY))
        .and_then(Value::as_str)
        .unwrap_or(logical_id)
        .to_string()
}

fn with_default_deletion_policy(mut definition: Value) -> Value {
    if let Some(object) = definition.as_object_mut()
        && !object.contains_key("DeletionPolicy")
    {
        object.insert("DeletionPolicy".to_string(), Value::String("Retain".to_string()));
    }
    definition
}

/// Resources chosen for import with their identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportMap {
    pub import_resources: Vec<ImportableResource>,
    pub resource_map: BTreeMap<String, ResourceIdentifier>,
}

impl ImportMap {
    pub fn is_empty(&self) -> bool {
        self.import_resources.is_empty()
    }

    pub(crate) fn insert(&mut self, resource: ImportableResource, identifier: ResourceIdentifier) {
        self.resource_map
            .insert(resource.logical_id.clone(), identifier);
        self.import_resources.push(resource);
    }
}

/// A mapping file applied to the import candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedIdentifiers {
    pub import_map: ImportMap,
    /// Candidates the file has no entry for.
    pub skipped: Vec<String>,
    /// File entries that match no candidate.
    pub unrecognized: Vec<String>,
}

/// Match a JSON object of logical id to identifier properties against candidates.
///
/// Non-string identifier values are ignored; an entry left empty skips its resource.
pub fn map_resource_identifiers(
    available: &[ImportableResource],
    contents: &Value,
) -> MappedIdentifiers {
    let empty = Map::new();
    let entries = contents.as_object().unwrap_or(&empty);
    let mut mapped = MappedIdentifiers::default();

    for resource in available {
        let identifier: ResourceIdentifier = entries
            .get(&resource.logical_id)
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        if identifier.is_empty() {
            mapped.skipped.push(resource.logical_id.clone());
        } else {
            mapped.import_map.insert(resource.clone(), identifier);
        }
    }

    mapped.unrecognized = entries
        .keys()
        .filter(|k| !available.iter().any(|r| &r.logical_id == *k))
        .cloned()
        .collect();
    mapped
}

/// Format identifier properties as `Key=Value, Key=Value`.
pub fn format_identifier(identifier: &ResourceIdentifier) -> String {
    identifier
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployed() -> Value {
        json!({
            "Resources": {
                "Queue": {"Type": "AWS::SQS::Queue"},
                "CDKMetadata": {"Type": "AWS::CDK::Metadata", "Properties": {"Analytics": "v1"}}
            }
        })
    }

    #[test]
    fn identical_templates_have_no_diff() {
        assert!(TemplateDiff::between(&deployed(), &deployed()).is_empty());
    }

    #[test]
    fn diff_records_changed_keys() {
        let desired = json!({
            "Resources": {
                "Queue": {"Type": "AWS::SQS::Queue", "Properties": {"DelaySeconds": 5}}
            }
        });
        let diff = TemplateDiff::between(&deployed(), &desired);
        let queue = &diff.resources["Queue"];
        assert!(!queue.is_addition());
        assert_eq!(queue.changed_keys, BTreeSet::from(["Properties".to_string()]));
        assert!(diff.resources["CDKMetadata"].is_removal());
    }

    #[test]
    fn additions_gain_retain_policy_and_metadata_is_ignored() {
        let desired = json!({
            "Resources": {
                "Queue": {"Type": "AWS::SQS::Queue"},
                "CDKMetadata": {"Type": "AWS::CDK::Metadata", "Properties": {"Analytics": "v2"}},
                "Bucket": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "logs"}},
                "Table": {"Type": "AWS::DynamoDB::Table", "DeletionPolicy": "Delete"}
            }
        });
        let discovery = classify_changes(&deployed(), &desired);

        assert!(!discovery.has_non_additions());
        let ids: Vec<_> = discovery.additions.iter().map(|a| a.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["Bucket", "Table"]);
        assert_eq!(discovery.additions[0].resource_definition["DeletionPolicy"], "Retain");
        assert_eq!(discovery.additions[1].resource_definition["DeletionPolicy"], "Delete");
        assert_eq!(discovery.additions[0].resource_type, "AWS::S3::Bucket");
    }

    #[test]
    fn updates_and_deletes_are_non_additions_described_by_path() {
        let desired = json!({
            "Resources": {
                "Queue": {
                    "Type": "AWS::SQS::Queue",
                    "Properties": {"DelaySeconds": 5},
                    "Metadata": {"aws:cdk:path": "Orders/Queue/Resource"}
                }
            }
        });
        let current = json!({
            "Resources": {
                "Queue": {"Type": "AWS::SQS::Queue"},
                "Topic": {"Type": "AWS::SNS::Topic"}
            }
        });
        let discovery = classify_changes(&current, &desired);
        assert_eq!(
            discovery.non_additions,
            vec!["Orders/Queue/Resource".to_string(), "Topic".to_string()]
        );
    }

    #[test]
    fn literal_properties_drop_intrinsics() {
        let resource = ImportableResource {
            logical_id: "Bucket".to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
            resource_definition: json!({
                "Properties": {"BucketName": "logs", "Tags": [{"Ref": "X"}], "Arn": {"Fn::GetAtt": ["A", "Arn"]}}
            }),
        };
        assert_eq!(
            resource.literal_properties(),
            BTreeMap::from([("BucketName".to_string(), "logs".to_string())])
        );
    }

    #[test]
    fn mapping_file_skips_unmapped_and_reports_unknown() {
        let available = vec![
            ImportableResource {
                logical_id: "Bucket".to_string(),
                resource_type: "AWS::S3::Bucket".to_string(),
                resource_definition: json!({}),
            },
            ImportableResource {
                logical_id: "Table".to_string(),
                resource_type: "AWS::DynamoDB::Table".to_string(),
                resource_definition: json!({}),
            },
        ];
        let contents = json!({
            "Bucket": {"BucketName": "logs"},
            "Typo": {"TableName": "orders"}
        });
        let mapped = map_resource_identifiers(&available, &contents);
        assert_eq!(mapped.import_map.import_resources.len(), 1);
        assert_eq!(
            format_identifier(&mapped.import_map.resource_map["Bucket"]),
            "BucketName=logs"
        );
        assert_eq!(mapped.skipped, vec!["Table".to_string()]);
        assert_eq!(mapped.unrecognized, vec!["Typo".to_string()]);
    }
}
