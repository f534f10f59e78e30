// ABOUTME: Resource import: bring existing infrastructure under a stack's management.
// ABOUTME: Pure template diffing lives in `diff`; the remote workflow in `importer`.

mod diff;
mod importer;

pub use diff::{
    Discovery, ImportMap, ImportableResource, MappedIdentifiers, ResourceDifference,
    ResourceIdentifier, TemplateDiff, classify_changes, describe_resource, format_identifier,
    map_resource_identifiers,
};
pub use importer::{ResourceIdentifiers, ResourceImporter, ask_for_resource_identifier};
