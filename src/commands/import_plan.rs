// ABOUTME: Import-plan command: which resources an import would bring under management.
// ABOUTME: Works on local templates and a mapping file without contacting the service.

use serde_json::{Value, json};
use stackpilot::diagnostics::{Diagnostics, Warning};
use stackpilot::error::{Error, Result};
use stackpilot::import::{classify_changes, format_identifier, map_resource_identifiers};
use stackpilot::io::IoHostExt;
use stackpilot::output::Output;
use stackpilot::stack::load_template;
use std::path::PathBuf;

pub struct ImportPlanRequest {
    pub deployed: PathBuf,
    pub desired: PathBuf,
    pub mapping: PathBuf,
    pub force: bool,
}

pub async fn import_plan(request: ImportPlanRequest, output: &Output) -> Result<()> {
    let deployed = load_template(&request.deployed)?;
    let desired = load_template(&request.desired)?;
    let mut diag = Diagnostics::default();

    let discovery = classify_changes(&deployed, &desired);
    if discovery.has_non_additions() {
        if !request.force {
            return Err(Error::InvalidArgument(format!(
                "No resource updates or deletes are allowed on import operation. Updated/deleted resources: {} (--force to override)",
                discovery.non_additions.join(", ")
            )));
        }
        diag.warn(Warning::ignored_changes(&discovery.non_additions));
    }

    let mapping: Value = serde_json::from_str(&std::fs::read_to_string(&request.mapping)?)?;
    let mapped = map_resource_identifiers(&discovery.additions, &mapping);
    for logical_id in &mapped.skipped {
        diag.warn(Warning::skipped_resource(logical_id));
    }
    if !mapped.unrecognized.is_empty() {
        diag.warn(Warning::unrecognized_mapping(&mapped.unrecognized));
    }

    for warning in diag.warnings() {
        output.warn(warning.message.clone()).await;
    }

    let import_map = mapped.import_map;
    for resource in &import_map.import_resources {
        if let Some(identifier) = import_map.resource_map.get(&resource.logical_id) {
            output
                .info(format!(
                    "{} ({}): import with {}",
                    resource.logical_id,
                    resource.resource_type,
                    format_identifier(identifier)
                ))
                .await;
        }
    }

    let resources: Vec<Value> = import_map
        .import_resources
        .iter()
        .map(|resource| {
            json!({
                "logicalId": resource.logical_id,
                "resourceType": resource.resource_type,
                "identifier": import_map.resource_map.get(&resource.logical_id),
            })
        })
        .collect();
    output.data(
        &format!("{} resource(s) to import", resources.len()),
        &json!({ "resourcesToImport": resources }),
    );
    Ok(())
}
