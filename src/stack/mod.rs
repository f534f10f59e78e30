// ABOUTME: Stack artifacts, live stack status and template loading.
// ABOUTME: The inputs and observations every state machine works from.

mod artifact;
mod deployed;
mod status;
mod template;

pub use artifact::{
    AssetMetadata, Environment, LookupRole, StackArtifact, UNKNOWN_ACCOUNT, UNKNOWN_REGION,
};
pub use deployed::DeployedStack;
pub use status::{RollbackChoice, StackStatus};
pub use template::{TemplateError, load_template, resources, template_from_str};
