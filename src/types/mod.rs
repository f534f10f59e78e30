// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to keep stack, change set and manifest IDs apart.

mod id;
mod stack_name;

pub use id::{ChangeSetId, Id, ManifestId, MonitorId, StackId};
pub use stack_name::{StackName, StackNameError};
