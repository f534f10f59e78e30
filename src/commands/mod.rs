// ABOUTME: Command module aggregator for the stackpilot CLI.
// ABOUTME: Re-exports the offline params and import-plan command handlers.

mod import_plan;
mod params;

pub use import_plan::{ImportPlanRequest, import_plan};
pub use params::{ParamsRequest, params};
