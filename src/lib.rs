// ABOUTME: Library root for stackpilot - deployment orchestration for provisioned stacks.
// ABOUTME: The main binary is in main.rs; everything it drives lives here.

pub mod assets;
pub mod config;
pub mod coordinator;
pub mod deploy;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod events;
pub mod import;
pub mod io;
pub mod output;
pub mod poll;
pub mod provider;
pub mod stack;
pub mod types;

pub use coordinator::{DeploymentCoordinator, StackExistsOptions};
pub use import::ResourceImporter;
