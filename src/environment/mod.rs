// ABOUTME: Access to target environments: credentials, bootstrap resources and caches.
// ABOUTME: Resolves agnostic environments and hands out per-environment clients.

mod access;
mod account_cache;
mod error;
mod placeholders;
mod resources;
mod toolkit;

pub use access::{EnvironmentAccess, ResolvedEnvironment, TargetEnvironment};
pub use account_cache::{AccountCache, AccountCacheError};
pub use error::{EnvironmentError, EnvironmentErrorKind};
pub use placeholders::{has_placeholders, replace_env_placeholders};
pub use resources::{
    BOOTSTRAP_VERSION_BEFORE_SSM_PARAMETER, EnvironmentResources, EnvironmentResourcesRegistry,
};
pub use toolkit::ToolkitInfo;
