// ABOUTME: Composable capability traits for the remote provisioning service.
// ABOUTME: Defines StackOps, ParameterStoreOps, ImageRepositoryOps and the SdkProvider seam.

mod error;
mod image_repository;
mod parameter_store;
mod sdk_provider;
mod shared_types;
mod stack;

pub use error::ProvisionError;
pub use image_repository::ImageRepositoryOps;
pub use parameter_store::ParameterStoreOps;
pub use sdk_provider::{AccessMode, Account, AssumeRole, SdkForEnvironment, SdkProvider};
pub use shared_types::*;
pub use stack::StackOps;

/// All capabilities needed to drive a stack lifecycle in one environment.
///
/// Automatically implemented for any type implementing every capability trait.
pub trait ProvisioningSdk: StackOps + ParameterStoreOps + ImageRepositoryOps {}

impl<T> ProvisioningSdk for T where T: StackOps + ParameterStoreOps + ImageRepositoryOps {}
