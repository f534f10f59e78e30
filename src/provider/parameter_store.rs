// ABOUTME: Remote parameter store trait.
// ABOUTME: Reads the deployed bootstrap version and similar single-value parameters.

use super::error::ProvisionError;
use async_trait::async_trait;

/// Remote parameter store reads.
#[async_trait]
pub trait ParameterStoreOps: Send + Sync {
    /// Read a parameter value. `ProvisionError::ParameterNotFound` when absent.
    async fn get_parameter(&self, name: &str) -> Result<String, ProvisionError>;
}
