// ABOUTME: Credential and client provider seam for target environments.
// ABOUTME: Hands out provisioning clients per environment, access mode and assumed role.

use super::ProvisioningSdk;
use super::error::ProvisionError;
use crate::environment::ResolvedEnvironment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether the caller only reads or also mutates remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ForReading,
    ForWriting,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::ForReading => write!(f, "read"),
            AccessMode::ForWriting => write!(f, "write"),
        }
    }
}

/// A role to assume for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRole {
    pub role_arn: String,
    pub external_id: Option<String>,
}

/// The account behind a set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub partition: String,
}

/// A client bound to one environment.
#[derive(Debug)]
pub struct SdkForEnvironment<S> {
    pub sdk: Arc<S>,
    pub did_assume_role: bool,
}

impl<S> Clone for SdkForEnvironment<S> {
    fn clone(&self) -> Self {
        Self {
            sdk: Arc::clone(&self.sdk),
            did_assume_role: self.did_assume_role,
        }
    }
}

/// Produces provisioning clients. Role assumption mechanics live behind this trait.
#[async_trait]
pub trait SdkProvider: Send + Sync + 'static {
    type Sdk: ProvisioningSdk + 'static;

    /// Region used when a stack targets `unknown-region`.
    fn default_region(&self) -> String;

    /// Access key of the default credentials, used as the account cache key.
    fn default_access_key_id(&self) -> Option<String>;

    /// Ask the service which account the default credentials belong to.
    async fn lookup_default_account(&self) -> Result<Option<Account>, ProvisionError>;

    /// A client for the environment, optionally assuming a role.
    async fn for_environment(
        &self,
        environment: &ResolvedEnvironment,
        mode: AccessMode,
        role: Option<&AssumeRole>,
    ) -> Result<SdkForEnvironment<Self::Sdk>, ProvisionError>;
}
