// ABOUTME: Seam for fast in-place updates that bypass a full stack deployment.
// ABOUTME: The default hotswapper never applies a hotswap.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::DeployError;
use super::options::HotswapMode;
use crate::stack::{DeployedStack, StackArtifact};

/// What a hotswap attempt achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotswapOutcome {
    /// Changes were applied in place; no stack deployment is needed.
    Applied,
    /// The change cannot be hotswapped, with the reason shown to the user.
    NotHotswappable(String),
}

/// Applies changes directly to running resources.
#[async_trait]
pub trait Hotswapper: Send + Sync {
    async fn try_hotswap(
        &self,
        artifact: &StackArtifact,
        deployed: &DeployedStack,
        parameters: &BTreeMap<String, String>,
        mode: HotswapMode,
    ) -> Result<HotswapOutcome, DeployError>;
}

/// A hotswapper that finds nothing hotswappable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHotswap;

#[async_trait]
impl Hotswapper for NoHotswap {
    async fn try_hotswap(
        &self,
        artifact: &StackArtifact,
        _deployed: &DeployedStack,
        _parameters: &BTreeMap<String, String>,
        _mode: HotswapMode,
    ) -> Result<HotswapOutcome, DeployError> {
        Ok(HotswapOutcome::NotHotswappable(format!(
            "the stack {} contains non-Asset changes",
            artifact.name()
        )))
    }
}
