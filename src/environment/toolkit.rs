// ABOUTME: Bootstrap (toolkit) stack information for one environment.
// ABOUTME: Version, staging bucket and image repository read from the stack outputs.

use crate::provider::{ProvisionError, StackOps};
use crate::stack::DeployedStack;
use std::collections::BTreeMap;

/// What the bootstrap stack of an environment looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitInfo {
    Found {
        stack_name: String,
        outputs: BTreeMap<String, String>,
    },
    NotFound {
        stack_name: String,
    },
}

impl ToolkitInfo {
    /// Read the bootstrap stack. A stack whose creation failed counts as absent.
    pub async fn lookup<S>(sdk: &S, stack_name: &str) -> Result<Self, ProvisionError>
    where
        S: StackOps + ?Sized,
    {
        let stack = DeployedStack::lookup(sdk, stack_name).await?;
        if !stack.exists() {
            tracing::debug!(stack = %stack_name, "environment has no bootstrap stack");
            return Ok(ToolkitInfo::NotFound {
                stack_name: stack_name.to_string(),
            });
        }
        if stack.status().is_creation_failure() {
            tracing::debug!(stack = %stack_name, "bootstrap stack is in a failed state");
            return Ok(ToolkitInfo::NotFound {
                stack_name: stack_name.to_string(),
            });
        }
        Ok(ToolkitInfo::Found {
            stack_name: stack_name.to_string(),
            outputs: stack.outputs(),
        })
    }

    pub fn found(&self) -> bool {
        matches!(self, ToolkitInfo::Found { .. })
    }

    pub fn stack_name(&self) -> &str {
        match self {
            ToolkitInfo::Found { stack_name, .. } | ToolkitInfo::NotFound { stack_name } => {
                stack_name
            }
        }
    }

    fn output(&self, key: &str) -> Option<&str> {
        match self {
            ToolkitInfo::Found { outputs, .. } => outputs.get(key).map(String::as_str),
            ToolkitInfo::NotFound { .. } => None,
        }
    }

    /// Bootstrap version; stacks predating the output report 0.
    pub fn version(&self) -> u32 {
        self.output("BootstrapVersion")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.output("BucketName")
    }

    pub fn bucket_url(&self) -> Option<String> {
        self.output("BucketDomainName")
            .map(|domain| format!("https://{domain}"))
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.output("ImageRepositoryName")
    }

    pub fn has_staging_bucket(&self) -> bool {
        self.bucket_name().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(outputs: &[(&str, &str)]) -> ToolkitInfo {
        ToolkitInfo::Found {
            stack_name: "CDKToolkit".to_string(),
            outputs: outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn reads_outputs() {
        let info = found(&[
            ("BootstrapVersion", "21"),
            ("BucketName", "staging"),
            ("BucketDomainName", "staging.s3.amazonaws.com"),
        ]);
        assert!(info.found());
        assert_eq!(info.version(), 21);
        assert_eq!(info.bucket_name(), Some("staging"));
        assert_eq!(
            info.bucket_url().as_deref(),
            Some("https://staging.s3.amazonaws.com")
        );
        assert!(info.has_staging_bucket());
    }

    #[test]
    fn missing_version_is_zero() {
        assert_eq!(found(&[]).version(), 0);
        assert_eq!(found(&[("BootstrapVersion", "abc")]).version(), 0);
    }

    #[test]
    fn not_found_has_nothing() {
        let info = ToolkitInfo::NotFound {
            stack_name: "CDKToolkit".to_string(),
        };
        assert!(!info.found());
        assert!(!info.has_staging_bucket());
        assert_eq!(info.stack_name(), "CDKToolkit");
    }
}
