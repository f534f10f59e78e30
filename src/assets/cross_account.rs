// ABOUTME: Decides whether assets may be published to accounts other than the bootstrapped one.
// ABOUTME: Old bootstrap stacks with a staging bucket are protected against it.

use crate::environment::ToolkitInfo;
use crate::io::{IoHost, IoHostExt};
use crate::provider::StackOps;

/// First bootstrap version whose roles can guard cross-account publishing.
const CROSS_ACCOUNT_SAFE_BOOTSTRAP_VERSION: u32 = 21;

/// Allowed when the bootstrap stack has no staging bucket or is recent enough.
/// Any failure to tell disallows it.
pub async fn determine_allow_cross_account_asset_publishing<S>(
    sdk: &S,
    io: &dyn IoHost,
    toolkit_stack_name: &str,
) -> bool
where
    S: StackOps + ?Sized,
{
    let reason = match ToolkitInfo::lookup(sdk, toolkit_stack_name).await {
        Ok(info) if info.found() => {
            return !info.has_staging_bucket()
                || info.version() >= CROSS_ACCOUNT_SAFE_BOOTSTRAP_VERSION;
        }
        Ok(_) => format!("Toolkit stack {toolkit_stack_name} not found"),
        Err(e) => e.to_string(),
    };

    io.debug(format!(
        "Error determining cross account asset publishing: {reason}"
    ))
    .await;
    io.debug("Defaulting to disallowing cross account asset publishing".to_string())
        .await;
    false
}
