// ABOUTME: Errors raised while turning stack asset metadata into manifest entries.
// ABOUTME: Packaging, configuration and bootstrap-stack problems.

use crate::environment::EnvironmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Unsupported packaging type: {0}")]
    UnsupportedPackaging(String),

    #[error("Invalid image asset configuration: {0}")]
    InvalidConfiguration(String),

    #[error(
        "This stack uses assets, so the bootstrap stack must be deployed to the environment {environment}"
    )]
    BootstrapStackRequired { environment: String },

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}
