// ABOUTME: Content-addressed asset pipeline: manifest building and publisher caching.
// ABOUTME: Builds and uploads are delegated to an external publisher behind a trait.

mod builder;
mod cross_account;
mod error;
mod manifest;
mod publisher;

pub use builder::{AssetManifestBuilder, file_asset_key, image_repository_name};
pub use cross_account::determine_allow_cross_account_asset_publishing;
pub use error::AssetError;
pub use manifest::{
    AssetManifest, FileDestination, FilePackaging, FileSource, ImageDestination, ImageSource,
    MANIFEST_VERSION, ManifestEntry,
};
pub use publisher::{AssetPublisher, PublishError, PublisherCache, PublisherFactory, PublisherOptions};
