pub mod client;
pub mod dotnet;
pub mod executor;

pub use client::{
    DEFAULT_IMAGE_TAG, DetailsError, DotnetClient, ManifestError, PreflightError, PublishError,
};
pub use dotnet::DotnetError;
pub use executor::{DotnetExecutor, RealExecutor};
