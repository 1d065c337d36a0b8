// Fetch-and-mux adapter trait definition

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::FetchError;
use super::models::{ContainerFormat, ResolvedSelection, StreamVariant};
use super::route::RouteHandle;

/// Boundary to the external extraction library and muxer
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Name of the adapter (for logging)
    fn name(&self) -> &'static str;

    /// Enumerate the variants currently offered for `url`
    async fn list_variants(
        &self,
        url: &str,
        route: &RouteHandle,
    ) -> Result<Vec<StreamVariant>, FetchError>;

    /// Download the selected variants and merge them into one file
    async fn fetch_and_mux(
        &self,
        url: &str,
        selection: &ResolvedSelection,
        route: &RouteHandle,
        output_dir: &Path,
        container: ContainerFormat,
    ) -> Result<PathBuf, FetchError>;
}
