// Orchestrator: one attempt for one URL (list -> resolve -> fetch)

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::{DownloadError, FetchError, ResolveError};
use super::format_selector::FormatSelector;
use super::models::{OutputOptions, QualityPreference, ResolvedSelection};
use super::route::RouteHandle;
use super::traits::MediaAdapter;

/// Successful attempt
#[derive(Debug, Clone)]
pub struct AttemptSuccess {
    pub output: PathBuf,
    pub selection: ResolvedSelection,
}

/// Read-only context shared by all workers of a run
pub struct Downloader {
    adapter: Arc<dyn MediaAdapter>,
    preference: QualityPreference,
    route: RouteHandle,
    output: OutputOptions,
}

impl Downloader {
    pub fn new(
        adapter: Arc<dyn MediaAdapter>,
        preference: QualityPreference,
        route: RouteHandle,
        output: OutputOptions,
    ) -> Self {
        Self {
            adapter,
            preference,
            route,
            output,
        }
    }

    pub fn route(&self) -> &RouteHandle {
        &self.route
    }

    pub fn output(&self) -> &OutputOptions {
        &self.output
    }

    pub async fn attempt(&self, url: &str) -> Result<AttemptSuccess, FetchError> {
        debug!("[{}] Listing variants for {}", self.adapter.name(), url);
        let catalog = self.adapter.list_variants(url, &self.route).await?;

        let selection = FormatSelector::resolve(&catalog, &self.preference).map_err(|e| match e {
            ResolveError::Unsatisfiable => FetchError::permanent(DownloadError::Unsatisfiable),
            ResolveError::DuplicateContainerId(id) => {
                FetchError::permanent(DownloadError::DuplicateFormatId(id))
            }
        })?;

        let audio = selection
            .audio
            .as_ref()
            .map_or_else(|| "-".to_string(), |a| a.describe());
        info!(
            "{}: video {} + audio {} (format {})",
            url,
            selection.video.describe(),
            audio,
            selection.format_spec()
        );
        if selection.degraded {
            warn!("{}: preference could not be met exactly, using closest match", url);
        }

        let output = self
            .adapter
            .fetch_and_mux(
                url,
                &selection,
                &self.route,
                &self.output.output_dir,
                self.output.container,
            )
            .await?;

        Ok(AttemptSuccess { output, selection })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{CodecFamily, ContainerFormat, StreamVariant};
    use async_trait::async_trait;
    use std::path::Path;

    struct StaticAdapter {
        catalog: Vec<StreamVariant>,
    }

    #[async_trait]
    impl MediaAdapter for StaticAdapter {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn list_variants(
            &self,
            _url: &str,
            _route: &RouteHandle,
        ) -> Result<Vec<StreamVariant>, FetchError> {
            Ok(self.catalog.clone())
        }

        async fn fetch_and_mux(
            &self,
            _url: &str,
            selection: &ResolvedSelection,
            _route: &RouteHandle,
            output_dir: &Path,
            container: ContainerFormat,
        ) -> Result<PathBuf, FetchError> {
            Ok(output_dir.join(format!("{}.{}", selection.format_spec(), container)))
        }
    }

    fn downloader(catalog: Vec<StreamVariant>) -> Downloader {
        Downloader::new(
            Arc::new(StaticAdapter { catalog }),
            QualityPreference::default(),
            RouteHandle::Direct,
            OutputOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_attempt_resolves_and_fetches() {
        let d = downloader(vec![
            StreamVariant::video_only("137", 1080, CodecFamily::H264),
            StreamVariant::audio_only("140", 128),
        ]);
        let ok = d.attempt("https://youtu.be/a").await.unwrap();
        assert_eq!(ok.selection.format_spec(), "137+140");
        assert!(ok.output.ends_with("137+140.mp4"));
    }

    #[tokio::test]
    async fn test_unsatisfiable_is_permanent() {
        let d = downloader(vec![StreamVariant::audio_only("140", 128)]);
        let err = d.attempt("https://youtu.be/a").await.unwrap_err();
        assert_eq!(err.error, DownloadError::Unsatisfiable);
        assert!(!err.transient);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_permanent() {
        let d = downloader(vec![
            StreamVariant::video_only("137", 1080, CodecFamily::H264),
            StreamVariant::video_only("137", 720, CodecFamily::H264),
        ]);
        let err = d.attempt("https://youtu.be/a").await.unwrap_err();
        assert_eq!(err.error, DownloadError::DuplicateFormatId("137".to_string()));
        assert!(!err.transient);
    }
}
