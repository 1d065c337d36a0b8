// Queue processor: bounded worker pool with retry and per-item isolation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::orchestrator::Downloader;
use super::outcome::{ItemOutcome, RunOutcome};
use super::queue::{ItemStatus, QueueBoard, QueueItem};

/// Upper bound for the linear backoff multiplier
const MAX_BACKOFF_FACTOR: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Items in progress at once; 0 is treated as 1
    pub concurrency_limit: usize,
    /// Retries after the first attempt, transient failures only
    pub retry_count: u32,
    /// Base wait before a retry, zero disables waiting
    pub retry_wait: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 1,
            retry_count: 2,
            retry_wait: Duration::from_secs(5),
        }
    }
}

impl ProcessorSettings {
    pub fn workers_for(&self, items: usize) -> usize {
        self.concurrency_limit.max(1).min(items.max(1))
    }

    /// Wait before retry `n` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        self.retry_wait.saturating_mul(retry.clamp(1, MAX_BACKOFF_FACTOR))
    }
}

/// What workers report back to the aggregator, keyed by queue slot
#[derive(Debug)]
enum WorkerEvent {
    Started(usize),
    Finished(usize, ItemOutcome),
}

pub struct QueueProcessor {
    downloader: Arc<Downloader>,
    settings: ProcessorSettings,
}

impl QueueProcessor {
    pub fn new(downloader: Arc<Downloader>, settings: ProcessorSettings) -> Self {
        Self {
            downloader,
            settings,
        }
    }

    /// Drain the whole queue; outcomes keep the order of `items`
    pub async fn run(&self, items: Vec<QueueItem>, cancel: CancellationToken) -> RunOutcome {
        if items.is_empty() {
            return RunOutcome::default();
        }

        let total = items.len();
        let workers = self.settings.workers_for(total);
        info!(
            "Processing {} item(s) with {} worker(s), {} retries",
            total, workers, self.settings.retry_count
        );

        let (work_tx, work_rx) = mpsc::channel::<(usize, QueueItem)>(total);
        let mut board = QueueBoard::new(&items);
        for (slot, item) in items.into_iter().enumerate() {
            // capacity equals the queue length, so this never waits
            if work_tx.send((slot, item)).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<WorkerEvent>();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let downloader = Arc::clone(&self.downloader);
            let settings = self.settings;
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some((slot, item)) = next else {
                        break;
                    };

                    let outcome = if cancel.is_cancelled() {
                        ItemOutcome::skipped(item.index, &item.url, 0)
                    } else {
                        debug!("worker {} took #{} {}", worker_id, item.index, item.url);
                        if result_tx.send(WorkerEvent::Started(slot)).is_err() {
                            break;
                        }
                        process_item(&downloader, &settings, &item, &cancel).await
                    };

                    if result_tx.send(WorkerEvent::Finished(slot, outcome)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let mut slots: Vec<Option<ItemOutcome>> = vec![None; total];
        while let Some(event) = result_rx.recv().await {
            match event {
                WorkerEvent::Started(slot) => {
                    board.start(slot);
                    debug!(
                        "{} in progress, {}/{} done",
                        board.count(ItemStatus::InProgress),
                        board.done(),
                        board.len()
                    );
                }
                WorkerEvent::Finished(slot, outcome) => {
                    board.finish(slot, outcome.status);
                    log_outcome(&outcome);
                    info!("Progress: {}/{}", board.done(), board.len());
                    if let Some(entry) = slots.get_mut(slot) {
                        *entry = Some(outcome);
                    }
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("worker task failed: {}", e);
            }
        }

        let items = slots
            .into_iter()
            .zip(board.into_items())
            .map(|(slot, item)| slot.unwrap_or_else(|| lost_outcome(&item)))
            .collect();

        RunOutcome { items }
    }
}

/// Outcome for an item whose worker never reported back
fn lost_outcome(item: &QueueItem) -> ItemOutcome {
    let mut lost = ItemOutcome::skipped(item.index, &item.url, 0);
    lost.message = Some(match item.status {
        ItemStatus::InProgress => "worker stopped while downloading".to_string(),
        _ => "worker stopped before reporting".to_string(),
    });
    lost
}

async fn process_item(
    downloader: &Downloader,
    settings: &ProcessorSettings,
    item: &QueueItem,
    cancel: &CancellationToken,
) -> ItemOutcome {
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match downloader.attempt(&item.url).await {
            Ok(ok) => {
                return ItemOutcome::succeeded(
                    item.index,
                    &item.url,
                    attempts,
                    ok.output,
                    ok.selection.degraded,
                );
            }
            Err(err) => err,
        };

        if !err.transient || attempts > settings.retry_count {
            return ItemOutcome::failed(item.index, &item.url, attempts, &err);
        }

        let wait = settings.backoff(attempts);
        warn!(
            "#{} {} attempt {} failed ({}), retrying in {:?}",
            item.index, item.url, attempts, err, wait
        );

        if cancel.is_cancelled() {
            return ItemOutcome::skipped(item.index, &item.url, attempts);
        }
        if !wait.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return ItemOutcome::skipped(item.index, &item.url, attempts);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

fn log_outcome(outcome: &ItemOutcome) {
    match outcome.status {
        ItemStatus::Succeeded => info!(
            index = outcome.index,
            url = %outcome.url,
            attempts = outcome.attempts,
            "succeeded: {}",
            outcome.output.as_ref().map_or_else(String::new, |p| p.display().to_string())
        ),
        ItemStatus::Skipped => info!(
            index = outcome.index,
            url = %outcome.url,
            attempts = outcome.attempts,
            "skipped"
        ),
        _ => warn!(
            index = outcome.index,
            url = %outcome.url,
            attempts = outcome.attempts,
            "failed: {}",
            outcome.message.as_deref().unwrap_or("")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::{DownloadError, FetchError};
    use crate::downloader::extractors::BlockingReason;
    use crate::downloader::models::{
        CodecFamily, ContainerFormat, OutputOptions, QualityPreference, ResolvedSelection,
        StreamVariant,
    };
    use crate::downloader::outcome::ErrorClass;
    use crate::downloader::route::RouteHandle;
    use crate::downloader::traits::MediaAdapter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        AlwaysTransient,
        Permanent,
        AudioOnly,
        /// yt-dlp stderr for an access refusal
        Stderr(&'static str),
        FailTimes(u32),
        Slow(u64),
    }

    struct MockAdapter {
        behaviors: HashMap<String, Behavior>,
        calls: std::sync::Mutex<HashMap<String, u32>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockAdapter {
        fn new(behaviors: &[(&str, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                behaviors: behaviors.iter().map(|(u, b)| (u.to_string(), *b)).collect(),
                calls: std::sync::Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn calls(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl MediaAdapter for MockAdapter {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn list_variants(
            &self,
            url: &str,
            _route: &RouteHandle,
        ) -> Result<Vec<StreamVariant>, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(url.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            let full = vec![
                StreamVariant::video_only("137", 1080, CodecFamily::H264),
                StreamVariant::audio_only("140", 192),
            ];
            match self.behaviors.get(url).copied().unwrap_or(Behavior::Succeed) {
                Behavior::AlwaysTransient => Err(DownloadError::NetworkTimeout.into()),
                Behavior::Permanent => Err(DownloadError::InvalidUrl(url.to_string()).into()),
                Behavior::AudioOnly => Ok(vec![StreamVariant::audio_only("140", 192)]),
                Behavior::Stderr(text) => Err(DownloadError::from(text.to_string()).into()),
                Behavior::FailTimes(n) if call <= n => {
                    Err(DownloadError::Blocked(BlockingReason::RateLimited).into())
                }
                _ => Ok(full),
            }
        }

        async fn fetch_and_mux(
            &self,
            url: &str,
            _selection: &ResolvedSelection,
            _route: &RouteHandle,
            output_dir: &Path,
            container: ContainerFormat,
        ) -> Result<PathBuf, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(Behavior::Slow(ms)) = self.behaviors.get(url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = url.rsplit('/').next().unwrap_or("video");
            Ok(output_dir.join(format!("{}.{}", name, container)))
        }
    }

    fn processor(adapter: Arc<MockAdapter>, settings: ProcessorSettings) -> QueueProcessor {
        let downloader = Downloader::new(
            adapter,
            QualityPreference::default(),
            RouteHandle::Direct,
            OutputOptions::default(),
        );
        QueueProcessor::new(Arc::new(downloader), settings)
    }

    fn settings(concurrency: usize, retries: u32) -> ProcessorSettings {
        ProcessorSettings {
            concurrency_limit: concurrency,
            retry_count: retries,
            retry_wait: Duration::ZERO,
        }
    }

    fn queue(urls: &[&str]) -> Vec<QueueItem> {
        urls.iter().enumerate().map(|(i, u)| QueueItem::new(i, *u)).collect()
    }

    #[tokio::test]
    async fn test_transient_exhausts_retries_sibling_succeeds() {
        let adapter = MockAdapter::new(&[
            ("https://v/url1", Behavior::AlwaysTransient),
            ("https://v/url2", Behavior::Succeed),
        ]);
        let p = processor(adapter.clone(), settings(1, 2));

        let outcome = p
            .run(queue(&["https://v/url1", "https://v/url2"]), CancellationToken::new())
            .await;

        assert_eq!(outcome.items[0].status, ItemStatus::FailedPermanent);
        assert_eq!(outcome.items[0].attempts, 3);
        assert_eq!(outcome.items[0].error, Some(ErrorClass::Transient));
        assert_eq!(adapter.calls("https://v/url1"), 3);
        assert_eq!(outcome.items[1].status, ItemStatus::Succeeded);
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 1);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let urls = ["https://v/0", "https://v/1", "https://v/2", "https://v/3", "https://v/4"];
        let adapter = MockAdapter::new(&[("https://v/2", Behavior::Permanent)]);
        let p = processor(adapter.clone(), settings(1, 3));

        let outcome = p.run(queue(&urls), CancellationToken::new()).await;

        assert_eq!(outcome.items.len(), 5);
        assert_eq!(outcome.succeeded(), 4);
        assert_eq!(outcome.items[2].status, ItemStatus::FailedPermanent);
        assert_eq!(outcome.items[2].error, Some(ErrorClass::Permanent));
        // non-transient failures are never retried
        assert_eq!(outcome.items[2].attempts, 1);
        assert_eq!(adapter.calls("https://v/2"), 1);
    }

    #[tokio::test]
    async fn test_access_refusals_fail_on_first_attempt() {
        let adapter = MockAdapter::new(&[
            (
                "https://v/forbidden",
                Behavior::Stderr("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
            ),
            (
                "https://v/bot",
                Behavior::Stderr("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            ),
        ]);
        let p = processor(adapter.clone(), settings(1, 3));

        let outcome = p
            .run(queue(&["https://v/forbidden", "https://v/bot"]), CancellationToken::new())
            .await;

        for item in &outcome.items {
            assert_eq!(item.status, ItemStatus::FailedPermanent, "{}", item.url);
            assert_eq!(item.attempts, 1, "{}", item.url);
            assert_eq!(item.error, Some(ErrorClass::Permanent), "{}", item.url);
        }
        assert_eq!(adapter.calls("https://v/forbidden"), 1);
        assert_eq!(adapter.calls("https://v/bot"), 1);
    }

    #[test]
    fn test_lost_outcome_message() {
        let mut item = QueueItem::new(4, "https://v/x");
        assert_eq!(
            lost_outcome(&item).message.as_deref(),
            Some("worker stopped before reporting")
        );

        item.status = ItemStatus::InProgress;
        let lost = lost_outcome(&item);
        assert_eq!(lost.index, 4);
        assert_eq!(lost.status, ItemStatus::Skipped);
        assert_eq!(lost.message.as_deref(), Some("worker stopped while downloading"));
    }

    #[tokio::test]
    async fn test_unsatisfiable_not_retried() {
        let adapter = MockAdapter::new(&[("https://v/a", Behavior::AudioOnly)]);
        let p = processor(adapter.clone(), settings(1, 5));

        let outcome = p.run(queue(&["https://v/a"]), CancellationToken::new()).await;

        assert_eq!(outcome.items[0].error, Some(ErrorClass::Unsatisfiable));
        assert_eq!(adapter.calls("https://v/a"), 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let adapter = MockAdapter::new(&[("https://v/a", Behavior::FailTimes(2))]);
        let p = processor(adapter, settings(1, 2));

        let outcome = p.run(queue(&["https://v/a"]), CancellationToken::new()).await;

        let item = &outcome.items[0];
        assert_eq!(item.status, ItemStatus::Succeeded);
        assert_eq!(item.attempts, 3);
        assert_eq!(item.output, Some(PathBuf::from("./downloads/a.mp4")));
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let adapter = MockAdapter::new(&[("https://v/a", Behavior::FailTimes(1))]);
        let p = processor(adapter, settings(1, 0));

        let outcome = p.run(queue(&["https://v/a"]), CancellationToken::new()).await;
        assert_eq!(outcome.items[0].status, ItemStatus::FailedPermanent);
        assert_eq!(outcome.items[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_and_index_attribution() {
        // earlier items take longer, so completion order is reversed
        let urls = ["https://v/0", "https://v/1", "https://v/2", "https://v/3", "https://v/4", "https://v/5"];
        let behaviors: Vec<_> = urls
            .iter()
            .enumerate()
            .map(|(i, u)| (*u, Behavior::Slow(20 * (urls.len() - i) as u64)))
            .collect();
        let adapter = MockAdapter::new(&behaviors);
        let p = processor(adapter.clone(), settings(2, 0));

        let outcome = p.run(queue(&urls), CancellationToken::new()).await;

        assert!(adapter.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(outcome.succeeded(), urls.len());
        for (i, item) in outcome.items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.url, urls[i]);
        }
    }

    #[tokio::test]
    async fn test_sequential_by_default() {
        let urls = ["https://v/0", "https://v/1", "https://v/2"];
        let adapter = MockAdapter::new(&[
            ("https://v/0", Behavior::Slow(10)),
            ("https://v/1", Behavior::Slow(10)),
            ("https://v/2", Behavior::Slow(10)),
        ]);
        let p = processor(adapter.clone(), ProcessorSettings { retry_wait: Duration::ZERO, ..Default::default() });

        p.run(queue(&urls), CancellationToken::new()).await;
        assert_eq!(adapter.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let adapter = MockAdapter::new(&[]);
        let p = processor(adapter.clone(), settings(2, 0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = p.run(queue(&["https://v/a", "https://v/b"]), cancel).await;

        assert_eq!(outcome.skipped(), 2);
        assert!(outcome.items.iter().all(|i| i.error == Some(ErrorClass::Cancelled) && i.attempts == 0));
        assert_eq!(adapter.calls("https://v/a"), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let adapter = MockAdapter::new(&[("https://v/a", Behavior::AlwaysTransient)]);
        let p = processor(
            adapter.clone(),
            ProcessorSettings {
                concurrency_limit: 1,
                retry_count: 5,
                retry_wait: Duration::from_secs(60),
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            p.run(queue(&["https://v/a", "https://v/b"]), cancel),
        )
        .await
        .expect("backoff wait was not interrupted");

        assert_eq!(outcome.items[0].status, ItemStatus::Skipped);
        assert_eq!(outcome.items[0].attempts, 1);
        assert_eq!(outcome.items[1].status, ItemStatus::Skipped);
        assert_eq!(outcome.items[1].attempts, 0);
        assert_eq!(adapter.calls("https://v/b"), 0);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let p = processor(MockAdapter::new(&[]), settings(4, 1));
        let outcome = p.run(Vec::new(), CancellationToken::new()).await;
        assert!(outcome.items.is_empty());
    }

    #[test]
    fn test_settings() {
        let s = ProcessorSettings {
            concurrency_limit: 0,
            retry_count: 1,
            retry_wait: Duration::from_secs(2),
        };
        assert_eq!(s.workers_for(5), 1);
        assert_eq!(ProcessorSettings { concurrency_limit: 8, ..s }.workers_for(3), 3);
        assert_eq!(s.backoff(1), Duration::from_secs(2));
        assert_eq!(s.backoff(3), Duration::from_secs(6));
        assert_eq!(s.backoff(50), Duration::from_secs(20));
    }
}
