//! Resilient registry reader.
//!
//! Enumerates every registration and keeps the latest successful result as
//! an immutable [`RegistrySnapshot`]. Refreshes are single-flight, throttled
//! by a cooldown, and retried with exponential backoff on rate limits and
//! transient failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use prv_ledger::AccountKind;
use prv_types::CreatorId;

use crate::config::ReaderConfig;
use crate::entry::RegistryEntry;
use crate::error::{ClientError, ClientResult};
use crate::retry::BackoffPolicy;
use crate::rpc::RegistryRpc;
use crate::stats::CreatorStats;

/// A consistent view of the registry at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Newest first; equal timestamps ordered by address.
    pub entries: Vec<RegistryEntry>,
    pub stats: Vec<CreatorStats>,
}

impl RegistrySnapshot {
    pub fn from_entries(mut entries: Vec<RegistryEntry>) -> Self {
        entries.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then(a.address.cmp(&b.address))
        });
        let stats = CreatorStats::aggregate(&entries);
        Self { entries, stats }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries registered by `creator`, newest first.
    pub fn by_creator<'a>(&'a self, creator: &'a CreatorId) -> impl Iterator<Item = &'a RegistryEntry> {
        self.entries
            .iter()
            .filter(move |e| e.registration.creator == *creator)
    }

    pub fn creator_stats(&self, creator: &CreatorId) -> Option<&CreatorStats> {
        self.stats.iter().find(|s| s.creator == *creator)
    }
}

/// Where the reader is in its refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    /// `attempt` is 0-based.
    Fetching { attempt: u32 },
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Another refresh is running.
    InFlight,
    /// The previous refresh started less than a cooldown ago.
    Throttled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Skipped(SkipReason),
    Completed { entries: usize, attempts: u32 },
    Failed(ClientError),
}

struct ReaderInner {
    state: ReaderState,
    last_request: Option<Instant>,
    snapshot: Arc<RegistrySnapshot>,
    last_error: Option<ClientError>,
    /// Attempts used by the last failed refresh.
    retry_count: u32,
}

/// Clears the in-flight flag when a refresh ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RegistryReader {
    rpc: Arc<dyn RegistryRpc>,
    cooldown: Duration,
    backoff: BackoffPolicy,
    in_flight: AtomicBool,
    inner: Mutex<ReaderInner>,
}

impl RegistryReader {
    pub fn new(rpc: Arc<dyn RegistryRpc>, config: &ReaderConfig) -> Self {
        Self {
            rpc,
            cooldown: config.cooldown(),
            backoff: config.backoff(),
            in_flight: AtomicBool::new(false),
            inner: Mutex::new(ReaderInner {
                state: ReaderState::Idle,
                last_request: None,
                snapshot: Arc::new(RegistrySnapshot::default()),
                last_error: None,
                retry_count: 0,
            }),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ReaderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-enumerate the registry.
    ///
    /// A `force`d refresh ignores the cooldown but never runs concurrently
    /// with another refresh.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh already in progress, skipping");
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        {
            let mut inner = self.lock();
            let now = Instant::now();
            let throttled = inner
                .last_request
                .is_some_and(|last| now.duration_since(last) < self.cooldown);
            if !force && throttled {
                debug!("refresh throttled");
                return RefreshOutcome::Skipped(SkipReason::Throttled);
            }
            inner.last_request = Some(now);
        }

        let mut attempt = 0;
        loop {
            self.lock().state = ReaderState::Fetching { attempt };
            debug!(attempt = attempt + 1, "fetching registry");

            match self.fetch_entries().await {
                Ok(entries) => {
                    let snapshot = Arc::new(RegistrySnapshot::from_entries(entries));
                    let count = snapshot.len();
                    let mut inner = self.lock();
                    inner.snapshot = snapshot;
                    inner.state = ReaderState::Succeeded;
                    inner.last_error = None;
                    inner.retry_count = 0;
                    info!(entries = count, attempts = attempt + 1, "registry refreshed");
                    return RefreshOutcome::Completed {
                        entries: count,
                        attempts: attempt + 1,
                    };
                }
                Err(error) if self.backoff.should_retry(attempt, &error) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "registry fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(attempts = attempt + 1, error = %error, "registry fetch failed");
                    let mut inner = self.lock();
                    inner.state = ReaderState::Failed;
                    inner.last_error = Some(error.clone());
                    inner.retry_count = attempt;
                    return RefreshOutcome::Failed(error);
                }
            }
        }
    }

    async fn fetch_entries(&self) -> ClientResult<Vec<RegistryEntry>> {
        let accounts = self.rpc.fetch_all(AccountKind::Registration).await?;
        Ok(accounts
            .into_iter()
            .filter_map(|(address, account)| {
                account
                    .into_registration()
                    .map(|r| RegistryEntry::new(address, r))
            })
            .collect())
    }

    /// The latest successful snapshot. Empty before the first success.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.lock().snapshot)
    }

    pub fn state(&self) -> ReaderState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.lock().last_error.clone()
    }

    /// User-facing description of the last failure, if the last refresh failed.
    pub fn error_message(&self) -> Option<String> {
        self.lock().last_error.as_ref().map(ClientError::user_message)
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Entries of one creator from the current snapshot.
    pub fn entries_for(&self, creator: &CreatorId) -> Vec<RegistryEntry> {
        self.snapshot().by_creator(creator).cloned().collect()
    }

    /// Refresh (non-forced) every `every` until the reader is dropped or the
    /// handle is aborted. The first tick fires immediately.
    pub fn spawn_refresher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(reader) = weak.upgrade() else {
                    debug!("registry reader dropped, stopping refresher");
                    break;
                };
                reader.refresh(false).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use prv_crypto::SigningKey;

    use crate::error::RpcError;
    use crate::testing::{client, ledger, ScriptedRpc};

    use super::*;

    fn reader(rpc: Arc<ScriptedRpc>) -> RegistryReader {
        RegistryReader::new(rpc, &ReaderConfig::default())
    }

    async fn seed(n: usize) -> Arc<prv_ledger::InMemoryLedger> {
        let (ledger, clock) = ledger();
        let client = client(&ledger, SigningKey::generate());
        for i in 0..n {
            client
                .register_text(&format!("prompt {i}"), "o")
                .await
                .unwrap();
            clock.advance(10);
        }
        ledger
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_sorts_newest_first() {
        let rpc = Arc::new(ScriptedRpc::new(seed(3).await));
        let reader = reader(rpc);
        assert_eq!(reader.state(), ReaderState::Idle);

        assert_eq!(
            reader.refresh(false).await,
            RefreshOutcome::Completed {
                entries: 3,
                attempts: 1
            }
        );
        let snapshot = reader.snapshot();
        let times: Vec<i64> = snapshot.entries.iter().map(RegistryEntry::timestamp).collect();
        assert_eq!(times, vec![1_700_000_020, 1_700_000_010, 1_700_000_000]);
        assert_eq!(snapshot.stats.len(), 1);
        assert_eq!(snapshot.stats[0].count, 3);
        assert_eq!(reader.state(), ReaderState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried_until_success() {
        let ledger = seed(2).await;
        let expected = {
            let direct = reader(Arc::new(ScriptedRpc::new(ledger.clone())));
            direct.refresh(true).await;
            direct.snapshot()
        };

        let rpc = Arc::new(ScriptedRpc::new(ledger).failing([
            RpcError::RateLimited("429 Too Many Requests".into()),
            RpcError::Transport("HTTP 429".into()),
        ]));
        let reader = reader(rpc.clone());

        assert_eq!(
            reader.refresh(false).await,
            RefreshOutcome::Completed {
                entries: 2,
                attempts: 3
            }
        );
        assert_eq!(rpc.calls(), 3);
        assert_eq!(reader.snapshot(), expected);
        assert_eq!(reader.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let rpc = Arc::new(
            ScriptedRpc::new(seed(1).await)
                .failing([RpcError::Transport("reset".into()), RpcError::Transport("reset".into())]),
        );
        let reader = reader(rpc).with_backoff(BackoffPolicy {
            jitter: Duration::ZERO,
            ..BackoffPolicy::default()
        });

        let started = Instant::now();
        reader.refresh(false).await;
        // 1s after the first failure, 2s after the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3_010));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_previous_snapshot() {
        let rpc = Arc::new(ScriptedRpc::new(seed(1).await));
        let reader = reader(rpc.clone());
        reader.refresh(false).await;
        let before = reader.snapshot();

        rpc.fail_next((0..4).map(|_| RpcError::RateLimited("429".into())));
        let outcome = reader.refresh(true).await;
        assert_eq!(outcome, RefreshOutcome::Failed(ClientError::RateLimited("429".into())));
        assert_eq!(rpc.calls(), 5);
        assert_eq!(reader.snapshot(), before);
        assert_eq!(reader.state(), ReaderState::Failed);
        assert_eq!(reader.retry_count(), 3);
        assert_eq!(
            reader.error_message().unwrap(),
            "Rate limit exceeded. Please wait a moment and try again."
        );

        // The next request starts a fresh attempt sequence.
        assert!(matches!(
            reader.refresh(true).await,
            RefreshOutcome::Completed { attempts: 1, .. }
        ));
        assert_eq!(reader.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_are_not_retried() {
        let rpc = Arc::new(
            ScriptedRpc::new(seed(1).await).failing([RpcError::Ledger(
                prv_ledger::LedgerError::InvalidSignature,
            )]),
        );
        let reader = reader(rpc.clone());

        assert!(matches!(
            reader.refresh(false).await,
            RefreshOutcome::Failed(ClientError::InvalidTransaction(_))
        ));
        assert_eq!(rpc.calls(), 1);
        assert!(reader
            .error_message()
            .unwrap()
            .starts_with("The ledger rejected the transaction"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refresh_is_skipped() {
        let rpc = Arc::new(ScriptedRpc::new(seed(1).await).gated());
        let reader = Arc::new(reader(rpc.clone()));

        let first = tokio::spawn({
            let reader = reader.clone();
            async move { reader.refresh(true).await }
        });
        rpc.started.notified().await;
        assert!(reader.is_in_flight());

        assert_eq!(
            reader.refresh(true).await,
            RefreshOutcome::Skipped(SkipReason::InFlight)
        );
        assert_eq!(reader.state(), ReaderState::Fetching { attempt: 0 });

        rpc.open_gate();
        assert!(matches!(
            first.await.unwrap(),
            RefreshOutcome::Completed { entries: 1, .. }
        ));
        assert_eq!(rpc.calls(), 1);
        assert!(!reader.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_throttles_unforced_refreshes() {
        let rpc = Arc::new(ScriptedRpc::new(seed(1).await));
        let reader = reader(rpc.clone());

        reader.refresh(false).await;
        assert_eq!(
            reader.refresh(false).await,
            RefreshOutcome::Skipped(SkipReason::Throttled)
        );
        assert!(matches!(
            reader.refresh(true).await,
            RefreshOutcome::Completed { .. }
        ));

        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert!(matches!(
            reader.refresh(false).await,
            RefreshOutcome::Completed { .. }
        ));
        assert_eq!(rpc.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn creator_filter_uses_snapshot() {
        let ledger = seed(2).await;
        let other = SigningKey::generate();
        let other_id = other.creator_id();
        client(&ledger, other).register_text("mine", "o").await.unwrap();

        let reader = reader(Arc::new(ScriptedRpc::new(ledger)));
        reader.refresh(false).await;

        let mine = reader.entries_for(&other_id);
        assert_eq!(mine.len(), 1);
        assert_eq!(reader.snapshot().creator_stats(&other_id).unwrap().count, 1);
        assert_eq!(reader.snapshot().stats.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn background_refresher_picks_up_new_entries() {
        let (ledger, _) = ledger();
        let client = client(&ledger, SigningKey::generate());
        let reader = Arc::new(reader(Arc::new(ScriptedRpc::new(ledger.clone()))));

        let handle = reader.spawn_refresher(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(reader.snapshot().is_empty());

        client.register_text("p", "o").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reader.snapshot().len(), 1);

        handle.abort();
    }
}
