//! Periodic refresh of the entity roster.
//!
//! One stream driver polling the entity listing. Unlike the per-entity
//! streams the roster is replace-latest: each fetch supersedes the previous
//! list wholesale, there is no cursor. Toggling the inactive filter
//! refetches immediately with the new flag; the old list stays on screen
//! until the replacement lands.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use watchpost_api::{EntityApi, EntityId};

use crate::options::PollInterval;
use crate::stream::{
    spawn_stream, AfterApply, AfterReconfigure, FetchOutcome, StreamHandle, StreamSource,
    StreamState, StreamWiring,
};
use crate::visibility::Visibility;

/// Initial settings for a roster watch.
#[derive(Debug, Clone)]
pub struct RosterOptions {
    pub interval: PollInterval,
    /// Include entities that have already exited.
    pub include_inactive: bool,
    pub visibility: Visibility,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            interval: PollInterval::default(),
            include_inactive: false,
            visibility: Visibility::always(),
        }
    }
}

/// Handle to the roster driver.
///
/// Dropping it signals the driver to stop; [`shutdown`](RosterWatch::shutdown)
/// does the same and also awaits the task.
pub struct RosterWatch {
    handle: StreamHandle<Vec<EntityId>>,
    interval_tx: watch::Sender<PollInterval>,
    inactive_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    // Keeps the constant activation control alive for the driver's lifetime.
    _active_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RosterWatch {
    /// Start polling the roster. Must be called from within a tokio runtime.
    pub fn spawn<A>(api: A, options: RosterOptions) -> Self
    where
        A: EntityApi + Clone + Send + Sync + 'static,
    {
        let RosterOptions {
            interval,
            include_inactive,
            visibility,
        } = options;

        let (interval_tx, interval_rx) = watch::channel(interval);
        let (inactive_tx, inactive_rx) = watch::channel(include_inactive);
        let (active_tx, active_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (handle, task) = spawn_stream(
            "roster",
            RosterSource {
                api,
                include_inactive,
            },
            StreamWiring {
                cadence: interval_rx,
                config: inactive_rx,
                active: active_rx,
                visibility,
                shutdown: shutdown_rx,
            },
        );

        Self {
            handle,
            interval_tx,
            inactive_tx,
            shutdown_tx,
            _active_tx: active_tx,
            task: Some(task),
        }
    }

    /// Clone of the underlying stream handle, for watching from elsewhere.
    pub fn handle(&self) -> StreamHandle<Vec<EntityId>> {
        self.handle.clone()
    }

    /// Current roster snapshot.
    pub fn snapshot(&self) -> StreamState<Vec<EntityId>> {
        self.handle.snapshot()
    }

    pub fn set_interval(&self, interval: PollInterval) {
        let _ = self.interval_tx.send(interval);
    }

    /// Toggle whether exited entities are listed. Triggers an immediate
    /// refetch with the new flag.
    pub fn set_include_inactive(&self, include_inactive: bool) {
        let _ = self.inactive_tx.send(include_inactive);
    }

    /// Out-of-band refresh, independent of the cadence.
    pub fn reload(&self) {
        self.handle.reload();
    }

    /// Stop the driver and wait for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RosterWatch {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct RosterSource<A> {
    api: A,
    include_inactive: bool,
}

impl<A> StreamSource for RosterSource<A>
where
    A: EntityApi + Clone + Send + Sync + 'static,
{
    type Data = Vec<EntityId>;
    type Batch = Vec<EntityId>;
    type Config = bool;

    fn begin_fetch(
        &mut self,
        seq: u64,
        results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>,
    ) {
        let api = self.api.clone();
        let include_inactive = self.include_inactive;
        let results = results.clone();
        tokio::spawn(async move {
            let result = api.entities(include_inactive).await;
            let _ = results.send(FetchOutcome { seq, result });
        });
    }

    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply {
        *data = batch;
        AfterApply::Continue
    }

    fn reconfigure(&mut self, include_inactive: &Self::Config) -> AfterReconfigure {
        self.include_inactive = *include_inactive;
        AfterReconfigure::Refetch
    }
}
