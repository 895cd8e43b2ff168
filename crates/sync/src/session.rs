//! Per-entity façade: four wired streams plus the lifecycle coordinator.
//!
//! [`EntitySession::spawn`] starts stream drivers for one monitored process:
//!
//! - `introduction`: fetched once at startup, manual reload only;
//! - `telemetry`: liveness status and resource metrics, fetched jointly on
//!   the session cadence (one failure flag for the pair), metrics
//!   cursor-accumulated;
//! - `messages`: output lines on the session cadence, cursor-accumulated
//!   from the configured window start;
//! - `exit record`: idle until liveness turns terminal, then fetched until
//!   the first success and never again.
//!
//! The coordinator applies the lifecycle rules: a terminal entity stops all
//! live polling while the exit record is collected; an entity whose
//! telemetry AND messages streams are failing together is declared
//! unreachable and, after [`UNREACHABLE_GRACE`], dismissed: every driver
//! stops and no further requests are issued. Observing a different entity
//! means tearing this session down and spawning a fresh one; a torn-down
//! session's in-flight results are never applied.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use watchpost_api::{
    EntityApi, EntityId, ExitRecord, Introduction, LivenessStatus, MessageRecord, MetricSample,
};

use crate::cursor::CursorAccumulator;
use crate::options::{MessageWindow, PollInterval};
use crate::stream::{
    epoch_ms_now, spawn_stream, AfterApply, AfterReconfigure, FetchOutcome, StreamHandle,
    StreamSource, StreamWiring,
};
use crate::visibility::Visibility;

/// How long both live streams may fail together before the entity is
/// dismissed.
pub const UNREACHABLE_GRACE: Duration = Duration::from_secs(3);

/// Combined liveness and resource history for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    /// Latest polled liveness; `None` until the first fetch lands.
    pub status: Option<LivenessStatus>,
    /// Append-only sample timeline, ascending by time.
    pub metrics: Vec<MetricSample>,
}

/// Lifecycle notifications surfaced to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Telemetry and messages are both failing; dismissal is pending unless
    /// one of them recovers within [`UNREACHABLE_GRACE`].
    Unreachable,
    /// The grace period expired. All polling for this entity has stopped;
    /// the embedder should navigate away.
    Dismissed,
}

/// Initial settings for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub interval: PollInterval,
    pub window: MessageWindow,
    pub visibility: Visibility,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            interval: PollInterval::default(),
            window: MessageWindow::default(),
            visibility: Visibility::always(),
        }
    }
}

/// Live view of one monitored process.
///
/// Dropping the session signals every driver to stop; [`shutdown`] does the
/// same and also awaits the tasks. Stream handles obtained from the
/// accessors keep working after either, serving the final snapshots.
///
/// [`shutdown`]: EntitySession::shutdown
pub struct EntitySession {
    id: EntityId,
    introduction: StreamHandle<Option<Introduction>>,
    telemetry: StreamHandle<Telemetry>,
    messages: StreamHandle<Vec<MessageRecord>>,
    exit: StreamHandle<Option<ExitRecord>>,
    interval_tx: watch::Sender<PollInterval>,
    window_tx: watch::Sender<MessageWindow>,
    shutdown_tx: watch::Sender<bool>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl EntitySession {
    /// Start polling `id`. Must be called from within a tokio runtime.
    pub fn spawn<A>(api: A, id: EntityId, options: SessionOptions) -> Self
    where
        A: EntityApi + Clone + Send + Sync + 'static,
    {
        let SessionOptions {
            interval,
            window,
            visibility,
        } = options;

        // User-facing controls.
        let (interval_tx, interval_rx) = watch::channel(interval);
        let (window_tx, window_rx) = watch::channel(window);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Derived by the coordinator: live cadence (forced Off once the
        // entity exits) and the exit driver's activation gate.
        let (effective_tx, effective_rx) = watch::channel(interval);
        let (exit_active_tx, exit_active_rx) = watch::channel(false);
        // Constant controls, kept alive by the coordinator.
        let (intro_cadence_tx, intro_cadence_rx) = watch::channel(PollInterval::Off);
        let (always_active_tx, always_active_rx) = watch::channel(true);
        let (unit_config_tx, unit_config_rx) = watch::channel(());
        // Driver stop signal, owned by the coordinator.
        let (stop_tx, stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let (introduction, intro_task) = spawn_stream(
            "introduction",
            IntroductionSource {
                api: api.clone(),
                id: id.clone(),
            },
            StreamWiring {
                cadence: intro_cadence_rx,
                config: unit_config_rx.clone(),
                active: always_active_rx.clone(),
                visibility: visibility.clone(),
                shutdown: stop_rx.clone(),
            },
        );
        let (telemetry, telemetry_task) = spawn_stream(
            "telemetry",
            TelemetrySource {
                api: api.clone(),
                id: id.clone(),
                cursor: CursorAccumulator::new(0),
            },
            StreamWiring {
                cadence: effective_rx.clone(),
                config: unit_config_rx.clone(),
                active: always_active_rx.clone(),
                visibility: visibility.clone(),
                shutdown: stop_rx.clone(),
            },
        );
        let (messages, messages_task) = spawn_stream(
            "messages",
            MessagesSource {
                api: api.clone(),
                id: id.clone(),
                cursor: CursorAccumulator::new(window.start_from(epoch_ms_now())),
            },
            StreamWiring {
                cadence: effective_rx,
                config: window_rx,
                active: always_active_rx,
                visibility: visibility.clone(),
                shutdown: stop_rx.clone(),
            },
        );
        let (exit, exit_task) = spawn_stream(
            "exit-record",
            ExitSource {
                api,
                id: id.clone(),
            },
            StreamWiring {
                // The exit driver follows the user cadence directly; the
                // coordinator's forced-Off applies to live streams only.
                cadence: interval_rx.clone(),
                config: unit_config_rx,
                active: exit_active_rx,
                visibility,
                shutdown: stop_rx,
            },
        );

        // The introduction is a one-shot: cadence stays Off, this single
        // trigger fetches it.
        introduction.reload();

        let coordinator = Coordinator {
            id: id.clone(),
            user_interval: interval_rx,
            effective_tx,
            exit_active_tx,
            telemetry: telemetry.clone(),
            messages: messages.clone(),
            events_tx,
            user_shutdown: shutdown_rx,
            stop_tx,
            _held: (intro_cadence_tx, always_active_tx, unit_config_tx),
        };
        let coordinator_task = tokio::spawn(coordinator.run());

        debug!("session for entity {id} started");

        Self {
            id,
            introduction,
            telemetry,
            messages,
            exit,
            interval_tx,
            window_tx,
            shutdown_tx,
            events_rx,
            tasks: vec![
                intro_task,
                telemetry_task,
                messages_task,
                exit_task,
                coordinator_task,
            ],
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn introduction(&self) -> StreamHandle<Option<Introduction>> {
        self.introduction.clone()
    }

    pub fn telemetry(&self) -> StreamHandle<Telemetry> {
        self.telemetry.clone()
    }

    pub fn messages(&self) -> StreamHandle<Vec<MessageRecord>> {
        self.messages.clone()
    }

    pub fn exit_record(&self) -> StreamHandle<Option<ExitRecord>> {
        self.exit.clone()
    }

    /// Change the poll cadence. A nonzero cadence re-arms the timers with
    /// an immediate tick; `Off` stops them without touching data.
    pub fn set_interval(&self, interval: PollInterval) {
        let _ = self.interval_tx.send(interval);
    }

    /// Change the message window. Clears the message buffer and refetches
    /// from the new start.
    pub fn set_window(&self, window: MessageWindow) {
        let _ = self.window_tx.send(window);
    }

    /// Next lifecycle event; `None` once the session has fully stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Non-blocking variant of [`next_event`](EntitySession::next_event).
    pub fn try_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Stop every driver and wait for the tasks to finish. In-flight
    /// requests are abandoned; their results are never applied.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for EntitySession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

struct Coordinator {
    id: EntityId,
    user_interval: watch::Receiver<PollInterval>,
    effective_tx: watch::Sender<PollInterval>,
    exit_active_tx: watch::Sender<bool>,
    telemetry: StreamHandle<Telemetry>,
    messages: StreamHandle<Vec<MessageRecord>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    user_shutdown: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
    // Senders for controls that never change; dropping them would stop the
    // drivers early.
    _held: (
        watch::Sender<PollInterval>,
        watch::Sender<bool>,
        watch::Sender<()>,
    ),
}

impl Coordinator {
    async fn run(mut self) {
        let mut exited = false;
        let mut telemetry_failing = false;
        let mut messages_failing = false;
        let mut grace_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                res = self.user_interval.changed() => {
                    if res.is_err() {
                        break;
                    }
                    let user = *self.user_interval.borrow();
                    let _ = self.effective_tx.send(effective_interval(user, exited));
                }
                alive = self.telemetry.changed() => {
                    if !alive {
                        break;
                    }
                    let snap = self.telemetry.snapshot();
                    telemetry_failing = snap.error.is_some();
                    if let Some(status) = snap.data.status {
                        if status.exited != exited {
                            exited = status.exited;
                            let user = *self.user_interval.borrow();
                            let _ = self.effective_tx.send(effective_interval(user, exited));
                            let _ = self.exit_active_tx.send(exited);
                            if exited {
                                info!("entity {}: exited, live polling stopped", self.id);
                            } else {
                                info!("entity {}: running again, live polling resumed", self.id);
                            }
                        }
                    }
                }
                alive = self.messages.changed() => {
                    if !alive {
                        break;
                    }
                    messages_failing = self.messages.snapshot().error.is_some();
                }
                _ = grace_expiry(&grace_deadline) => {
                    warn!("entity {}: still unreachable after grace, dismissing", self.id);
                    let _ = self.events_tx.send(SessionEvent::Dismissed);
                    break;
                }
                res = self.user_shutdown.changed() => {
                    if res.is_err() || *self.user_shutdown.borrow() {
                        break;
                    }
                }
            }

            let both_failing = telemetry_failing && messages_failing;
            if both_failing && grace_deadline.is_none() {
                warn!(
                    "entity {}: telemetry and messages both failing, marking unreachable",
                    self.id
                );
                let _ = self.events_tx.send(SessionEvent::Unreachable);
                grace_deadline = Some(Instant::now() + UNREACHABLE_GRACE);
            } else if !both_failing && grace_deadline.is_some() {
                debug!("entity {}: stream recovered, dismissal cancelled", self.id);
                grace_deadline = None;
            }
        }

        // Covers dismissal, explicit shutdown, and drop of the owning
        // session alike.
        let _ = self.stop_tx.send(true);
    }
}

fn effective_interval(user: PollInterval, exited: bool) -> PollInterval {
    if exited {
        PollInterval::Off
    } else {
        user
    }
}

async fn grace_expiry(deadline: &Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(*at).await,
        None => std::future::pending().await,
    }
}

// ─── Stream sources ──────────────────────────────────────────────────────────

struct IntroductionSource<A> {
    api: A,
    id: EntityId,
}

impl<A> StreamSource for IntroductionSource<A>
where
    A: EntityApi + Clone + Send + Sync + 'static,
{
    type Data = Option<Introduction>;
    type Batch = Introduction;
    type Config = ();

    fn begin_fetch(
        &mut self,
        seq: u64,
        results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>,
    ) {
        let api = self.api.clone();
        let id = self.id.clone();
        let results = results.clone();
        tokio::spawn(async move {
            let result = api.introduction(&id).await;
            let _ = results.send(FetchOutcome { seq, result });
        });
    }

    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply {
        *data = Some(batch);
        AfterApply::Continue
    }

    fn reconfigure(&mut self, _config: &Self::Config) -> AfterReconfigure {
        AfterReconfigure::Keep
    }
}

struct TelemetrySource<A> {
    api: A,
    id: EntityId,
    cursor: CursorAccumulator,
}

impl<A> StreamSource for TelemetrySource<A>
where
    A: EntityApi + Clone + Send + Sync + 'static,
{
    type Data = Telemetry;
    type Batch = (LivenessStatus, Vec<MetricSample>);
    type Config = ();

    fn begin_fetch(
        &mut self,
        seq: u64,
        results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>,
    ) {
        let api = self.api.clone();
        let id = self.id.clone();
        let start = self.cursor.position();
        let results = results.clone();
        tokio::spawn(async move {
            let result = tokio::try_join!(api.status(&id), api.metrics(&id, start));
            let _ = results.send(FetchOutcome { seq, result });
        });
    }

    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply {
        let (status, samples) = batch;
        data.status = Some(status);
        self.cursor.advance(&samples);
        data.metrics.extend(samples);
        AfterApply::Continue
    }

    fn reconfigure(&mut self, _config: &Self::Config) -> AfterReconfigure {
        AfterReconfigure::Keep
    }
}

struct MessagesSource<A> {
    api: A,
    id: EntityId,
    cursor: CursorAccumulator,
}

impl<A> StreamSource for MessagesSource<A>
where
    A: EntityApi + Clone + Send + Sync + 'static,
{
    type Data = Vec<MessageRecord>;
    type Batch = Vec<MessageRecord>;
    type Config = MessageWindow;

    fn begin_fetch(
        &mut self,
        seq: u64,
        results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>,
    ) {
        let api = self.api.clone();
        let id = self.id.clone();
        let start = self.cursor.position();
        let results = results.clone();
        tokio::spawn(async move {
            let result = api.messages(&id, start, None).await;
            let _ = results.send(FetchOutcome { seq, result });
        });
    }

    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply {
        self.cursor.advance(&batch);
        data.extend(batch);
        AfterApply::Continue
    }

    fn reconfigure(&mut self, window: &Self::Config) -> AfterReconfigure {
        self.cursor.reset(window.start_from(epoch_ms_now()));
        AfterReconfigure::Reset
    }
}

struct ExitSource<A> {
    api: A,
    id: EntityId,
}

impl<A> StreamSource for ExitSource<A>
where
    A: EntityApi + Clone + Send + Sync + 'static,
{
    type Data = Option<ExitRecord>;
    type Batch = ExitRecord;
    type Config = ();

    fn begin_fetch(
        &mut self,
        seq: u64,
        results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>,
    ) {
        let api = self.api.clone();
        let id = self.id.clone();
        let results = results.clone();
        tokio::spawn(async move {
            let result = api.exit_record(&id).await;
            let _ = results.send(FetchOutcome { seq, result });
        });
    }

    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply {
        *data = Some(batch);
        AfterApply::Finished
    }

    fn reconfigure(&mut self, _config: &Self::Config) -> AfterReconfigure {
        AfterReconfigure::Keep
    }
}
