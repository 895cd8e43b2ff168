//! One generic driver task per polled endpoint.
//!
//! A driver owns a [`StreamSource`] (how to fetch, how to fold batches into
//! accumulated data) and a set of control channels ([`StreamWiring`]). It
//! publishes [`StreamState`] snapshots through a watch channel after every
//! transition; consumers hold a [`StreamHandle`].
//!
//! Fetches run as spawned tasks tagged with a per-driver sequence number.
//! Only the outcome of the most recently issued request is ever applied;
//! anything older is dropped on arrival. A scheduled tick that fires while
//! a request is still outstanding is skipped, so requests never pile up.
//! A manual reload instead supersedes the outstanding request: it issues a
//! fresh sequence number and the stale response is discarded when it lands.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use watchpost_api::ApiError;

use crate::options::PollInterval;
use crate::visibility::Visibility;

/// Snapshot of one stream, published after every transition.
#[derive(Debug, Clone, Default)]
pub struct StreamState<T> {
    /// Accumulated data. Survives failed fetches untouched.
    pub data: T,
    /// True while the newest request is outstanding.
    pub loading: bool,
    /// Error from the most recent completed fetch, cleared on success.
    pub error: Option<ApiError>,
    /// Wall-clock epoch milliseconds of the last successful apply;
    /// zero before the first.
    pub last_updated_ms: u64,
}

/// Consumer end of a driver: snapshot access, change notification, and a
/// manual reload trigger.
#[derive(Debug, Clone)]
pub struct StreamHandle<T> {
    state: watch::Receiver<StreamState<T>>,
    reload: mpsc::UnboundedSender<()>,
}

impl<T: Clone> StreamHandle<T> {
    pub fn snapshot(&self) -> StreamState<T> {
        self.state.borrow().clone()
    }

    /// Wait until the driver publishes a new snapshot. Returns `false` once
    /// the driver has stopped and no further snapshots can arrive.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Fetch now, regardless of cadence or an outstanding request. The
    /// superseded request's response, if any, is discarded. Ignored while
    /// the stream is inactive.
    pub fn reload(&self) {
        let _ = self.reload.send(());
    }
}

/// Result of one spawned fetch, tagged with the sequence number it was
/// issued under.
#[derive(Debug)]
pub struct FetchOutcome<B> {
    pub seq: u64,
    pub result: Result<B, ApiError>,
}

/// What the driver should do after folding a successful batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterApply {
    /// Keep polling on the current cadence.
    Continue,
    /// The stream is complete (e.g. a one-shot record landed); stop the
    /// driver. The final snapshot stays readable through the handle.
    Finished,
}

/// What the driver should do after a config change reached the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterReconfigure {
    /// Nothing until the next scheduled tick.
    Keep,
    /// Fetch again now, keeping accumulated data (replace-latest streams).
    Refetch,
    /// Clear accumulated data and fetch again from the new start.
    Reset,
}

/// One pollable endpoint: issues fetches and folds their results.
///
/// Implementations hold whatever they need to fetch (API handle, entity id,
/// cursor). `begin_fetch` must not block: it spawns the request and returns;
/// the driver correlates the outcome by sequence number.
pub trait StreamSource: Send + 'static {
    /// Accumulated client-side value published to consumers.
    type Data: Clone + Default + Send + Sync + 'static;
    /// One server response.
    type Batch: Send + 'static;
    /// Runtime-adjustable parameters for this stream.
    type Config: Clone + PartialEq + Send + Sync + 'static;

    /// Spawn the fetch for one tick, reporting through `results` under `seq`.
    fn begin_fetch(&mut self, seq: u64, results: &mpsc::UnboundedSender<FetchOutcome<Self::Batch>>);

    /// Fold a successful batch into the accumulated data.
    fn apply(&mut self, data: &mut Self::Data, batch: Self::Batch) -> AfterApply;

    /// Absorb a config change (e.g. rewind a cursor to a new window start).
    fn reconfigure(&mut self, config: &Self::Config) -> AfterReconfigure;
}

/// Control channels for one driver.
///
/// Senders live with whoever steers the stream (the session coordinator, a
/// roster owner). A dropped control sender stops the driver, same as an
/// explicit shutdown.
pub struct StreamWiring<C> {
    /// Poll cadence; `Off` disarms the timer without touching data.
    pub cadence: watch::Receiver<PollInterval>,
    /// Stream-specific runtime config.
    pub config: watch::Receiver<C>,
    /// Gate for streams that only run in part of the entity lifecycle.
    /// While false, no timer exists and reloads are ignored; flipping
    /// true arms the timer with an immediate first tick.
    pub active: watch::Receiver<bool>,
    /// Scheduled ticks observed while hidden are swallowed, not queued.
    pub visibility: Visibility,
    /// Cooperative stop signal.
    pub shutdown: watch::Receiver<bool>,
}

/// Start a driver task. The handle is cheap to clone; the join handle lets
/// owners await teardown.
pub fn spawn_stream<S: StreamSource>(
    name: &'static str,
    source: S,
    wiring: StreamWiring<S::Config>,
) -> (StreamHandle<S::Data>, JoinHandle<()>) {
    let (state_tx, state_rx) = watch::channel(StreamState::default());
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();
    let handle = StreamHandle {
        state: state_rx,
        reload: reload_tx,
    };
    let task = tokio::spawn(run_stream(name, source, wiring, state_tx, reload_rx));
    (handle, task)
}

async fn run_stream<S: StreamSource>(
    name: &'static str,
    mut source: S,
    mut wiring: StreamWiring<S::Config>,
    state_tx: watch::Sender<StreamState<S::Data>>,
    mut reload_rx: mpsc::UnboundedReceiver<()>,
) {
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<FetchOutcome<S::Batch>>();
    // Last issued sequence number; anything older is stale on arrival.
    let mut seq: u64 = 0;
    let mut in_flight = false;
    let mut config = wiring.config.borrow().clone();
    let mut timer = build_timer(*wiring.cadence.borrow(), *wiring.active.borrow());

    loop {
        tokio::select! {
            _ = next_tick(&mut timer) => {
                if !wiring.visibility.is_visible() {
                    trace!("{name}: tick suppressed while hidden");
                } else if in_flight {
                    trace!("{name}: tick skipped, request {seq} still outstanding");
                } else {
                    start_fetch(
                        name,
                        &mut source,
                        &mut seq,
                        &mut in_flight,
                        &results_tx,
                        &state_tx,
                    );
                }
            }
            Some(outcome) = results_rx.recv() => {
                if outcome.seq != seq {
                    trace!("{name}: dropping stale result (seq {}, latest {seq})", outcome.seq);
                    continue;
                }
                in_flight = false;
                match outcome.result {
                    Ok(batch) => {
                        let mut next = state_tx.borrow().clone();
                        next.loading = false;
                        next.error = None;
                        next.last_updated_ms = epoch_ms_now();
                        let after = source.apply(&mut next.data, batch);
                        state_tx.send_replace(next);
                        if after == AfterApply::Finished {
                            debug!("{name}: stream finished");
                            break;
                        }
                    }
                    Err(err) => {
                        if err.is_transient() {
                            warn!("{name}: fetch failed: {err}");
                        } else {
                            error!("{name}: fetch failed, retrying cannot help: {err}");
                        }
                        let mut next = state_tx.borrow().clone();
                        next.loading = false;
                        next.error = Some(err);
                        state_tx.send_replace(next);
                    }
                }
            }
            Some(()) = reload_rx.recv() => {
                if !*wiring.active.borrow() {
                    trace!("{name}: reload ignored while inactive");
                } else {
                    debug!("{name}: manual reload");
                    start_fetch(
                        name,
                        &mut source,
                        &mut seq,
                        &mut in_flight,
                        &results_tx,
                        &state_tx,
                    );
                }
            }
            res = wiring.cadence.changed() => {
                if res.is_err() {
                    break;
                }
                let cadence = *wiring.cadence.borrow();
                debug!("{name}: cadence set to {cadence}");
                timer = build_timer(cadence, *wiring.active.borrow());
            }
            res = wiring.active.changed() => {
                if res.is_err() {
                    break;
                }
                timer = build_timer(*wiring.cadence.borrow(), *wiring.active.borrow());
            }
            res = wiring.config.changed() => {
                if res.is_err() {
                    break;
                }
                let next_config = wiring.config.borrow().clone();
                if next_config != config {
                    config = next_config;
                    let after = source.reconfigure(&config);
                    if after == AfterReconfigure::Reset {
                        debug!("{name}: config reset, clearing accumulated data");
                        state_tx.send_replace(StreamState::default());
                    }
                    if after != AfterReconfigure::Keep {
                        start_fetch(
                            name,
                            &mut source,
                            &mut seq,
                            &mut in_flight,
                            &results_tx,
                            &state_tx,
                        );
                    }
                }
            }
            res = wiring.shutdown.changed() => {
                if res.is_err() || *wiring.shutdown.borrow() {
                    debug!("{name}: shutting down");
                    break;
                }
            }
        }
    }
    // Any fetch still in flight reports into a channel nobody reads once
    // this task returns; its outcome is never applied.
}

fn start_fetch<S: StreamSource>(
    name: &'static str,
    source: &mut S,
    seq: &mut u64,
    in_flight: &mut bool,
    results_tx: &mpsc::UnboundedSender<FetchOutcome<S::Batch>>,
    state_tx: &watch::Sender<StreamState<S::Data>>,
) {
    *seq += 1;
    *in_flight = true;
    source.begin_fetch(*seq, results_tx);
    trace!("{name}: fetch {seq} issued", seq = *seq);
    let mut next = state_tx.borrow().clone();
    if !next.loading {
        next.loading = true;
        state_tx.send_replace(next);
    }
}

fn build_timer(cadence: PollInterval, active: bool) -> Option<Interval> {
    if !active {
        return None;
    }
    let period = cadence.duration()?;
    // First tick fires immediately, giving the contract's "one immediate
    // invocation" on every (re)arm. Delay keeps slow fetches from causing
    // tick bursts afterwards.
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub(crate) fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
