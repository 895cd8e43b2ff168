//! Scripted in-memory [`EntityApi`] for driving the sync stack in tests.
//!
//! Every call is recorded, so tests can assert how often each endpoint was
//! hit and with which cursor positions. Batches are consumed front to back;
//! an exhausted queue yields empty batches, matching a server with no new
//! rows. An optional delay makes requests take virtual time under the
//! paused test clock.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use watchpost_api::{
    ApiError, EntityApi, EntityId, ExitRecord, Introduction, LivenessStatus, MessageRecord,
    MetricSample,
};
use watchpost_sync::{StreamHandle, StreamState};

/// One recorded request, with the parameters that matter to the tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Introduction,
    Status,
    Metrics { start: u64 },
    Messages { start: u64 },
    Exit,
    Entities { include_inactive: bool },
}

#[derive(Default)]
struct FakeState {
    introduction: Option<Introduction>,
    exited: bool,
    status_failing: bool,
    messages_failing: bool,
    metric_batches: VecDeque<Vec<MetricSample>>,
    message_batches: VecDeque<Vec<MessageRecord>>,
    exit_record: Option<ExitRecord>,
    exit_failures_left: u32,
    roster: Vec<EntityId>,
    delay: Option<Duration>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake api mutex poisoned")
    }

    pub fn set_introduction(&self, introduction: Introduction) {
        self.state().introduction = Some(introduction);
    }

    pub fn set_exited(&self, exited: bool) {
        self.state().exited = exited;
    }

    pub fn set_status_failing(&self, failing: bool) {
        self.state().status_failing = failing;
    }

    pub fn set_messages_failing(&self, failing: bool) {
        self.state().messages_failing = failing;
    }

    pub fn push_metrics(&self, batch: Vec<MetricSample>) {
        self.state().metric_batches.push_back(batch);
    }

    pub fn push_messages(&self, batch: Vec<MessageRecord>) {
        self.state().message_batches.push_back(batch);
    }

    pub fn set_exit_record(&self, record: ExitRecord) {
        self.state().exit_record = Some(record);
    }

    /// Make the next `n` exit-record fetches fail before the record is served.
    pub fn fail_exit_fetches(&self, n: u32) {
        self.state().exit_failures_left = n;
    }

    pub fn set_roster(&self, roster: Vec<EntityId>) {
        self.state().roster = roster;
    }

    /// Delay applied to every request issued from now on.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// Cursor positions of the message fetches, in request order.
    pub fn message_starts(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Messages { start } => Some(start),
                _ => None,
            })
            .collect()
    }

    pub fn count_messages(&self) -> usize {
        self.message_starts().len()
    }

    pub fn count_status(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Status).count()
    }

    pub fn count_exit(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Exit).count()
    }

    fn on_introduction(&self) -> (Option<Duration>, Result<Introduction, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Introduction);
        let result = st.introduction.clone().ok_or(ApiError::NotFound);
        (st.delay, result)
    }

    fn on_status(&self) -> (Option<Duration>, Result<LivenessStatus, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Status);
        let result = if st.status_failing {
            Err(ApiError::Network("status endpoint down".to_string()))
        } else {
            Ok(LivenessStatus { exited: st.exited })
        };
        (st.delay, result)
    }

    fn on_metrics(&self, start: u64) -> (Option<Duration>, Result<Vec<MetricSample>, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Metrics { start });
        let batch = st.metric_batches.pop_front().unwrap_or_default();
        (st.delay, Ok(batch))
    }

    fn on_messages(&self, start: u64) -> (Option<Duration>, Result<Vec<MessageRecord>, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Messages { start });
        let result = if st.messages_failing {
            Err(ApiError::Network("messages endpoint down".to_string()))
        } else {
            Ok(st.message_batches.pop_front().unwrap_or_default())
        };
        (st.delay, result)
    }

    fn on_exit(&self) -> (Option<Duration>, Result<ExitRecord, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Exit);
        let result = if st.exit_failures_left > 0 {
            st.exit_failures_left -= 1;
            Err(ApiError::Network("exit endpoint down".to_string()))
        } else {
            st.exit_record.clone().ok_or(ApiError::NotFound)
        };
        (st.delay, result)
    }

    fn on_entities(
        &self,
        include_inactive: bool,
    ) -> (Option<Duration>, Result<Vec<EntityId>, ApiError>) {
        let mut st = self.state();
        st.calls.push(Call::Entities { include_inactive });
        let result = Ok(st.roster.clone());
        (st.delay, result)
    }
}

async fn finish<T>(delay: Option<Duration>, result: Result<T, ApiError>) -> Result<T, ApiError> {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    result
}

impl EntityApi for FakeApi {
    async fn introduction(&self, _id: &EntityId) -> Result<Introduction, ApiError> {
        let (delay, result) = self.on_introduction();
        finish(delay, result).await
    }

    async fn status(&self, _id: &EntityId) -> Result<LivenessStatus, ApiError> {
        let (delay, result) = self.on_status();
        finish(delay, result).await
    }

    async fn metrics(&self, _id: &EntityId, start: u64) -> Result<Vec<MetricSample>, ApiError> {
        let (delay, result) = self.on_metrics(start);
        finish(delay, result).await
    }

    async fn messages(
        &self,
        _id: &EntityId,
        start: u64,
        _end: Option<u64>,
    ) -> Result<Vec<MessageRecord>, ApiError> {
        let (delay, result) = self.on_messages(start);
        finish(delay, result).await
    }

    async fn exit_record(&self, _id: &EntityId) -> Result<ExitRecord, ApiError> {
        let (delay, result) = self.on_exit();
        finish(delay, result).await
    }

    async fn entities(&self, include_inactive: bool) -> Result<Vec<EntityId>, ApiError> {
        let (delay, result) = self.on_entities(include_inactive);
        finish(delay, result).await
    }
}

// ─── Builders ────────────────────────────────────────────────────────────────

pub fn entity_id(id: &str) -> EntityId {
    EntityId::new(id)
}

pub fn msg(timestamp: u64, text: &str) -> MessageRecord {
    MessageRecord {
        timestamp,
        message: text.to_string(),
        error: false,
    }
}

pub fn sample(time: u64) -> MetricSample {
    MetricSample {
        cpu: 12.5,
        memory: 42.0,
        disk: 7.25,
        time,
    }
}

pub fn intro_for(id: &EntityId) -> Introduction {
    Introduction {
        uuid: id.clone(),
        host: "worker-1".to_string(),
        ip: "10.0.0.5".to_string(),
        pid: 4242,
        parent_pid: 1,
        user: "svc".to_string(),
        name: "crunch".to_string(),
        args: "crunch --all --verbose".to_string(),
        created_time: 1_700_000_000_000,
        display_name: None,
    }
}

pub fn exit_with(exit_code: i32, time: u64) -> ExitRecord {
    ExitRecord {
        exit_code,
        time,
        messages: Vec::new(),
    }
}

// ─── Waiting ─────────────────────────────────────────────────────────────────

/// Poll a stream handle until `pred` holds for its snapshot. Panics if the
/// stream ends or one virtual minute passes first.
pub async fn wait_for<T, F>(handle: &mut StreamHandle<T>, mut pred: F) -> StreamState<T>
where
    T: Clone + Default + Send + Sync + 'static,
    F: FnMut(&StreamState<T>) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let snap = handle.snapshot();
            if pred(&snap) {
                return snap;
            }
            assert!(handle.changed().await, "stream ended before the expected state");
        }
    })
    .await;
    waited.expect("timed out waiting for stream state")
}
