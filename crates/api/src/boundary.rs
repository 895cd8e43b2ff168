//! The API surface the sync layer is written against.
//!
//! The concrete HTTP client lives in `watchpost-api-client`; tests drive the
//! sync layer through scripted fakes implementing the same trait. Methods
//! return `impl Future + Send` rather than using `async fn` here so that
//! implementors' futures can cross task boundaries.

use std::future::Future;

use crate::error::ApiError;
use crate::{EntityId, ExitRecord, Introduction, LivenessStatus, MessageRecord, MetricSample};

/// Read side of the monitoring API, one method per polled endpoint.
///
/// Time parameters are epoch milliseconds. `start` is inclusive; a `start`
/// of zero asks for everything the server has retained. Batch-returning
/// methods yield records in ascending timestamp order (server contract).
pub trait EntityApi {
    /// Static facts about the entity, recorded at agent startup.
    fn introduction(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Introduction, ApiError>> + Send;

    /// Current liveness.
    fn status(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<LivenessStatus, ApiError>> + Send;

    /// Resource samples with `time >= start`.
    fn metrics(
        &self,
        id: &EntityId,
        start: u64,
    ) -> impl Future<Output = Result<Vec<MetricSample>, ApiError>> + Send;

    /// Output lines with `timestamp >= start`, optionally capped at `end`.
    fn messages(
        &self,
        id: &EntityId,
        start: u64,
        end: Option<u64>,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, ApiError>> + Send;

    /// Terminal record; `ApiError::NotFound` until the entity has exited.
    fn exit_record(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<ExitRecord, ApiError>> + Send;

    /// All known entity ids, optionally including ones whose agents have
    /// stopped reporting.
    fn entities(
        &self,
        include_inactive: bool,
    ) -> impl Future<Output = Result<Vec<EntityId>, ApiError>> + Send;
}
