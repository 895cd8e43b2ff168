//! Live-data synchronization for watchpost dashboards.
//!
//! A monitored process ("eyeball") exposes liveness, resource metrics, and
//! captured output through the watchpost API. This crate decides when to
//! poll those endpoints, merges incrementally paginated batches into growing
//! client-side timelines, and manages the per-entity lifecycle: stop polling
//! once the process exits, fetch its exit record exactly once, and dismiss
//! entities whose agents have stopped answering entirely.
//!
//! The building blocks:
//! - [`stream`]: one generic driver task per polled endpoint, publishing
//!   [`StreamState`] snapshots through a watch channel.
//! - [`cursor`]: the monotonic cursor that keeps append-only timelines
//!   gap-free and duplicate-free across polls.
//! - [`session`]: four wired streams plus a coordinator implementing the
//!   entity lifecycle rules.
//! - [`roster`]: the polled entity listing for index views.
//!
//! Everything is written against the [`watchpost_api::EntityApi`] trait, so
//! tests drive the whole stack with scripted fakes and no network.

pub mod cursor;
pub mod options;
pub mod roster;
pub mod session;
pub mod stream;
pub mod visibility;

pub use cursor::CursorAccumulator;
pub use options::{MessageWindow, PollInterval};
pub use roster::{RosterOptions, RosterWatch};
pub use session::{EntitySession, SessionEvent, SessionOptions, Telemetry, UNREACHABLE_GRACE};
pub use stream::{
    spawn_stream, AfterApply, AfterReconfigure, FetchOutcome, StreamHandle, StreamSource,
    StreamState, StreamWiring,
};
pub use visibility::{Visibility, VisibilityController};
