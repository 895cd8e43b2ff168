//! Entity lifecycle rules: terminal polling stop, exit-record one-shot,
//! dual-stream failure dismissal, and session teardown.

mod support;

use std::time::Duration;

use support::{entity_id, exit_with, msg, wait_for, FakeApi};
use watchpost_sync::{
    EntitySession, MessageWindow, PollInterval, SessionEvent, SessionOptions, Visibility,
    UNREACHABLE_GRACE,
};

fn options(interval: PollInterval) -> SessionOptions {
    SessionOptions {
        interval,
        window: MessageWindow::All,
        visibility: Visibility::always(),
    }
}

#[tokio::test(start_paused = true)]
async fn an_exited_entity_stops_live_polling_and_fetches_its_exit_record() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");
    api.set_exit_record(exit_with(3, 9_000));

    let session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut telemetry = session.telemetry();
    wait_for(&mut telemetry, |s| s.data.status.is_some_and(|st| !st.exited)).await;

    api.set_exited(true);
    let mut exit = session.exit_record();
    let snap = wait_for(&mut exit, |s| s.data.is_some()).await;
    assert_eq!(snap.data.clone().unwrap().exit_code, 3);

    // Let the cycle that observed the exit settle, then confirm silence.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let frozen = api.total_calls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.total_calls(), frozen, "live polling stops once the entity exits");
    assert_eq!(api.count_exit(), 1, "the exit record is fetched exactly once");

    let status = session.telemetry().snapshot().data.status;
    assert!(status.is_some_and(|st| st.exited), "the terminal status stays visible");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn the_exit_record_fetch_retries_until_it_succeeds() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");
    api.set_exit_record(exit_with(0, 5_000));
    api.fail_exit_fetches(1);
    api.set_exited(true);

    let session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut exit = session.exit_record();
    let snap = wait_for(&mut exit, |s| s.data.is_some()).await;
    assert_eq!(snap.data.clone().unwrap().exit_code, 0);
    assert_eq!(api.count_exit(), 2, "one failed attempt, then the record");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.count_exit(), 2, "no refetch after the first success");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dual_stream_failure_dismisses_after_the_grace_period() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");

    let mut session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut telemetry = session.telemetry();
    wait_for(&mut telemetry, |s| s.data.status.is_some()).await;

    api.set_status_failing(true);
    api.set_messages_failing(true);

    let event = tokio::time::timeout(Duration::from_secs(60), session.next_event())
        .await
        .expect("expected an unreachable notice");
    assert_eq!(event, Some(SessionEvent::Unreachable));

    let before = tokio::time::Instant::now();
    let event = tokio::time::timeout(Duration::from_secs(60), session.next_event())
        .await
        .expect("expected a dismissal");
    assert_eq!(event, Some(SessionEvent::Dismissed));
    assert_eq!(before.elapsed(), UNREACHABLE_GRACE, "dismissal lands when the grace expires");

    // Let the cycle that raced the dismissal settle first.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let frozen = api.total_calls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.total_calls(), frozen, "a dismissed session stops polling entirely");
    assert_eq!(session.next_event().await, None, "the event stream ends after dismissal");
}

#[tokio::test(start_paused = true)]
async fn recovery_before_the_grace_expires_cancels_dismissal() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");

    let mut session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut telemetry = session.telemetry();
    wait_for(&mut telemetry, |s| s.data.status.is_some()).await;

    api.set_status_failing(true);
    api.set_messages_failing(true);
    let event = tokio::time::timeout(Duration::from_secs(60), session.next_event())
        .await
        .expect("expected an unreachable notice");
    assert_eq!(event, Some(SessionEvent::Unreachable));

    // One stream recovering inside the grace period is enough to disarm.
    api.set_messages_failing(false);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(session.try_event(), None, "no dismissal after recovery");
    let polled = api.count_status();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(api.count_status() > polled, "polling continues after the scare");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_discards_in_flight_results() {
    let api = FakeApi::new();
    api.push_messages(vec![msg(1, "late")]);
    api.set_delay(Some(Duration::from_secs(10)));

    let session = EntitySession::spawn(
        api.clone(),
        entity_id("entity-a"),
        options(PollInterval::S1),
    );
    let messages = session.messages();
    // Let the first fetch go out, then tear the session down under it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(api.count_messages(), 1);
    session.shutdown().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(
        messages.snapshot().data.is_empty(),
        "a response landing after teardown is never applied"
    );

    // A replacement session starts from clean buffers and its own cursor.
    let fresh = FakeApi::new();
    fresh.push_messages(vec![msg(7, "first")]);
    let session = EntitySession::spawn(
        fresh.clone(),
        entity_id("entity-b"),
        options(PollInterval::S1),
    );
    let mut replacement = session.messages();
    let snap = wait_for(&mut replacement, |s| !s.data.is_empty()).await;
    assert_eq!(snap.data[0].timestamp, 7);
    assert_eq!(fresh.message_starts(), vec![0]);
    assert!(messages.snapshot().data.is_empty(), "the old view stays frozen");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn exit_record_reloads_are_ignored_while_the_entity_is_live() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");
    api.set_exit_record(exit_with(0, 2_000));

    let session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut telemetry = session.telemetry();
    wait_for(&mut telemetry, |s| s.data.status.is_some_and(|st| !st.exited)).await;

    // An eager consumer refreshing the exit view must not reach the wire
    // while the entity is still running.
    let mut exit = session.exit_record();
    exit.reload();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.count_exit(), 0, "no exit fetch before the entity exits");

    api.set_exited(true);
    wait_for(&mut exit, |s| s.data.is_some()).await;
    assert_eq!(api.count_exit(), 1, "the gate lifts once the exit is seen");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn a_restarted_entity_resumes_polling_after_a_manual_reload() {
    let api = FakeApi::new();
    let id = entity_id("entity-a");
    api.set_exit_record(exit_with(0, 1_000));
    api.set_exited(true);

    let session = EntitySession::spawn(api.clone(), id, options(PollInterval::S1));
    let mut exit = session.exit_record();
    wait_for(&mut exit, |s| s.data.is_some()).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stalled = api.count_status();

    // The process came back; an explicit refresh notices and un-latches.
    api.set_exited(false);
    let mut telemetry = session.telemetry();
    telemetry.reload();
    wait_for(&mut telemetry, |s| s.data.status.is_some_and(|st| !st.exited)).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        api.count_status() > stalled + 1,
        "cadence polling resumes once the restart is seen"
    );

    session.shutdown().await;
}
