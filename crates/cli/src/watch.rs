use anyhow::Result;
use watchpost_api::EntityId;
use watchpost_sync::{
    EntitySession, MessageWindow, PollInterval, SessionEvent, SessionOptions, Visibility,
};

use crate::client;
use crate::config::load_config;
use crate::show::format_time;

/// Follow one entity live, printing messages and liveness changes as they
/// arrive, until the entity exits, stops answering, or ctrl-c.
pub async fn run_watch(
    id: &str,
    interval: Option<PollInterval>,
    window: Option<MessageWindow>,
) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;
    let id = EntityId::new(id);

    let interval = interval.unwrap_or(config.watch.interval);
    let window = window.unwrap_or(config.watch.window);

    println!("Watching {id} every {interval}, messages from {window} back. Ctrl-C to stop.");

    let mut session = EntitySession::spawn(
        api,
        id,
        SessionOptions {
            interval,
            window,
            visibility: Visibility::always(),
        },
    );

    let mut introduction = session.introduction();
    let mut telemetry = session.telemetry();
    let mut messages = session.messages();
    let mut exit = session.exit_record();

    let mut printed = 0usize;
    let mut announced: Option<bool> = None;
    let mut dismissed = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            alive = introduction.changed() => {
                if !alive {
                    break;
                }
                if let Some(intro) = introduction.snapshot().data {
                    println!(
                        "{} on {} (pid {}), started {}",
                        intro.label(),
                        intro.host,
                        intro.pid,
                        format_time(intro.created_time)
                    );
                }
            }
            alive = telemetry.changed() => {
                if !alive {
                    break;
                }
                let snap = telemetry.snapshot();
                if let Some(err) = snap.error {
                    tracing::warn!("telemetry fetch failed: {err}");
                }
                if let Some(status) = snap.data.status {
                    let running = !status.exited;
                    if announced != Some(running) {
                        announced = Some(running);
                        println!("state: {}", if running { "running" } else { "exited" });
                    }
                }
            }
            alive = messages.changed() => {
                if !alive {
                    break;
                }
                let snap = messages.snapshot();
                printed = printed.min(snap.data.len());
                for record in &snap.data[printed..] {
                    let marker = if record.error { "!" } else { " " };
                    println!("{} {}{}", format_time(record.timestamp), marker, record.message);
                }
                printed = snap.data.len();
            }
            alive = exit.changed() => {
                if !alive {
                    break;
                }
                if let Some(record) = exit.snapshot().data {
                    println!(
                        "exited with code {} at {}",
                        record.exit_code,
                        format_time(record.time)
                    );
                    for line in &record.messages {
                        println!("  | {}", line.message);
                    }
                    break;
                }
            }
            event = session.next_event() => {
                match event {
                    Some(SessionEvent::Unreachable) => {
                        eprintln!("warning: server stopped answering for this entity");
                    }
                    Some(SessionEvent::Dismissed) => {
                        dismissed = true;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    // The dismissal may still be queued if a closing stream won the race.
    while let Some(event) = session.try_event() {
        if matches!(event, SessionEvent::Dismissed) {
            dismissed = true;
        }
    }
    if dismissed {
        eprintln!("Entity stopped answering; dismissed.");
    }

    session.shutdown().await;
    Ok(())
}
