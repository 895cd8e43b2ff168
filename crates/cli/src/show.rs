use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use watchpost_api::{ApiError, EntityApi, EntityId};

use crate::client;
use crate::config::load_config;

/// One-shot view of a single entity.
pub async fn run_show(id: &str) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;
    let id = EntityId::new(id);

    let intro = api
        .introduction(&id)
        .await
        .with_context(|| format!("No introduction for entity {id}"))?;
    let status = api.status(&id).await?;

    match &intro.display_name {
        Some(label) => println!("{label} ({})", intro.name),
        None => println!("{}", intro.name),
    }
    println!("  id      = {}", intro.uuid);
    println!("  host    = {} ({})", intro.host, intro.ip);
    println!("  pid     = {} (parent {})", intro.pid, intro.parent_pid);
    println!("  user    = {}", intro.user);
    println!("  args    = {}", intro.args);
    println!("  started = {}", format_time(intro.created_time));
    println!(
        "  state   = {}",
        if status.exited { "exited" } else { "running" }
    );

    if status.exited {
        match api.exit_record(&id).await {
            Ok(record) => {
                println!();
                println!("Exit record:");
                println!("  code = {}", record.exit_code);
                println!("  time = {}", format_time(record.time));
                for line in &record.messages {
                    println!("  | {}", line.message);
                }
            }
            Err(ApiError::NotFound) => println!("  (no exit record yet)"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Render an epoch-millisecond timestamp in local time.
pub fn format_time(epoch_ms: u64) -> String {
    match Local.timestamp_millis_opt(epoch_ms as i64).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{epoch_ms}ms"),
    }
}
