use anyhow::{Context, Result};
use watchpost_api::{EntityAction, EntityId};

use crate::client;
use crate::config::load_config;

/// Ask the agent to restart or exit the monitored process.
pub async fn run_action(id: &str, action: EntityAction) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;
    let id = EntityId::new(id);

    api.perform_action(&id, action)
        .await
        .with_context(|| format!("Failed to request {action} for {id}"))?;
    println!("Requested {action} for {id}.");
    Ok(())
}

/// Remove the entity and its recorded history from the server.
pub async fn run_delete(id: &str) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;
    let id = EntityId::new(id);

    api.delete_entity(&id)
        .await
        .with_context(|| format!("Failed to delete {id}"))?;
    println!("Deleted {id}.");
    Ok(())
}
