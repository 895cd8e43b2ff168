use anyhow::{bail, Result};
use watchpost_api::EntityApi;

use crate::client;
use crate::config::load_config;

/// List entity ids, optionally scoped to one host or one IP.
pub async fn run_list(
    host: Option<String>,
    ip: Option<String>,
    include_inactive: bool,
) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;

    let entities = match (host, ip) {
        (Some(_), Some(_)) => bail!("--host and --ip are mutually exclusive"),
        (Some(host), None) => api.entities_on_host(&host, include_inactive).await?,
        (None, Some(ip)) => api.entities_at_ip(&ip, include_inactive).await?,
        (None, None) => api.entities(include_inactive).await?,
    };

    if entities.is_empty() {
        println!("No entities found.");
        return Ok(());
    }
    for id in &entities {
        println!("{id}");
    }
    println!();
    println!("{} entities", entities.len());
    Ok(())
}

/// List hosts that currently have entities.
pub async fn run_hosts(include_inactive: bool) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;

    let hosts = api.hosts(include_inactive).await?;
    if hosts.is_empty() {
        println!("No hosts have reported yet.");
        return Ok(());
    }
    for host in hosts {
        println!("{host}");
    }
    Ok(())
}

/// List IPs that currently have entities.
pub async fn run_ips(include_inactive: bool) -> Result<()> {
    let config = load_config()?;
    let api = client::build(&config)?;

    let ips = api.ips(include_inactive).await?;
    if ips.is_empty() {
        println!("No IPs have reported yet.");
        return Ok(());
    }
    for ip in ips {
        println!("{ip}");
    }
    Ok(())
}
