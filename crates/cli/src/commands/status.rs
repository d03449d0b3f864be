//! `cinder status`: show configuration and job summary.

use cinder_config::AppConfig;
use cinder_workflow::JobStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let jobs = JobStore::new(config.cron_store_path()).list().await;
    let enabled = jobs.iter().filter(|j| j.enabled).count();

    println!("Cinder Status");
    println!("=============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Workspace:      {}", config.workspace_dir().display());
    println!("  Endpoint:       {}", config.api_url);
    println!("  Model:          {}", config.default_model);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "not set" });
    println!("  Temperature:    {}", config.default_temperature);
    println!("  Max iterations: {}", config.agent.max_iterations);
    println!("  Max history:    {}", config.agent.max_history);
    println!("  Terminal tool:  {}", if config.tools.terminal_enabled { "enabled" } else { "disabled" });
    println!(
        "  Heartbeat:      {}",
        if config.heartbeat.enabled {
            format!("every {} min", config.heartbeat.interval_minutes)
        } else {
            "disabled".into()
        }
    );
    println!("  Cron:           {} ({enabled}/{} jobs enabled)", if config.cron.enabled { "enabled" } else { "disabled" }, jobs.len());

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `cinder onboard` first");
    }

    Ok(())
}
