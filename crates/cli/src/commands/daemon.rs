//! `cinder daemon`: run scheduled jobs and the heartbeat.

use crate::runtime::Runtime;
use tracing::info;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::load()?;

    println!("Cinder daemon starting");
    println!("   Job store: {}", rt.scheduler.store().path().display());
    println!(
        "   Heartbeat: {}",
        if rt.config.heartbeat.enabled {
            format!("every {} min", rt.config.heartbeat.interval_minutes)
        } else {
            "disabled".into()
        }
    );

    if rt.config.cron.enabled {
        let armed = rt.scheduler.start().await;
        info!(armed, "Cron scheduler running");
    } else {
        info!("Cron scheduler disabled in config");
    }

    if rt.config.heartbeat.enabled {
        rt.heartbeat.start();
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    rt.heartbeat.stop();
    rt.scheduler.stop();
    Ok(())
}
