//! `cinder heartbeat`: run one heartbeat check in the foreground.

use crate::runtime::Runtime;
use cinder_workflow::HeartbeatOutcome;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::load()?;

    if force {
        let reply = rt.heartbeat.trigger_now().await?;
        println!("{reply}");
        return Ok(());
    }

    match rt.heartbeat.tick().await? {
        HeartbeatOutcome::Skipped => {
            println!("No tasks in {}", rt.workspace.heartbeat_path().display());
        }
        HeartbeatOutcome::Idle => println!("HEARTBEAT_OK: nothing needed attention"),
        HeartbeatOutcome::Acted(reply) => println!("{reply}"),
    }
    Ok(())
}
