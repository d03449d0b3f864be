//! `cinder onboard`: first-time setup.

use cinder_config::AppConfig;
use cinder_core::workspace::FileWorkspace;
use cinder_workflow::JobStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Cinder: first-time setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config_existed = config_path.exists();
    if !config_existed {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
    }
    let config = AppConfig::load_from(&config_path)?;

    let workspace = FileWorkspace::new(config.workspace_dir());
    for path in workspace.ensure_defaults()? {
        println!("  Created {}", path.display());
    }

    // Listing the store creates it when absent.
    let store = JobStore::new(config.cron_store_path());
    let jobs = store.list().await.len();
    println!("  Job store: {} ({jobs} jobs)", store.path().display());

    if config_existed {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        println!("\n  Next steps:");
        println!("   1. Set CINDER_API_KEY (or api_key in {})", config_path.display());
        println!("   2. Run: cinder agent");
        println!("   3. Schedule something: cinder jobs add \"standup\" \"0 9 * * 1-5\" \"What's on today?\"\n");
    }

    println!("Setup complete. Run `cinder agent` to start chatting.\n");
    Ok(())
}
