//! `cinder agent`: interactive or single-message chat mode.

use crate::runtime::Runtime;
use cinder_core::handler::InboundMessage;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::load()?;
    let inbound = InboundMessage::new("cli", whoami()).owner();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = rt.agent.run_turn(&msg, &inbound).await;
        eprint!("\r              \r");
        println!("{}", outcome?.reply);
        return Ok(());
    }

    println!();
    println!("  Cinder Agent (interactive)");
    println!();
    println!("  Endpoint:  {}", rt.config.api_url);
    println!("  Model:     {}", rt.config.default_model);
    println!("  Tools:     {}", rt.registry.names().join(", "));
    println!("  Workspace: {}", rt.config.workspace_dir().display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  '/clear' forgets this conversation, 'exit' or Ctrl+D quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                rt.agent.clear_history(Some(&inbound.session_key())).await;
                println!("  (history cleared)\n");
                continue;
            }
            _ => {}
        }

        eprint!("  ...");
        let result = rt.agent.run_turn(line, &inbound).await;
        eprint!("\r     \r");
        match result {
            Ok(outcome) => {
                println!();
                for l in outcome.reply.lines() {
                    println!("  Cinder > {l}");
                }
                println!();
            }
            Err(e) => {
                if let Some(partial) = e.partial() {
                    println!("  Cinder > {partial}");
                }
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "owner".into())
}
