//! `eda-agent run` — one-shot execution command.
//!
//! Sends a single message to the agent, streams the response to stdout,
//! and exits. Useful for scripting, piping, and quick CLI interactions.

use std::io::Write;
use std::sync::Arc;

use eda_domain::config::Config;

use crate::bootstrap;
use crate::runtime::bus::BusEvent;
use crate::runtime::turn::{run_turn, TurnInput};

/// Execute a single agent turn and print the response.
///
/// This is the entry point for `eda-agent run "message"`.
pub async fn run(
    config: Arc<Config>,
    message: String,
    session_id: String,
    model: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;

    state
        .sessions
        .resolve_or_create(&session_id, model.as_deref().unwrap_or("default"))?;

    // Subscribe before starting the turn so `turn.start` is never missed.
    let mut rx = state.bus.subscribe(&session_id);

    let turn_state = state.turn_state();
    let input = TurnInput {
        session_id: session_id.clone(),
        user_message: message,
        model,
        transport: "cli".to_string(),
    };
    run_turn(turn_state, input);

    let mut exit_code: i32 = 0;
    let mut collected_events: Vec<BusEvent> = Vec::new();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(_) => break,
        };
        let is_terminal = matches!(event, BusEvent::TurnDone { .. } | BusEvent::TurnError { .. });

        if json_output {
            collected_events.push(event);
        } else {
            match &event {
                BusEvent::TurnStart => {}
                BusEvent::TextDelta { content } => {
                    print!("{content}");
                    std::io::stdout().flush().ok();
                }
                BusEvent::ToolCall { name, .. } => {
                    eprintln!("\x1b[2m[tool: {name}]\x1b[0m");
                }
                BusEvent::ToolResult { status, .. } => {
                    eprintln!("\x1b[2m[tool result: {status}]\x1b[0m");
                }
                BusEvent::TurnDone { .. } => {
                    println!();
                }
                BusEvent::TurnError { error } => {
                    eprintln!("error: {error}");
                    exit_code = 1;
                }
            }
        }

        if is_terminal {
            break;
        }
    }

    if json_output {
        let json = serde_json::to_string_pretty(&collected_events)
            .map_err(|e| anyhow::anyhow!("serializing events: {e}"))?;
        println!("{json}");
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
