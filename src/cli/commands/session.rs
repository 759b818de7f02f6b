//! Session command implementation.

use crate::cli::{Output, SessionAction};
use crate::config::Settings;
use crate::memory::{list_sessions, AgentOutputRecord, SessionMemory};
use anyhow::Result;

/// Run the session command.
pub fn run_session(action: &SessionAction, settings: Settings) -> Result<()> {
    let root = settings.memory_dir();

    match action {
        SessionAction::List => {
            let sessions = list_sessions(&root)?;
            if sessions.is_empty() {
                Output::info("No sessions yet. Use 'studycrew run --topic <topic>' to create one.");
                return Ok(());
            }

            Output::header(&format!("Sessions ({})", sessions.len()));
            println!();
            for id in &sessions {
                match SessionMemory::open_existing(&root, id) {
                    Ok(memory) => {
                        let status = memory
                            .context()
                            .metadata
                            .get("status")
                            .and_then(|s| s.as_str())
                            .unwrap_or("unknown")
                            .to_string();
                        Output::list_item(&format!(
                            "{}  {} ({}, {} outputs)",
                            id,
                            memory.context().topic,
                            status,
                            memory.agent_outputs(None).len()
                        ));
                    }
                    Err(e) => Output::warning(&format!("{}: {}", id, e)),
                }
            }
        }

        SessionAction::Show { id } => {
            let memory = SessionMemory::open_existing(&root, id)?;
            Output::header("Session");
            for line in memory.context_summary().lines() {
                println!("  {}", line);
            }
            if !memory.context().metadata.is_empty() {
                println!();
                for (key, value) in &memory.context().metadata {
                    Output::kv(key, &value.to_string());
                }
            }
        }

        SessionAction::Outputs { id, agent } => {
            let memory = SessionMemory::open_existing(&root, id)?;
            let outputs = memory.agent_outputs(agent.as_deref());
            if outputs.is_empty() {
                Output::info("No outputs recorded.");
            }
            for record in outputs {
                Output::header(&format!("{} / {}", record.agent, record.task));
                println!("{}\n", record.output);
            }
        }

        SessionAction::Search { id, keyword } => {
            let memory = SessionMemory::open_existing(&root, id)?;
            let hits = memory.search_outputs(keyword);
            Output::info(&format!("{} output(s) mention '{}'", hits.len(), keyword));
            for record in hits {
                print_record(record);
            }
        }

        SessionAction::History { id, last } => {
            let memory = SessionMemory::open_existing(&root, id)?;
            for turn in memory.conversation_history(*last) {
                Output::header(&format!("{} ({})", turn.role, turn.timestamp.to_rfc3339()));
                println!("{}", turn.content);
            }
        }

        SessionAction::Clear { id } => {
            let mut memory = SessionMemory::open_existing(&root, id)?;
            memory.clear_session()?;
            Output::success(&format!("Cleared session {}", id));
        }
    }

    Ok(())
}

fn print_record(record: &AgentOutputRecord) {
    Output::record(
        &record.agent,
        &record.task,
        &record.timestamp.to_rfc3339(),
        &record.output,
    );
}
