//! Ask command

use crate::app::{AskArgs, OutputFormat};
use crate::output;
use anyhow::{Context, Result};
use dataroom_core::{ChatMessage, Dataroom, DataroomError, NOT_READY_REPLY};
use std::path::Path;

pub async fn run(args: AskArgs, room: &Dataroom, format: OutputFormat) -> Result<()> {
    let question = args.question.join(" ");
    let history = match args.history {
        Some(ref path) => load_history(path)?,
        None => Vec::new(),
    };

    match room.answer_with_trace(&question, &history).await {
        Ok(traced) => {
            let trace = args.trace.then_some(&traced.trace);
            print!("{}", output::format_answer(&traced.response, trace, format));
            Ok(())
        }
        Err(DataroomError::IndexNotReady) => {
            println!("{}", NOT_READY_REPLY);
            Err(DataroomError::IndexNotReady.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Earlier turns as a YAML or JSON list of `{role, content}`
pub fn load_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    let history: Vec<ChatMessage> = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid history file {}", path.display()))?;
    Ok(history)
}
