//! Interactive chat command

use crate::app::OutputFormat;
use crate::output;
use anyhow::Result;
use dataroom_core::{ChatMessage, Dataroom, DataroomError, NOT_READY_REPLY};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(room: &Dataroom, format: OutputFormat) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ChatMessage> = Vec::new();

    eprintln!("Ask about the dataroom. Type 'exit' to quit.");

    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        match room.answer(message, &history).await {
            Ok(response) => {
                print!("{}", output::format_answer(&response, None, format));
                history.push(ChatMessage::user(message));
                history.push(ChatMessage::assistant(response.response));
            }
            Err(DataroomError::IndexNotReady) => println!("{}", NOT_READY_REPLY),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
