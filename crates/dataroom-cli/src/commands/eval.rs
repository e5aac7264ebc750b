//! Eval command

use crate::app::{EvalArgs, OutputFormat};
use crate::output;
use anyhow::{Context, Result};
use dataroom_core::eval::{run_suite, EvalSuite};
use dataroom_core::{Dataroom, DataroomError};

pub async fn run(args: EvalArgs, room: &Dataroom, format: OutputFormat) -> Result<()> {
    let suite = EvalSuite::load_from(&args.cases)
        .with_context(|| format!("Failed to load evaluation cases from {}", args.cases.display()))?;

    if room.handle().current().is_none() {
        return Err(DataroomError::IndexNotReady.into());
    }

    eprintln!("Running {} evaluation questions...", suite.cases.len());
    let report = run_suite(room, &suite).await;

    print!("{}", output::format_eval(&report, format));
    Ok(())
}
