//! Status command

use crate::app::OutputFormat;
use crate::output;
use anyhow::Result;
use dataroom_core::Dataroom;

pub async fn run(room: &Dataroom, format: OutputFormat) -> Result<()> {
    let status = room.get_status();
    print!("{}", output::format_status(&status, format));
    Ok(())
}
